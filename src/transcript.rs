/// One finalized exchange: what the user said and what the model said,
/// bounded by a turn-complete signal. Immutable once appended to the log.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Turn {
    pub user_text: String,
    pub model_text: String,
}

/// The not-yet-complete turn, exposed read-only for live captioning. Never
/// part of the durable log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialCaption {
    pub user: String,
    pub model: String,
}

impl PartialCaption {
    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.model.is_empty()
    }
}

/// Folds transcript deltas into finalized turns. The user and model buffers
/// accumulate independently, in arrival order; a turn boundary snapshots
/// both into the append-only log and clears them.
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    current: PartialCaption,
    turns: Vec<Turn>,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, delta: &str) {
        self.current.user.push_str(delta);
    }

    pub fn push_model(&mut self, delta: &str) {
        self.current.model.push_str(delta);
    }

    /// Finalizes the in-progress turn, appends it to the log and resets
    /// both buffers.
    pub fn complete_turn(&mut self) -> Turn {
        let turn = Turn {
            user_text: std::mem::take(&mut self.current.user),
            model_text: std::mem::take(&mut self.current.model),
        };
        self.turns.push(turn.clone());
        turn
    }

    pub fn current(&self) -> &PartialCaption {
        &self.current
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_concatenate_in_arrival_order() {
        let mut accumulator = TranscriptAccumulator::new();
        accumulator.push_model("Hel");
        accumulator.push_model("lo wo");
        accumulator.push_model("rld");
        let turn = accumulator.complete_turn();
        assert_eq!(turn.model_text, "Hello world");
        assert_eq!(turn.user_text, "");
    }

    #[test]
    fn buffers_are_empty_after_a_turn_boundary() {
        let mut accumulator = TranscriptAccumulator::new();
        accumulator.push_user("question");
        accumulator.push_model("answer");
        accumulator.complete_turn();
        assert!(accumulator.current().is_empty());
    }

    #[test]
    fn user_and_model_channels_accumulate_independently() {
        let mut accumulator = TranscriptAccumulator::new();
        accumulator.push_user("what is ");
        accumulator.push_model("I heard: ");
        accumulator.push_user("rust?");
        accumulator.push_model("a systems language.");
        let turn = accumulator.complete_turn();
        assert_eq!(turn.user_text, "what is rust?");
        assert_eq!(turn.model_text, "I heard: a systems language.");
    }

    #[test]
    fn log_is_ordered_and_append_only() {
        let mut accumulator = TranscriptAccumulator::new();
        accumulator.push_user("one");
        accumulator.complete_turn();
        accumulator.push_user("two");
        accumulator.complete_turn();

        let turns = accumulator.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].user_text, "one");
        assert_eq!(turns[1].user_text, "two");
    }

    #[test]
    fn turn_boundary_with_empty_buffers_still_logs_a_turn() {
        let mut accumulator = TranscriptAccumulator::new();
        let turn = accumulator.complete_turn();
        assert_eq!(turn, Turn { user_text: String::new(), model_text: String::new() });
        assert_eq!(accumulator.turns().len(), 1);
    }
}
