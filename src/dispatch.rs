use crate::events::InboundEvent;
use crate::playback::PlaybackScheduler;
use crate::transcript::{PartialCaption, TranscriptAccumulator, Turn};
use nimbus_live_utils as utils;
use tokio::sync::watch;

/// Why a session ended. The three causes are mutually exclusive; exactly
/// one is observed per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndCause {
    UserStop,
    RemoteClosed,
    Fault(String),
}

/// Routes classified inbound events to the transcript accumulator and the
/// playback scheduler, publishing caption/turn updates as it goes. Never
/// blocks; terminal events are reported back to the session loop instead of
/// being acted on here.
pub struct Dispatcher {
    transcript: TranscriptAccumulator,
    playback: PlaybackScheduler,
    caption_tx: watch::Sender<PartialCaption>,
    turns_tx: watch::Sender<Vec<Turn>>,
    dropped_fragments: u64,
}

impl Dispatcher {
    pub fn new(
        playback: PlaybackScheduler,
        caption_tx: watch::Sender<PartialCaption>,
        turns_tx: watch::Sender<Vec<Turn>>,
    ) -> Self {
        Self {
            transcript: TranscriptAccumulator::new(),
            playback,
            caption_tx,
            turns_tx,
            dropped_fragments: 0,
        }
    }

    /// Handles one inbound event. Returns the end cause when the event is
    /// terminal.
    pub fn handle(&mut self, event: InboundEvent) -> Option<EndCause> {
        match event {
            InboundEvent::UserTranscriptDelta(delta) => {
                self.transcript.push_user(&delta);
                self.publish_caption();
                None
            }
            InboundEvent::ModelTranscriptDelta(delta) => {
                self.transcript.push_model(&delta);
                self.publish_caption();
                None
            }
            InboundEvent::TurnComplete => {
                let turn = self.transcript.complete_turn();
                tracing::debug!(
                    user_chars = turn.user_text.len(),
                    model_chars = turn.model_text.len(),
                    "turn complete"
                );
                self.turns_tx.send_replace(self.transcript.turns().to_vec());
                self.publish_caption();
                None
            }
            InboundEvent::AudioFragment { data, sample_rate } => {
                match utils::audio::decode(&data) {
                    Ok(samples) => self.playback.enqueue(samples, sample_rate),
                    Err(e) => {
                        // Drop-and-continue: a bad fragment never aborts the
                        // session, playback resumes with the next one.
                        self.dropped_fragments += 1;
                        tracing::warn!(
                            dropped = self.dropped_fragments,
                            "skipping undecodable audio fragment: {}",
                            e
                        );
                    }
                }
                None
            }
            InboundEvent::TransportError(reason) => Some(EndCause::Fault(reason)),
            InboundEvent::TransportClosed => Some(EndCause::RemoteClosed),
        }
    }

    /// Part of session teardown: discards pending audio and releases the
    /// output device.
    pub fn reset_playback(&mut self) {
        self.playback.reset();
    }

    fn publish_caption(&self) {
        self.caption_tx.send_replace(self.transcript.current().clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{MockPlaybackProvider, MockPlaybackSink};
    use std::sync::Arc;

    fn dispatcher_with(provider: MockPlaybackProvider) -> (Dispatcher, watch::Receiver<PartialCaption>, watch::Receiver<Vec<Turn>>) {
        let (caption_tx, caption_rx) = watch::channel(PartialCaption::default());
        let (turns_tx, turns_rx) = watch::channel(Vec::new());
        let playback = PlaybackScheduler::new(Arc::new(provider), 24_000);
        (Dispatcher::new(playback, caption_tx, turns_tx), caption_rx, turns_rx)
    }

    #[test]
    fn transcript_deltas_update_the_live_caption() {
        let (mut dispatcher, caption_rx, _turns_rx) = dispatcher_with(MockPlaybackProvider::new());
        dispatcher.handle(InboundEvent::UserTranscriptDelta("Hel".to_string()));
        dispatcher.handle(InboundEvent::UserTranscriptDelta("lo".to_string()));
        assert_eq!(caption_rx.borrow().user, "Hello");
    }

    #[test]
    fn turn_complete_publishes_the_log_and_clears_the_caption() {
        let (mut dispatcher, caption_rx, turns_rx) = dispatcher_with(MockPlaybackProvider::new());
        dispatcher.handle(InboundEvent::ModelTranscriptDelta("Hel".to_string()));
        dispatcher.handle(InboundEvent::ModelTranscriptDelta("lo wo".to_string()));
        dispatcher.handle(InboundEvent::ModelTranscriptDelta("rld".to_string()));
        assert!(dispatcher.handle(InboundEvent::TurnComplete).is_none());

        let turns = turns_rx.borrow();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].model_text, "Hello world");
        assert!(caption_rx.borrow().is_empty());
    }

    #[test]
    fn undecodable_fragment_is_skipped_and_playback_continues() {
        let mut provider = MockPlaybackProvider::new();
        provider.expect_open().times(1).returning(|_| {
            let mut sink = MockPlaybackSink::new();
            sink.expect_now().return_const(0.0);
            sink.expect_play_at().times(1).return_const(());
            Ok(Box::new(sink) as Box<dyn crate::playback::PlaybackSink>)
        });
        let (mut dispatcher, _caption_rx, _turns_rx) = dispatcher_with(provider);

        let bad = InboundEvent::AudioFragment {
            data: "!!!not-base64!!!".to_string(),
            sample_rate: 24_000,
        };
        assert!(dispatcher.handle(bad).is_none());

        let good = InboundEvent::AudioFragment {
            data: nimbus_live_utils::audio::encode(&[0.1f32; 240]),
            sample_rate: 24_000,
        };
        assert!(dispatcher.handle(good).is_none());
    }

    #[test]
    fn terminal_events_are_reported_not_acted_on() {
        let (mut dispatcher, _caption_rx, _turns_rx) = dispatcher_with(MockPlaybackProvider::new());
        assert_eq!(
            dispatcher.handle(InboundEvent::TransportError("reset by peer".to_string())),
            Some(EndCause::Fault("reset by peer".to_string()))
        );
        assert_eq!(
            dispatcher.handle(InboundEvent::TransportClosed),
            Some(EndCause::RemoteClosed)
        );
    }
}
