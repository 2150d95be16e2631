use nimbus_live_types::ServerContent;

/// One classified inbound event from the remote session, in arrival order.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// Partial transcript of what the user is saying.
    UserTranscriptDelta(String),
    /// Partial transcript of what the model is saying.
    ModelTranscriptDelta(String),
    /// The remote side finished a user/model exchange.
    TurnComplete,
    /// Base64 PCM16 audio synthesized by the model.
    AudioFragment { data: String, sample_rate: u32 },
    /// The channel failed mid-session. Terminal, delivered at most once.
    TransportError(String),
    /// The remote side closed the channel. Terminal, delivered at most once.
    TransportClosed,
}

impl InboundEvent {
    /// Fans one server content payload out into discrete events, preserving
    /// the processing order of the wire protocol: user delta, model delta,
    /// turn boundary, then audio. A chunk without an explicit rate falls
    /// back to `fallback_rate`.
    pub fn fan_out(content: &ServerContent, fallback_rate: u32) -> Vec<InboundEvent> {
        let mut events = Vec::new();
        if let Some(text) = content.input_transcription() {
            events.push(InboundEvent::UserTranscriptDelta(text.to_string()));
        }
        if let Some(text) = content.output_transcription() {
            events.push(InboundEvent::ModelTranscriptDelta(text.to_string()));
        }
        if content.turn_complete() {
            events.push(InboundEvent::TurnComplete);
        }
        for chunk in content.audio_chunks() {
            events.push(InboundEvent::AudioFragment {
                data: chunk.data().to_string(),
                sample_rate: chunk.sample_rate().unwrap_or(fallback_rate),
            });
        }
        events
    }
}
