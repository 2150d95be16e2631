/// Sample rate the remote endpoint expects for uplink audio.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;
/// Sample rate of the synthesized audio the remote endpoint streams back.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

const AUDIO_ONLY_PROMPT: &str = "You are a helpful Aural Assistant.";
const VISION_PROMPT: &str = "You have visual perception. Describe what you see if asked.";

/// Immutable configuration for one live session, fixed from `start()` to
/// teardown.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionConfig {
    /// Whether the session also streams throttled camera stills uplink.
    wants_video: bool,

    /// Uplink PCM sample rate in Hz.
    input_sample_rate: u32,

    /// Downlink PCM sample rate in Hz.
    output_sample_rate: u32,

    /// System instruction prepended to the model conversation.
    system_prompt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self {
            wants_video: false,
            input_sample_rate: INPUT_SAMPLE_RATE,
            output_sample_rate: OUTPUT_SAMPLE_RATE,
            system_prompt: AUDIO_ONLY_PROMPT.to_string(),
        }
    }

    pub fn with_video(mut self) -> Self {
        self.wants_video = true;
        if self.system_prompt == AUDIO_ONLY_PROMPT {
            self.system_prompt = VISION_PROMPT.to_string();
        }
        self
    }

    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    pub fn with_input_sample_rate(mut self, rate: u32) -> Self {
        self.input_sample_rate = rate;
        self
    }

    pub fn with_output_sample_rate(mut self, rate: u32) -> Self {
        self.output_sample_rate = rate;
        self
    }

    pub fn wants_video(&self) -> bool {
        self.wants_video
    }

    pub fn input_sample_rate(&self) -> u32 {
        self.input_sample_rate
    }

    pub fn output_sample_rate(&self) -> u32 {
        self.output_sample_rate
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_audio_only() {
        let config = SessionConfig::new();
        assert!(!config.wants_video());
        assert_eq!(config.input_sample_rate(), 16_000);
        assert_eq!(config.output_sample_rate(), 24_000);
        assert_eq!(config.system_prompt(), AUDIO_ONLY_PROMPT);
    }

    #[test]
    fn enabling_video_switches_the_default_prompt() {
        let config = SessionConfig::new().with_video();
        assert!(config.wants_video());
        assert_eq!(config.system_prompt(), VISION_PROMPT);
    }

    #[test]
    fn explicit_prompt_survives_enabling_video() {
        let config = SessionConfig::new()
            .with_system_prompt("Answer in haiku.")
            .with_video();
        assert_eq!(config.system_prompt(), "Answer in haiku.");
    }
}
