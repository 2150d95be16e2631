pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";

pub const BASE_URL: &str = "wss://generativelanguage.googleapis.com/ws";
pub const BIDI_PATH: &str = "/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
pub const DEFAULT_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-09-2025";

/// Depth of the drop-oldest outbound buffer, in media chunks.
pub const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Depth of the inbound event channel.
pub const EVENT_CHANNEL_DEPTH: usize = 256;
