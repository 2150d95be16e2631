use crate::media::MediaChunk;
use crate::session::SessionConfig;

/// Messages the client writes to the live endpoint. Externally tagged, so
/// serialization yields the `{"setup": {...}}` / `{"realtimeInput": {...}}`
/// wrappers the wire expects.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    model: String,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    /// Empty object enables transcription of what the user says.
    input_audio_transcription: TranscriptionConfig,
    /// Empty object enables transcription of what the model says.
    output_audio_transcription: TranscriptionConfig,
}

impl Setup {
    pub fn new(model: &str, config: &SessionConfig) -> Self {
        Self {
            model: model.to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
            },
            system_instruction: Some(Content {
                parts: vec![Part::text(config.system_prompt())],
            }),
            input_audio_transcription: TranscriptionConfig {},
            output_audio_transcription: TranscriptionConfig {},
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    response_modalities: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TranscriptionConfig {}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    media_chunks: Vec<MediaChunk>,
}

impl RealtimeInput {
    pub fn new(chunk: MediaChunk) -> Self {
        Self {
            media_chunks: vec![chunk],
        }
    }

    pub fn media_chunks(&self) -> &[MediaChunk] {
        &self.media_chunks
    }
}

/// One message read from the live endpoint. The protocol has no type tag;
/// any subset of the fields may be present in a single message.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    setup_complete: Option<SetupComplete>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_content: Option<ServerContent>,
}

impl ServerMessage {
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    pub fn server_content(&self) -> Option<&ServerContent> {
        self.server_content.as_ref()
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SetupComplete {}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    input_transcription: Option<Transcription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_transcription: Option<Transcription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    turn_complete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_turn: Option<ModelTurn>,
}

impl ServerContent {
    pub fn input_transcription(&self) -> Option<&str> {
        self.input_transcription.as_ref().map(|t| t.text.as_str())
    }

    pub fn output_transcription(&self) -> Option<&str> {
        self.output_transcription.as_ref().map(|t| t.text.as_str())
    }

    pub fn turn_complete(&self) -> bool {
        self.turn_complete.unwrap_or(false)
    }

    /// Inline audio payloads of the model turn, in part order.
    pub fn audio_chunks(&self) -> impl Iterator<Item = &MediaChunk> {
        self.model_turn
            .iter()
            .flat_map(|turn| turn.parts.iter())
            .filter_map(|part| part.inline_data.as_ref())
            .filter(|chunk| chunk.is_pcm())
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Transcription {
    text: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelTurn {
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<MediaChunk>,
}

impl Part {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Content {
    parts: Vec<Part>,
}
