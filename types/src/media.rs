/// Media payload encoded as base64.
pub type Base64EncodedBytes = String;

pub const PCM_MIME_PREFIX: &str = "audio/pcm";
pub const JPEG_MIME: &str = "image/jpeg";

/// One wire-ready media payload: base64 data plus the mime type that tells
/// the remote side how to interpret it, e.g. `audio/pcm;rate=16000`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    mime_type: String,
    data: Base64EncodedBytes,
}

impl MediaChunk {
    pub fn pcm(data: Base64EncodedBytes, sample_rate: u32) -> Self {
        Self {
            mime_type: format!("{};rate={}", PCM_MIME_PREFIX, sample_rate),
            data,
        }
    }

    pub fn jpeg(data: Base64EncodedBytes) -> Self {
        Self {
            mime_type: JPEG_MIME.to_string(),
            data,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn is_pcm(&self) -> bool {
        self.mime_type.starts_with(PCM_MIME_PREFIX)
    }

    /// Parses the `;rate=N` parameter of a PCM mime type.
    pub fn sample_rate(&self) -> Option<u32> {
        self.mime_type
            .split(';')
            .filter_map(|param| param.trim().strip_prefix("rate="))
            .find_map(|rate| rate.parse().ok())
    }
}
