use crate::error::DeviceError;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use nimbus_live_types::SessionConfig;
use nimbus_live_utils::visual::Picture;
use tokio::sync::mpsc;

/// Samples per uplink audio frame, at the session's input sample rate.
pub const FRAME_SAMPLES: usize = 4096;

/// Seconds between uplink camera stills.
pub const VIDEO_FRAME_INTERVAL_SECS: u64 = 1;

/// A fixed-size block of captured microphone audio, unit amplitude.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Live capture handles produced by a successful `CaptureProvider::open`.
pub struct CaptureStreams {
    /// Fixed-cadence microphone frames for the session's duration.
    pub audio: mpsc::Receiver<AudioFrame>,
    /// Present only when the session wants video and the provider has a
    /// camera. Polled on the session's throttled frame timer.
    pub video: Option<Box<dyn VideoSource>>,
}

/// Capability to acquire the local microphone (and optionally camera).
/// Devices are exclusively held between `open` and `close`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    /// Acquires the devices the config asks for. Fails with `DeviceError`
    /// on permission denial or absent hardware, acquiring nothing.
    async fn open(&self, config: SessionConfig) -> Result<CaptureStreams, DeviceError>;

    /// Stops capture and releases the hardware. Safe to call repeatedly.
    async fn close(&self);
}

/// An open camera feed. One still is grabbed per timer tick.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VideoSource: Send {
    /// Grabs the current picture, or `None` when the feed has gone away.
    async fn grab(&mut self) -> Option<Picture>;
}
