use crate::error::DeviceError;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;

/// Capability to acquire the audio output device.
#[cfg_attr(test, automock)]
pub trait PlaybackProvider: Send + Sync {
    fn open(&self, sample_rate: u32) -> Result<Box<dyn PlaybackSink>, DeviceError>;
}

/// An open output device with a schedulable clock.
#[cfg_attr(test, automock)]
pub trait PlaybackSink: Send {
    /// Current device time, in seconds on the sink's own clock.
    fn now(&self) -> f64;

    /// Plays `samples` starting at device time `start`. Callers only ever
    /// pass non-overlapping, non-decreasing start times.
    fn play_at(&mut self, samples: Vec<f32>, start: f64);

    /// Drops pending scheduled audio and releases the device. Safe to call
    /// repeatedly.
    fn stop(&mut self);
}

/// Schedules decoded audio fragments back-to-back on the output device.
///
/// Keeps a `next_start` cursor: each fragment starts at
/// `max(next_start, sink.now())`, then the cursor advances by the fragment
/// duration. Fragments arriving faster than real time queue up in device
/// time instead of overlapping; fragments arriving late tolerate a small
/// silence gap instead of reordering. The cursor is owned exclusively by
/// this scheduler and only moves through `enqueue`.
pub struct PlaybackScheduler {
    provider: Arc<dyn PlaybackProvider>,
    sample_rate: u32,
    sink: Option<Box<dyn PlaybackSink>>,
    next_start: f64,
}

impl PlaybackScheduler {
    pub fn new(provider: Arc<dyn PlaybackProvider>, sample_rate: u32) -> Self {
        Self {
            provider,
            sample_rate,
            sink: None,
            next_start: 0.0,
        }
    }

    /// Schedules one decoded fragment. The output device is acquired lazily
    /// on the first fragment; if it cannot be opened the fragment is dropped
    /// and playback stays silent for this session.
    pub fn enqueue(&mut self, samples: Vec<f32>, sample_rate: u32) {
        if samples.is_empty() {
            return;
        }
        if sample_rate == 0 {
            // A zero rate would advance the cursor to infinity and silence
            // the rest of the session. Treated like an undecodable fragment.
            tracing::warn!("dropping audio fragment with zero sample rate");
            return;
        }
        if self.sink.is_none() {
            match self.provider.open(self.sample_rate) {
                Ok(sink) => self.sink = Some(sink),
                Err(e) => {
                    tracing::error!("failed to open playback device: {}", e);
                    return;
                }
            }
        }
        let sink = match self.sink.as_mut() {
            Some(sink) => sink,
            None => return,
        };
        let duration = samples.len() as f64 / sample_rate as f64;
        let start = self.next_start.max(sink.now());
        sink.play_at(samples, start);
        self.next_start = start + duration;
    }

    /// End-of-session reset: pending audio is discarded and the output
    /// device released. Safe to call repeatedly.
    pub fn reset(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.stop();
        }
        self.next_start = 0.0;
    }

    pub fn next_start(&self) -> f64 {
        self.next_start
    }
}
