//! cpal-backed capture and playback. The cpal streams are not `Send`, so
//! each device lives on its own thread; the async side talks to it through
//! channels and a ring buffer.

use crate::capture::{AudioFrame, CaptureProvider, CaptureStreams, FRAME_SAMPLES};
use crate::error::DeviceError;
use crate::playback::{PlaybackProvider, PlaybackSink};
use crate::session::LiveSession;
use crate::transport::config::Config;
use crate::transport::ws::WsTransport;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use nimbus_live_types::SessionConfig;
use nimbus_live_utils as utils;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd};
use rubato::Resampler;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Samples per cpal buffer, on both the input and output streams.
const DEVICE_CHUNK_SIZE: usize = 1024;

/// Seconds of decoded audio the output ring buffer can hold.
const OUTPUT_BUFFER_SECS: usize = 1;

/// A `LiveSession` wired to the default microphone, the default output
/// device and the WebSocket transport.
pub fn live_session(config: Config) -> LiveSession {
    LiveSession::new(
        std::sync::Arc::new(NativeCaptureProvider::new()),
        std::sync::Arc::new(WsTransport::new(config)),
        std::sync::Arc::new(NativePlaybackProvider::new()),
    )
}

/// Microphone capture via cpal. Camera capture has no backend here; opening
/// with `wants_video` fails with `DeviceError::Unavailable` before any
/// hardware is touched.
pub struct NativeCaptureProvider {
    device_name: Option<String>,
    active: Mutex<Option<ActiveCapture>>,
}

struct ActiveCapture {
    /// Dropping this unparks the device thread, which releases the stream.
    _stop: std::sync::mpsc::Sender<()>,
    pump: tokio::task::JoinHandle<()>,
}

impl NativeCaptureProvider {
    pub fn new() -> Self {
        Self {
            device_name: None,
            active: Mutex::new(None),
        }
    }

    pub fn with_device(name: &str) -> Self {
        Self {
            device_name: Some(name.to_string()),
            active: Mutex::new(None),
        }
    }
}

impl Default for NativeCaptureProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureProvider for NativeCaptureProvider {
    async fn open(&self, config: SessionConfig) -> Result<CaptureStreams, DeviceError> {
        if config.wants_video() {
            return Err(DeviceError::Unavailable(
                "no camera backend; use a provider with a VideoSource".to_string(),
            ));
        }

        let (raw_tx, mut raw_rx) = mpsc::channel::<Vec<f32>>(64);
        let (frame_tx, frame_rx) = mpsc::channel::<AudioFrame>(32);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<u32, DeviceError>>();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

        let device_name = self.device_name.clone();
        std::thread::spawn(move || {
            let device = match utils::device::get_or_default_input(device_name) {
                Ok(device) => device,
                Err(e) => {
                    let _ = ready_tx.send(Err(DeviceError::Unavailable(e.to_string())));
                    return;
                }
            };
            let default_config = match device.default_input_config() {
                Ok(config) => config,
                Err(e) => {
                    let _ = ready_tx.send(Err(DeviceError::Unavailable(e.to_string())));
                    return;
                }
            };
            let stream_config = StreamConfig {
                channels: default_config.channels(),
                sample_rate: default_config.sample_rate(),
                buffer_size: cpal::BufferSize::Fixed(FrameCount::from(DEVICE_CHUNK_SIZE as u32)),
            };
            let channel_count = stream_config.channels as usize;
            let device_rate = stream_config.sample_rate.0;

            let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let audio = if channel_count > 1 {
                    data.chunks(channel_count)
                        .map(|frame| frame.iter().sum::<f32>() / channel_count as f32)
                        .collect::<Vec<f32>>()
                } else {
                    data.to_vec()
                };
                if let Err(e) = raw_tx.try_send(audio) {
                    tracing::warn!("failed to send audio data to buffer: {:?}", e);
                }
            };
            let stream = match device.build_input_stream(
                &stream_config,
                input_data_fn,
                move |err| tracing::error!("an error occurred on input stream: {}", err),
                None,
            ) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(DeviceError::Unavailable(e.to_string())));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(DeviceError::Unavailable(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(device_rate));

            // Hold the stream until the provider closes.
            let _ = stop_rx.recv();
            drop(stream);
        });

        let device_rate = ready_rx
            .await
            .map_err(|_| DeviceError::Unavailable("capture thread ended during open".to_string()))??;

        let wire_rate = config.input_sample_rate();
        let mut resampler =
            utils::audio::create_resampler(device_rate as f64, wire_rate as f64, DEVICE_CHUNK_SIZE)
                .map_err(|e| DeviceError::Unavailable(e.to_string()))?;

        // Re-chunk and resample device buffers into fixed wire-rate frames.
        let pump = tokio::spawn(async move {
            let mut carry: VecDeque<f32> = VecDeque::with_capacity(DEVICE_CHUNK_SIZE * 2);
            let mut pending: Vec<f32> = Vec::with_capacity(FRAME_SAMPLES * 2);
            while let Some(audio) = raw_rx.recv().await {
                carry.extend(audio);
                while carry.len() >= DEVICE_CHUNK_SIZE {
                    let chunk: Vec<f32> = carry.drain(..DEVICE_CHUNK_SIZE).collect();
                    if let Ok(resampled) = resampler.process(&[chunk.as_slice()], None) {
                        if let Some(resampled) = resampled.first() {
                            pending.extend(resampled.iter().copied());
                        }
                    }
                }
                while pending.len() >= FRAME_SAMPLES {
                    let samples: Vec<f32> = pending.drain(..FRAME_SAMPLES).collect();
                    let frame = AudioFrame {
                        samples,
                        sample_rate: wire_rate,
                    };
                    if frame_tx.send(frame).await.is_err() {
                        return;
                    }
                }
            }
        });

        let mut active = match self.active.lock() {
            Ok(active) => active,
            Err(poisoned) => poisoned.into_inner(),
        };
        *active = Some(ActiveCapture {
            _stop: stop_tx,
            pump,
        });

        Ok(CaptureStreams {
            audio: frame_rx,
            video: None,
        })
    }

    async fn close(&self) {
        let taken = {
            let mut active = match self.active.lock() {
                Ok(active) => active,
                Err(poisoned) => poisoned.into_inner(),
            };
            active.take()
        };
        if let Some(capture) = taken {
            capture.pump.abort();
            // _stop drops here, releasing the device thread.
        }
    }
}

/// Audio output via cpal, fed through a ring buffer the device thread
/// drains.
pub struct NativePlaybackProvider {
    device_name: Option<String>,
}

impl NativePlaybackProvider {
    pub fn new() -> Self {
        Self { device_name: None }
    }

    pub fn with_device(name: &str) -> Self {
        Self {
            device_name: Some(name.to_string()),
        }
    }
}

impl Default for NativePlaybackProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackProvider for NativePlaybackProvider {
    fn open(&self, sample_rate: u32) -> Result<Box<dyn PlaybackSink>, DeviceError> {
        let (ready_tx, ready_rx) =
            std::sync::mpsc::channel::<Result<(u32, HeapProd<f32>), DeviceError>>();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

        let device_name = self.device_name.clone();
        std::thread::spawn(move || {
            let device = match utils::device::get_or_default_output(device_name) {
                Ok(device) => device,
                Err(e) => {
                    let _ = ready_tx.send(Err(DeviceError::Unavailable(e.to_string())));
                    return;
                }
            };
            let default_config = match device.default_output_config() {
                Ok(config) => config,
                Err(e) => {
                    let _ = ready_tx.send(Err(DeviceError::Unavailable(e.to_string())));
                    return;
                }
            };
            let stream_config = StreamConfig {
                channels: default_config.channels(),
                sample_rate: default_config.sample_rate(),
                buffer_size: cpal::BufferSize::Fixed(FrameCount::from(DEVICE_CHUNK_SIZE as u32)),
            };
            let channel_count = stream_config.channels as usize;
            let device_rate = stream_config.sample_rate.0;

            let buffer = utils::audio::shared_buffer(device_rate as usize * OUTPUT_BUFFER_SECS);
            let (producer, mut consumer): (HeapProd<f32>, HeapCons<f32>) = buffer.split();

            let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut sample_index = 0;
                while sample_index < data.len() {
                    let sample = consumer.try_pop().unwrap_or(0.0);
                    for _ in 0..channel_count.min(2) {
                        if sample_index < data.len() {
                            data[sample_index] = sample;
                            sample_index += 1;
                        }
                    }
                    sample_index += channel_count.saturating_sub(2);
                }
            };
            let stream = match device.build_output_stream(
                &stream_config,
                output_data_fn,
                move |err| tracing::error!("an error occurred on output stream: {}", err),
                None,
            ) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(DeviceError::Unavailable(e.to_string())));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(DeviceError::Unavailable(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok((device_rate, producer)));

            let _ = stop_rx.recv();
            drop(stream);
        });

        let (device_rate, producer) = ready_rx
            .recv()
            .map_err(|_| DeviceError::Unavailable("playback thread ended during open".to_string()))??;

        let resampler = utils::audio::create_resampler(
            sample_rate as f64,
            device_rate as f64,
            DEVICE_CHUNK_SIZE,
        )
        .map_err(|e| DeviceError::Unavailable(e.to_string()))?;

        Ok(Box::new(NativePlaybackSink {
            producer,
            resampler,
            source_rate: sample_rate,
            device_rate,
            started_at: Instant::now(),
            queued_until: 0.0,
            stop_tx: Some(stop_tx),
        }))
    }
}

struct NativePlaybackSink {
    producer: HeapProd<f32>,
    resampler: rubato::FastFixedIn<f32>,
    source_rate: u32,
    device_rate: u32,
    started_at: Instant,
    queued_until: f64,
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
}

impl NativePlaybackSink {
    fn push(&mut self, sample: f32) {
        if self.producer.try_push(sample).is_err() {
            tracing::warn!("output buffer full, dropping sample");
        }
    }
}

impl PlaybackSink for NativePlaybackSink {
    fn now(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    fn play_at(&mut self, samples: Vec<f32>, start: f64) {
        if self.stop_tx.is_none() {
            return;
        }
        // Pad up to the scheduled start relative to what has been queued;
        // underruns already played silence in real time, so pad from the
        // device clock in that case.
        let effective = self.queued_until.max(self.now());
        let gap = start - effective;
        if gap > 0.0 {
            let silence = (gap * self.device_rate as f64) as usize;
            for _ in 0..silence {
                self.push(0.0);
            }
        }

        let duration = samples.len() as f64 / self.source_rate as f64;
        let chunk_size = self.resampler.input_frames_next();
        for chunk in utils::audio::split_for_chunks(&samples, chunk_size) {
            if let Ok(resampled) = self.resampler.process(&[chunk.as_slice()], None) {
                if let Some(resampled) = resampled.first() {
                    for &sample in resampled {
                        self.push(sample);
                    }
                }
            }
        }
        self.queued_until = effective.max(start) + duration;
    }

    fn stop(&mut self) {
        // Dropping the sender releases the device thread and its stream.
        self.stop_tx.take();
        self.queued_until = 0.0;
    }
}

impl Drop for NativePlaybackSink {
    fn drop(&mut self) {
        self.stop();
    }
}
