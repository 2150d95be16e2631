use crate::capture::{CaptureProvider, CaptureStreams, VideoSource, VIDEO_FRAME_INTERVAL_SECS};
use crate::dispatch::{Dispatcher, EndCause};
use crate::error::{SessionError, TransportError};
use crate::playback::{PlaybackProvider, PlaybackScheduler};
use crate::transcript::{PartialCaption, Turn};
use crate::transport::{SessionTransport, TransportHandle, TransportStreams};
use nimbus_live_types::{MediaChunk, SessionConfig};
use nimbus_live_utils as utils;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

/// Lifecycle of one live session. `Errored` is absorbing: the caller must
/// start a new session to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Closing,
    Closed,
    Errored,
}

struct Inner {
    stop_tx: Option<mpsc::Sender<()>>,
    driver: Option<tokio::task::JoinHandle<()>>,
}

/// One live, low-latency conversation with the remote model: microphone
/// (and optionally camera) streamed up, transcript fragments and synthesized
/// audio streamed back.
///
/// All session resources are owned by a single driver task; `start` and
/// `stop` only post into it, so every exit path funnels through one
/// teardown routine.
pub struct LiveSession {
    capture: Arc<dyn CaptureProvider>,
    transport: Arc<dyn SessionTransport>,
    playback: Arc<dyn PlaybackProvider>,
    state_tx: watch::Sender<SessionState>,
    caption_tx: watch::Sender<PartialCaption>,
    turns_tx: watch::Sender<Vec<Turn>>,
    error_tx: watch::Sender<Option<String>>,
    inner: tokio::sync::Mutex<Inner>,
}

impl LiveSession {
    pub fn new(
        capture: Arc<dyn CaptureProvider>,
        transport: Arc<dyn SessionTransport>,
        playback: Arc<dyn PlaybackProvider>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        let (caption_tx, _) = watch::channel(PartialCaption::default());
        let (turns_tx, _) = watch::channel(Vec::new());
        let (error_tx, _) = watch::channel(None);
        Self {
            capture,
            transport,
            playback,
            state_tx,
            caption_tx,
            turns_tx,
            error_tx,
            inner: tokio::sync::Mutex::new(Inner {
                stop_tx: None,
                driver: None,
            }),
        }
    }

    /// Current lifecycle state, as a read-only subscription.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Live partial transcript of the in-progress turn.
    pub fn captions(&self) -> watch::Receiver<PartialCaption> {
        self.caption_tx.subscribe()
    }

    /// Finalized turn log, ordered and append-only. Survives session
    /// failure; cleared on the next `start`.
    pub fn turns(&self) -> watch::Receiver<Vec<Turn>> {
        self.turns_tx.subscribe()
    }

    /// The failure message of the most recent session, if it errored.
    /// Set exactly once per failure.
    pub fn last_error(&self) -> watch::Receiver<Option<String>> {
        self.error_tx.subscribe()
    }

    /// Starts a session: acquires local capture hardware first, then opens
    /// the transport. Resolves once the remote side has acknowledged the
    /// session, or with the error that prevented it.
    pub async fn start(&self, config: SessionConfig) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if matches!(
            *self.state_tx.borrow(),
            SessionState::Connecting | SessionState::Active | SessionState::Closing
        ) {
            return Err(SessionError::AlreadyActive);
        }

        self.caption_tx.send_replace(PartialCaption::default());
        self.turns_tx.send_replace(Vec::new());
        self.error_tx.send_replace(None);
        self.state_tx.send_replace(SessionState::Connecting);

        let (stop_tx, stop_rx) = mpsc::channel(1);
        let (ready_tx, ready_rx) = oneshot::channel();
        let driver = Driver {
            capture: self.capture.clone(),
            transport: self.transport.clone(),
            playback: self.playback.clone(),
            state_tx: self.state_tx.clone(),
            caption_tx: self.caption_tx.clone(),
            turns_tx: self.turns_tx.clone(),
            error_tx: self.error_tx.clone(),
            stop_rx,
            config,
        };
        inner.stop_tx = Some(stop_tx);
        inner.driver = Some(tokio::spawn(driver.run(ready_tx)));
        drop(inner);

        match ready_rx.await {
            Ok(result) => result,
            Err(_) => Err(SessionError::Transport(TransportError::Fault(
                "session task ended before start completed".to_string(),
            ))),
        }
    }

    /// Stops the session and waits for teardown to finish. Idempotent, safe
    /// from any state; cancels an in-flight `start` as well.
    pub async fn stop(&self) {
        let (stop_tx, driver) = {
            let mut inner = self.inner.lock().await;
            (inner.stop_tx.take(), inner.driver.take())
        };
        if let Some(stop_tx) = stop_tx {
            // Fails only if the driver already tore itself down.
            let _ = stop_tx.send(()).await;
        }
        if let Some(driver) = driver {
            let _ = driver.await;
        }
    }
}

struct Driver {
    capture: Arc<dyn CaptureProvider>,
    transport: Arc<dyn SessionTransport>,
    playback: Arc<dyn PlaybackProvider>,
    state_tx: watch::Sender<SessionState>,
    caption_tx: watch::Sender<PartialCaption>,
    turns_tx: watch::Sender<Vec<Turn>>,
    error_tx: watch::Sender<Option<String>>,
    stop_rx: mpsc::Receiver<()>,
    config: SessionConfig,
}

impl Driver {
    async fn run(mut self, ready_tx: oneshot::Sender<Result<(), SessionError>>) {
        // Local hardware before network: if the devices are not there, no
        // transport is ever opened.
        let mut capture_streams = match self.capture.open(self.config.clone()).await {
            Ok(streams) => streams,
            Err(e) => {
                tracing::error!("failed to acquire capture devices: {}", e);
                self.error_tx.send_replace(Some(e.to_string()));
                self.state_tx.send_replace(SessionState::Errored);
                let _ = ready_tx.send(Err(e.into()));
                return;
            }
        };

        let transport = self.transport.clone();
        let open_config = self.config.clone();
        let mut open_task = tokio::spawn(async move { transport.open(open_config).await });

        let transport_streams = tokio::select! {
            _ = self.stop_rx.recv() => {
                // Concede the in-flight open: drain it off to the side and
                // discard whatever it resolves to.
                tokio::spawn(async move {
                    match open_task.await {
                        Ok(Ok(mut streams)) => streams.handle.close(),
                        Ok(Err(e)) => {
                            tracing::debug!("discarding result of cancelled open: {}", e)
                        }
                        Err(e) => tracing::debug!("cancelled open task failed: {}", e),
                    }
                });
                self.capture.close().await;
                self.state_tx.send_replace(SessionState::Closed);
                let _ = ready_tx.send(Err(SessionError::Cancelled));
                return;
            }
            result = &mut open_task => match result {
                Ok(Ok(streams)) => streams,
                Ok(Err(e)) => {
                    tracing::error!("failed to open session transport: {}", e);
                    self.capture.close().await;
                    self.error_tx.send_replace(Some(e.to_string()));
                    self.state_tx.send_replace(SessionState::Errored);
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
                Err(e) => {
                    self.capture.close().await;
                    let fault = TransportError::Fault(format!("open task failed: {}", e));
                    self.error_tx.send_replace(Some(fault.to_string()));
                    self.state_tx.send_replace(SessionState::Errored);
                    let _ = ready_tx.send(Err(fault.into()));
                    return;
                }
            },
        };

        self.state_tx.send_replace(SessionState::Active);
        let _ = ready_tx.send(Ok(()));

        let TransportStreams {
            mut handle,
            mut events,
        } = transport_streams;

        let playback =
            PlaybackScheduler::new(self.playback.clone(), self.config.output_sample_rate());
        let mut dispatcher =
            Dispatcher::new(playback, self.caption_tx.clone(), self.turns_tx.clone());

        let mut video = capture_streams.video.take();
        let mut frame_timer = video.as_ref().map(|_| {
            let period = Duration::from_secs(VIDEO_FRAME_INTERVAL_SECS);
            tokio::time::interval_at(tokio::time::Instant::now() + period, period)
        });

        let cause = loop {
            tokio::select! {
                _ = self.stop_rx.recv() => break EndCause::UserStop,
                frame = capture_streams.audio.recv() => match frame {
                    Some(frame) => {
                        let data = utils::audio::encode(&frame.samples);
                        handle.send(MediaChunk::pcm(data, frame.sample_rate));
                    }
                    None => break EndCause::Fault("capture device stopped unexpectedly".to_string()),
                },
                event = events.recv() => match event {
                    Some(event) => {
                        if let Some(cause) = dispatcher.handle(event) {
                            break cause;
                        }
                    }
                    None => break EndCause::RemoteClosed,
                },
                _ = async {
                    // No camera, no timer: this arm then never completes.
                    match frame_timer.as_mut() {
                        Some(timer) => { timer.tick().await; }
                        None => std::future::pending().await,
                    }
                } => {
                    if let Some(source) = video.as_mut() {
                        Self::send_still(source, handle.as_ref()).await;
                    }
                }
            }
        };

        self.teardown(cause, frame_timer, video, capture_streams, handle, dispatcher)
            .await;
    }

    async fn send_still(source: &mut Box<dyn VideoSource>, handle: &dyn TransportHandle) {
        let Some(picture) = source.grab().await else {
            tracing::warn!("camera returned no picture for this tick");
            return;
        };
        match utils::visual::compress_still(&picture) {
            Ok(jpeg) => handle.send(MediaChunk::jpeg(utils::visual::encode(&jpeg))),
            Err(e) => tracing::warn!("failed to compress camera still: {}", e),
        }
    }

    /// The one teardown routine every exit path converges on. Release
    /// order: frame timer, capture hardware, transport, playback output.
    async fn teardown(
        &mut self,
        cause: EndCause,
        frame_timer: Option<tokio::time::Interval>,
        video: Option<Box<dyn VideoSource>>,
        mut capture_streams: CaptureStreams,
        mut handle: Box<dyn TransportHandle>,
        mut dispatcher: Dispatcher,
    ) {
        tracing::info!(?cause, "tearing down session");
        self.state_tx.send_replace(SessionState::Closing);

        // The still timer must stop before the camera goes away.
        drop(frame_timer);
        drop(video);

        capture_streams.audio.close();
        self.capture.close().await;
        handle.close();
        dispatcher.reset_playback();

        let final_state = match cause {
            EndCause::Fault(reason) => {
                self.error_tx.send_replace(Some(reason));
                SessionState::Errored
            }
            EndCause::UserStop | EndCause::RemoteClosed => SessionState::Closed,
        };
        self.state_tx.send_replace(final_state);
    }
}
