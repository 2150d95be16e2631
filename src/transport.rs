use crate::error::TransportError;
use crate::events::InboundEvent;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use nimbus_live_types::{MediaChunk, SessionConfig};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

pub mod config;
mod consts;
pub mod ws;

/// Streams produced by a successful `SessionTransport::open`.
pub struct TransportStreams {
    pub handle: Box<dyn TransportHandle>,
    /// Ordered inbound events. Ends after a terminal event.
    pub events: mpsc::Receiver<InboundEvent>,
}

/// Abstraction over the bidirectional, message-oriented channel to the
/// remote session endpoint.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Connects and completes the session handshake. A resolved `open`
    /// means the remote side has acknowledged the session.
    async fn open(&self, config: SessionConfig) -> Result<TransportStreams, TransportError>;
}

/// Write side of one open connection.
#[cfg_attr(test, automock)]
pub trait TransportHandle: Send + Sync {
    /// Fire-and-forget upload of one media chunk. Never blocks: when the
    /// transport is saturated the oldest unsent chunk is dropped instead.
    fn send(&self, chunk: MediaChunk);

    /// Terminates the connection. Safe to call repeatedly.
    fn close(&mut self);
}

/// Bounded outbound buffer between the capture cadence and the socket
/// writer. Capture must never stall because upload is slow, so a saturated
/// queue sheds its oldest entry rather than applying backpressure.
pub(crate) struct OutboundQueue {
    inner: Mutex<VecDeque<MediaChunk>>,
    notify: Notify,
    closed: AtomicBool,
    capacity: usize,
}

impl OutboundQueue {
    pub(crate) fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            capacity,
        })
    }

    pub(crate) fn push(&self, chunk: MediaChunk) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        {
            let mut queue = match self.inner.lock() {
                Ok(queue) => queue,
                Err(poisoned) => poisoned.into_inner(),
            };
            if queue.len() == self.capacity {
                queue.pop_front();
                tracing::warn!("transport saturated, dropping oldest unsent frame");
            }
            queue.push_back(chunk);
        }
        self.notify.notify_one();
    }

    /// Next chunk to write, or `None` once the queue is closed and drained.
    pub(crate) async fn pop(&self) -> Option<MediaChunk> {
        loop {
            {
                let mut queue = match self.inner.lock() {
                    Ok(queue) => queue,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if let Some(chunk) = queue.pop_front() {
                    return Some(chunk);
                }
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(tag: &str) -> MediaChunk {
        MediaChunk::pcm(tag.to_string(), 16_000)
    }

    #[tokio::test]
    async fn queue_delivers_in_order() {
        let queue = OutboundQueue::new(4);
        queue.push(chunk("a"));
        queue.push(chunk("b"));
        assert_eq!(queue.pop().await.unwrap().data(), "a");
        assert_eq!(queue.pop().await.unwrap().data(), "b");
    }

    #[tokio::test]
    async fn saturated_queue_drops_the_oldest() {
        let queue = OutboundQueue::new(2);
        queue.push(chunk("a"));
        queue.push(chunk("b"));
        queue.push(chunk("c"));
        assert_eq!(queue.pop().await.unwrap().data(), "b");
        assert_eq!(queue.pop().await.unwrap().data(), "c");
        queue.close();
        assert!(queue.pop().await.is_none());
    }

    #[tokio::test]
    async fn closed_queue_drains_then_ends() {
        let queue = OutboundQueue::new(4);
        queue.push(chunk("a"));
        queue.close();
        assert_eq!(queue.pop().await.unwrap().data(), "a");
        assert!(queue.pop().await.is_none());
        // pushes after close are ignored
        queue.push(chunk("b"));
        assert!(queue.pop().await.is_none());
    }

    #[tokio::test]
    async fn pop_wakes_on_push() {
        let queue = OutboundQueue::new(4);
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::task::yield_now().await;
        queue.push(chunk("late"));
        let delivered = waiter.await.unwrap().unwrap();
        assert_eq!(delivered.data(), "late");
    }
}
