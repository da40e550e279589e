use crate::frame::EncodedFrame;
use bytes::Bytes;
use futures::Stream;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Decrements the live consumer count when the subscription goes away
struct ConsumerGuard {
    id: Uuid,
    active: Arc<AtomicUsize>,
}

impl Drop for ConsumerGuard {
    fn drop(&mut self) {
        let remaining = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
        info!(
            "Stream consumer {} disconnected ({} remaining)",
            self.id, remaining
        );
    }
}

/// One client's subscription to the frame fan-out.
///
/// The receiver buffers a bounded number of frames; when the client falls
/// behind, the oldest frames are dropped and delivery resumes with the
/// newest.
pub struct StreamConsumer {
    receiver: broadcast::Receiver<EncodedFrame>,
    stopped: CancellationToken,
    dropped: u64,
    guard: ConsumerGuard,
}

impl StreamConsumer {
    pub(crate) fn new(
        receiver: broadcast::Receiver<EncodedFrame>,
        stopped: CancellationToken,
        active: Arc<AtomicUsize>,
    ) -> Self {
        let id = Uuid::new_v4();
        let count = active.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Stream consumer {} connected ({} active)", id, count);

        Self {
            receiver,
            stopped,
            dropped: 0,
            guard: ConsumerGuard { id, active },
        }
    }

    pub fn id(&self) -> Uuid {
        self.guard.id
    }

    /// Frames this consumer lost by lagging behind
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    /// Wait for the next frame; `None` once the capture loop has stopped
    pub async fn next_frame(&mut self) -> Option<EncodedFrame> {
        loop {
            tokio::select! {
                _ = self.stopped.cancelled() => return None,
                result = self.receiver.recv() => match result {
                    Ok(frame) => return Some(frame),
                    Err(RecvError::Lagged(skipped)) => {
                        self.dropped += skipped;
                        debug!(
                            "Stream consumer {} lagged, dropped {} frames",
                            self.guard.id, skipped
                        );
                    }
                    Err(RecvError::Closed) => return None,
                },
            }
        }
    }

    /// Multipart body stream: one chunk per frame
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
        async_stream::stream! {
            while let Some(frame) = self.next_frame().await {
                yield Ok(frame.multipart_chunk());
            }
            debug!("Stream consumer {} finished", self.guard.id);
        }
    }
}
