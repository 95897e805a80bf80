use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::debug;

/// One chunk of raw PCM audio on its way to the ASR backend.
///
/// Sequence numbers are assigned at ingest time, increase monotonically per
/// session, and are never reordered downstream.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Position of this frame in the session's audio stream.
    pub sequence: u64,
    /// Raw little-endian PCM16 bytes at the session's declared format.
    pub pcm: Vec<u8>,
}

/// Bounded FIFO between the audio producer and the transport forwarder.
///
/// `push` never blocks the producer: when the queue is full the oldest frame
/// is evicted, because a stale frame is worse than a gap on a real-time path.
/// Every eviction is counted and exposed through session diagnostics.
pub struct IngestQueue {
    frames: Mutex<VecDeque<AudioFrame>>,
    capacity: usize,
    next_sequence: AtomicU64,
    dropped: AtomicU64,
    pushed: AtomicU64,
    notify: Notify,
}

impl IngestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            next_sequence: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            pushed: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    /// Enqueue a frame, assigning its sequence number. Non-blocking.
    ///
    /// Returns the assigned sequence number.
    pub fn push(&self, pcm: Vec<u8>) -> u64 {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let frame = AudioFrame { sequence, pcm };

        {
            let mut frames = self.frames.lock().expect("ingest queue poisoned");
            if frames.len() >= self.capacity {
                if let Some(evicted) = frames.pop_front() {
                    self.dropped.fetch_add(1, Ordering::SeqCst);
                    debug!(sequence = evicted.sequence, "Ingest queue full, dropped oldest frame");
                }
            }
            frames.push_back(frame);
        }

        self.pushed.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
        sequence
    }

    /// Dequeue the oldest frame, if any.
    pub fn pop(&self) -> Option<AudioFrame> {
        let mut frames = self.frames.lock().expect("ingest queue poisoned");
        frames.pop_front()
    }

    /// Wait until a frame may be available. Pair with `pop` in a loop; a
    /// wakeup does not guarantee a frame.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    /// Wake any waiter without enqueueing, used during shutdown.
    pub fn wake(&self) {
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.frames.lock().expect("ingest queue poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames evicted because the queue was full.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Frames accepted by `push` over the session lifetime.
    pub fn pushed_frames(&self) -> u64 {
        self.pushed.load(Ordering::SeqCst)
    }
}
