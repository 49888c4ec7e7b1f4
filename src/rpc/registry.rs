//! Correlation ids and the table of calls waiting for a response.
use chashmap::CHashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::frame::Frame;

/// Issues correlation ids for client requests.
///
/// Ids start at zero and grow by two. Odd ids are left to the gateway.
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    next: AtomicU64,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> u64 {
        self.next.fetch_add(2, Ordering::SeqCst)
    }
}

/// Function run with the first frame that carries the id it was registered for.
pub struct Continuation(Box<dyn FnOnce(Frame) + Send + Sync + 'static>);

impl Continuation {
    pub fn new(f: impl FnOnce(Frame) + Send + Sync + 'static) -> Self {
        Self(Box::new(f))
    }

    fn run(self, frame: Frame) {
        (self.0)(frame)
    }
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Continuation")
    }
}

/// Pending calls keyed by correlation id.
///
/// There is no timeout. An entry stays until a frame with its id arrives.
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    pending: CHashMap<i64, Continuation>,
    unmatched: AtomicU64,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `continuation` for `id`.
    ///
    /// A continuation already registered for `id` is replaced and never runs.
    pub fn register(&self, id: i64, continuation: Continuation) {
        if self.pending.insert(id, continuation).is_some() {
            tracing::debug!(id, "replaced pending continuation");
        }
    }

    /// Run and remove the continuation registered for `id`.
    ///
    /// Returns `false` if nothing is registered. The frame is dropped in that
    /// case and the miss is counted.
    pub fn dispatch(&self, id: i64, frame: Frame) -> bool {
        match self.pending.remove(&id) {
            Some(continuation) => {
                continuation.run(frame);
                true
            }
            None => {
                self.unmatched.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Drop the continuation registered for `id` without running it.
    ///
    /// Unlike [CallbackRegistry::dispatch] this does not count a miss.
    pub fn remove(&self, id: i64) -> bool {
        self.pending.remove(&id).is_some()
    }

    pub fn is_pending(&self, id: i64) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of frames passed to [CallbackRegistry::dispatch] that had no
    /// pending continuation.
    pub fn unmatched_count(&self) -> u64 {
        self.unmatched.load(Ordering::Relaxed)
    }
}
