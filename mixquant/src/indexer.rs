use std::sync::atomic::{AtomicU32, Ordering};

/// Hands out globally unique, dense fragment indices to concurrent workers.
#[derive(Debug, Default)]
pub struct Indexer {
    next: AtomicU32,
}

impl Indexer {
    pub fn new() -> Self {
        Self::default()
    }
    /// Return a fresh index.
    pub fn get(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
    /// Number of indices handed out so far.
    pub fn count(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }
}
