// std imports
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Called with (finished databases, total databases) whenever a database is finished
///
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Thread safe progress of the per-database phase
///
#[derive(Default)]
pub struct ProgressCounter {
    total: AtomicUsize,
    processed: AtomicUsize,
    failed: AtomicUsize,
    callback: Option<ProgressCallback>,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a callback which is called after each finished database
    ///
    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Sets the number of databases and resets the counts
    ///
    pub fn reset(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.processed.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
    }

    pub fn increment_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.notify();
    }

    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.notify();
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    /// Processed and failed databases
    ///
    pub fn finished(&self) -> usize {
        self.processed() + self.failed()
    }

    fn notify(&self) {
        if let Some(callback) = &self.callback {
            callback(self.finished(), self.total());
        }
    }
}
