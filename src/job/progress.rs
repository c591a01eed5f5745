use std::sync::atomic::{AtomicU8, Ordering};

/// Monotonic progress of one job
///
/// Progress only moves forward and is capped at 100, so late reports from
/// concurrent stages can never make it go backwards.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    value: AtomicU8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a previously persisted value
    pub fn starting_at(progress: u8) -> Self {
        Self {
            value: AtomicU8::new(progress.min(100)),
        }
    }

    /// Raises progress to `progress`
    ///
    /// Returns the new value, or None if it was not higher than the current one.
    pub fn advance(&self, progress: u8) -> Option<u8> {
        let progress = progress.min(100);
        let previous = self.value.fetch_max(progress, Ordering::SeqCst);
        (progress > previous).then_some(progress)
    }

    pub fn current(&self) -> u8 {
        self.value.load(Ordering::SeqCst)
    }
}
