// Run progress and cancellation
//
// Snapshots are monotonic within a run so pollers can render progress without
// coordination. Cancellation is checked between files; a cancelled run leaves
// every already-merged file intact.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub files_seen: usize,
    pub files_indexed: usize,
    pub elapsed_ms: u64,
}

#[derive(Clone)]
pub struct ProgressHandle {
    files_seen: Arc<AtomicUsize>,
    files_indexed: Arc<AtomicUsize>,
    started: Instant,
}

impl Default for ProgressHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressHandle {
    pub fn new() -> Self {
        Self {
            files_seen: Arc::new(AtomicUsize::new(0)),
            files_indexed: Arc::new(AtomicUsize::new(0)),
            started: Instant::now(),
        }
    }

    pub fn set_files_seen(&self, count: usize) {
        self.files_seen.fetch_max(count, Ordering::Relaxed);
    }

    pub fn file_indexed(&self) {
        self.files_indexed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            files_seen: self.files_seen.load(Ordering::Relaxed),
            files_indexed: self.files_indexed.load(Ordering::Relaxed),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_are_monotonic() {
        let progress = ProgressHandle::new();
        progress.set_files_seen(10);
        progress.set_files_seen(4); // lower values never regress the counter
        progress.file_indexed();
        let snapshot = progress.snapshot();
        assert_eq!(snapshot.files_seen, 10);
        assert_eq!(snapshot.files_indexed, 1);
    }

    #[test]
    fn cancel_token_flips_once() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }
}
