// Build metrics module
//
// Lock-free counters updated from every traversal branch, summarised once
// at the end of a build.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters for one build
#[derive(Debug)]
pub struct BuildMetrics {
    /// Files run through a leaf compiler
    pub files_compiled: AtomicUsize,

    /// Files copied byte for byte
    pub files_copied: AtomicUsize,

    /// Tests and template partials
    pub files_skipped: AtomicUsize,

    /// Files matching an exclusion pattern
    pub files_excluded: AtomicUsize,

    /// Modules in the written loader document
    pub modules_registered: AtomicUsize,

    pub locales_compiled: AtomicUsize,

    pub bytes_written: AtomicU64,

    /// Time spent inside leaf compilers, in milliseconds
    pub compile_time_ms: AtomicU64,

    start_time: Instant,
}

impl BuildMetrics {
    pub fn new() -> Self {
        Self {
            files_compiled: AtomicUsize::new(0),
            files_copied: AtomicUsize::new(0),
            files_skipped: AtomicUsize::new(0),
            files_excluded: AtomicUsize::new(0),
            modules_registered: AtomicUsize::new(0),
            locales_compiled: AtomicUsize::new(0),
            bytes_written: AtomicU64::new(0),
            compile_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_compiled(&self, bytes: usize, duration: Duration) {
        self.files_compiled.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
        self.compile_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_copied(&self, bytes: u64) {
        self.files_copied.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_excluded(&self) {
        self.files_excluded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_modules(&self, count: usize) {
        self.modules_registered.store(count, Ordering::Relaxed);
    }

    pub fn record_locale(&self, bytes: usize) {
        self.locales_compiled.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Every file the build traversal reported back
    pub fn files_processed(&self) -> usize {
        self.files_compiled.load(Ordering::Relaxed)
            + self.files_copied.load(Ordering::Relaxed)
            + self.files_skipped.load(Ordering::Relaxed)
            + self.files_excluded.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn avg_compile_time_ms(&self) -> f64 {
        let total = self.compile_time_ms.load(Ordering::Relaxed);
        let count = self.files_compiled.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Build Summary ===");
        tracing::info!("Elapsed: {:.2}s", self.elapsed().as_secs_f64());
        tracing::info!(
            "Files: {} compiled, {} copied, {} skipped, {} excluded",
            self.files_compiled.load(Ordering::Relaxed),
            self.files_copied.load(Ordering::Relaxed),
            self.files_skipped.load(Ordering::Relaxed),
            self.files_excluded.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Modules: {}, locales: {}",
            self.modules_registered.load(Ordering::Relaxed),
            self.locales_compiled.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Wrote {} bytes, compile time {:.2}s (avg: {:.2}ms per file)",
            self.bytes_written.load(Ordering::Relaxed),
            self.compile_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_compile_time_ms()
        );
    }
}

impl Default for BuildMetrics {
    fn default() -> Self {
        Self::new()
    }
}
