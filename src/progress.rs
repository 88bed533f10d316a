/// Trait for reporting batch progress.
///
/// The CLI implements it with an indicatif bar. All methods have default no-op
/// implementations.
pub trait ProgressReporter {
    fn on_batch_start(&self, _total_rows: usize) {}
    fn on_row_skipped(&self, _row: usize, _image_id: &str) {}
    fn on_row_missing(&self, _row: usize, _image_id: &str) {}
    fn on_row_described(&self, _row: usize, _image_id: &str, _words: u64) {}
    fn on_row_failed(&self, _row: usize, _image_id: &str) {}
    fn on_checkpoint(&self, _processed: usize) {}
    fn on_batch_complete(&self, _processed: usize, _skipped: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
