use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use vision_descr::ProgressReporter;

/// CLI progress reporter: one bar over all rows of the working table.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_batch_start(&self, total_rows: usize) {
        let pb = ProgressBar::new(total_rows as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "  {spinner:.cyan} Describing [{bar:30.cyan/dim}] {pos}/{len} rows ({eta} remaining) {msg}",
        ) {
            pb.set_style(
                style
                    .progress_chars("━╸─")
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
            );
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(80));
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn on_row_skipped(&self, _row: usize, _image_id: &str) {
        self.with_bar(|pb| pb.inc(1));
    }

    fn on_row_missing(&self, _row: usize, image_id: &str) {
        self.with_bar(|pb| {
            pb.set_message(format!("missing image for {}", image_id));
            pb.inc(1);
        });
    }

    fn on_row_described(&self, _row: usize, image_id: &str, words: u64) {
        self.with_bar(|pb| {
            pb.set_message(format!("{} ({} words)", image_id, words));
            pb.inc(1);
        });
    }

    fn on_row_failed(&self, _row: usize, image_id: &str) {
        self.with_bar(|pb| {
            pb.set_message(format!("no description for {}", image_id));
            pb.inc(1);
        });
    }

    fn on_batch_complete(&self, processed: usize, skipped: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Batch complete: {} described, {} skipped in {:.2}s",
            processed, skipped, duration_secs
        );
    }
}
