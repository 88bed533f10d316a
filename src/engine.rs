use crate::client::{DescriptionService, OpenAiClient};
use crate::config::AppConfig;
use crate::encoder;
use crate::error::Error;
use crate::governor::{CallGovernor, RetryPolicy};
use crate::progress::ProgressReporter;
use crate::prompt;
use crate::reconcile;
use crate::table::WorkingTable;
use chrono::{SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Rough tokens-per-word ratio. This is a heuristic, not a tokenizer count.
const TOKENS_PER_WORD: f64 = 1.3;

/// Counters for one run. Only logged, never persisted.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunResult {
    pub processed: usize,
    pub skipped: usize,
    /// Rows whose image could not be found.
    pub missing: usize,
    /// Rows the service could not describe after all retries.
    pub failed: usize,
    pub total_words: u64,
    pub total_tokens: u64,
    pub checkpoints: usize,
    pub duration: Duration,
}

/// What the batch loop needs from the configuration.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub images_root: PathBuf,
    pub model: String,
    pub prompt: String,
    pub save_every: usize,
}

impl BatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            images_root: config.paths.images_root.clone(),
            model: config.openai.model.clone(),
            prompt: prompt::render_prompt(&config.target),
            save_every: config.batch.save_every.max(1),
        }
    }
}

/// Destination for checkpoints. Every call replaces what was saved before.
pub trait TableSink {
    fn save(&mut self, table: &WorkingTable) -> Result<(), Error>;
}

/// Persists the table as a CSV file.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableSink for CsvSink {
    fn save(&mut self, table: &WorkingTable) -> Result<(), Error> {
        table.write_csv(&self.path)?;
        debug!("Saved {} rows to {}", table.len(), self.path.display());
        Ok(())
    }
}

pub struct DescribeEngine {
    config: AppConfig,
}

impl DescribeEngine {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the full batch against the OpenAI API, checkpointing to the
    /// configured output CSV.
    pub fn run(&self, reporter: &dyn ProgressReporter) -> Result<RunResult, Error> {
        let client = OpenAiClient::from_env(&self.config.openai)?;
        let mut sink = CsvSink::new(&self.config.paths.output_csv);
        self.run_with(client, &mut sink, reporter)
    }

    /// Same as [`run`](Self::run) with the service and sink supplied by the caller.
    pub fn run_with<S, K>(
        &self,
        service: S,
        sink: &mut K,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunResult, Error>
    where
        S: DescriptionService,
        K: TableSink,
    {
        let mut table = reconcile::load_working_table(
            &self.config.paths.input_csv,
            &self.config.paths.output_csv,
        )?;
        info!(
            "Working table has {} rows from {}",
            table.len(),
            self.config.paths.input_csv.display()
        );

        let governor = CallGovernor::new(service, RetryPolicy::from(&self.config.openai));
        let settings = BatchSettings::from_config(&self.config);
        run_batch(&mut table, &settings, &governor, sink, reporter)
    }
}

/// Describe every pending row of `table` in order.
///
/// Rows that already have a description are skipped without a call. Rows whose
/// image is missing, or that the service cannot describe, are left untouched and
/// the batch moves on. The table is saved after every `save_every` successes and
/// once more at the end.
pub fn run_batch<S, K>(
    table: &mut WorkingTable,
    settings: &BatchSettings,
    governor: &CallGovernor<S>,
    sink: &mut K,
    reporter: &dyn ProgressReporter,
) -> Result<RunResult, Error>
where
    S: DescriptionService,
    K: TableSink,
{
    let start = Instant::now();
    let save_every = settings.save_every.max(1);
    let mut result = RunResult::default();

    reporter.on_batch_start(table.len());

    for idx in 0..table.len() {
        let Some(row) = table.catalog_row(idx) else {
            continue;
        };

        if row.has_description() {
            result.skipped += 1;
            reporter.on_row_skipped(idx, &row.image_id);
            continue;
        }

        let image_path = resolve_image_path(&settings.images_root, &row.image_path);
        let image_data_url = match encoder::encode_image(&image_path) {
            Ok(url) => url,
            Err(err) => {
                warn!("Skipping {}: {}", row.image_id, err);
                result.missing += 1;
                reporter.on_row_missing(idx, &row.image_id);
                continue;
            }
        };

        let Some(description) =
            governor.describe(&settings.model, &settings.prompt, &image_data_url)
        else {
            warn!("No description obtained for {}", image_path.display());
            result.failed += 1;
            reporter.on_row_failed(idx, &row.image_id);
            continue;
        };

        let description = description.trim();
        let words = count_words(description);
        let tokens = estimate_tokens(words);
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        table.record_description(idx, description, words, tokens, &timestamp);

        result.processed += 1;
        result.total_words += words;
        result.total_tokens += tokens;
        reporter.on_row_described(idx, &row.image_id, words);

        if result.processed % save_every == 0 {
            sink.save(table)?;
            result.checkpoints += 1;
            reporter.on_checkpoint(result.processed);
            info!("Checkpoint saved after {} descriptions", result.processed);
        }
    }

    sink.save(table)?;
    result.checkpoints += 1;
    result.duration = start.elapsed();

    reporter.on_batch_complete(
        result.processed,
        result.skipped,
        result.duration.as_secs_f64(),
    );
    Ok(result)
}

/// Relative image paths are taken from `images_root`.
pub fn resolve_image_path(images_root: &Path, image_path: &str) -> PathBuf {
    let path = Path::new(image_path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        images_root.join(path)
    }
}

/// Number of whitespace-separated words in `text`.
pub fn count_words(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Approximate token count for `words` words: `round(words * 1.3)`.
pub fn estimate_tokens(words: u64) -> u64 {
    (words as f64 * TOKENS_PER_WORD).round() as u64
}
