pub mod client;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod governor;
pub mod progress;
pub mod prompt;
pub mod reconcile;
pub mod stats;
pub mod table;

pub use config::AppConfig;
pub use engine::{DescribeEngine, RunResult, TableSink};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
pub use table::{CatalogRow, WorkingTable};
