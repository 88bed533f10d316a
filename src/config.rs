use crate::error::Error;
use config::{Config, Environment, File as ConfigFile, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Fully resolved settings for one invocation. Paths are absolute.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub openai: OpenAiConfig,
    pub target: TargetConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub images_root: PathBuf,
    pub input_csv: PathBuf,
    pub output_csv: PathBuf,
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub model: String,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub min_words: u32,
    pub max_words: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub save_every: usize,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    paths: PathsConfig,
    openai: OpenAiConfig,
    target: TargetConfig,
    batch: BatchConfig,
}

/// Load `config.toml` (or `config_path`), apply defaults and `VISION_DESCR__*`
/// environment overrides, then resolve relative paths against the file's directory.
pub fn load_configuration(config_path: Option<&Path>) -> Result<AppConfig, Error> {
    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    if !path.is_file() {
        return Err(Error::Configuration(format!(
            "configuration file not found: {}",
            path.display()
        )));
    }

    let builder = Config::builder()
        .set_default("paths.images_root", "./images")?
        .set_default("paths.input_csv", "./data/creatives_input.csv")?
        .set_default("paths.output_csv", "./data/creatives_master.csv")?
        .set_default("paths.log_file", "./logs/describe.log")?
        .set_default("openai.model", "gpt-4o-mini")?
        .set_default("openai.max_retries", 5)?
        .set_default("openai.retry_delay_seconds", 5)?
        .set_default("openai.base_url", "https://api.openai.com/v1")?
        .set_default("openai.timeout_seconds", 120)?
        .set_default("target.min_words", 80)?
        .set_default("target.max_words", 100)?
        .set_default("batch.save_every", 5)?
        .add_source(ConfigFile::from(path).format(FileFormat::Toml))
        .add_source(Environment::with_prefix("VISION_DESCR").separator("__"))
        .build()?;

    let raw = builder.try_deserialize::<RawConfig>()?;
    let base_dir = fs::canonicalize(path)?
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let config = AppConfig {
        paths: PathsConfig {
            images_root: resolve_path(&base_dir, &raw.paths.images_root),
            input_csv: resolve_path(&base_dir, &raw.paths.input_csv),
            output_csv: resolve_path(&base_dir, &raw.paths.output_csv),
            log_file: resolve_path(&base_dir, &raw.paths.log_file),
        },
        openai: raw.openai,
        target: raw.target,
        batch: raw.batch,
    };
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.openai.max_retries < 1 {
            return Err(Error::Configuration(
                "openai.max_retries must be at least 1".to_string(),
            ));
        }
        if self.batch.save_every < 1 {
            return Err(Error::Configuration(
                "batch.save_every must be at least 1".to_string(),
            ));
        }
        if self.target.min_words > self.target.max_words {
            return Err(Error::Configuration(format!(
                "target.min_words ({}) exceeds target.max_words ({})",
                self.target.min_words, self.target.max_words
            )));
        }
        Ok(())
    }
}

fn resolve_path(base_dir: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base_dir.join(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_resolve_against_config_dir() {
        let tmp = tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[openai]\nmodel = \"gpt-4.1-nano\"\n").unwrap();

        let config = load_configuration(Some(&config_path)).unwrap();
        let base = fs::canonicalize(tmp.path()).unwrap();

        assert_eq!(config.openai.model, "gpt-4.1-nano");
        assert_eq!(config.openai.max_retries, 5);
        assert_eq!(config.batch.save_every, 5);
        assert_eq!(config.target.min_words, 80);
        assert_eq!(config.target.max_words, 100);
        assert!(config.target.prompt_template.is_none());
        assert_eq!(config.paths.images_root, base.join("./images"));
        assert_eq!(config.paths.output_csv, base.join("./data/creatives_master.csv"));
    }

    #[test]
    fn test_absolute_paths_kept() {
        let tmp = tempdir().unwrap();
        let images = tmp.path().join("elsewhere");
        let config_path = tmp.path().join("alt.toml");
        fs::write(
            &config_path,
            format!("[paths]\nimages_root = {:?}\n", images.to_string_lossy()),
        )
        .unwrap();

        let config = load_configuration(Some(&config_path)).unwrap();
        assert_eq!(config.paths.images_root, images);
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let tmp = tempdir().unwrap();
        let err = load_configuration(Some(&tmp.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_zero_save_every_rejected() {
        let tmp = tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[batch]\nsave_every = 0\n").unwrap();

        let err = load_configuration(Some(&config_path)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_zero_retries_rejected() {
        let tmp = tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[openai]\nmax_retries = 0\n").unwrap();

        let err = load_configuration(Some(&config_path)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
