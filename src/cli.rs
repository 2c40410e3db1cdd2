/// Command-line arguments shared by the forecast binaries.
///
/// Every binary needs the same three things: a configuration, a reading
/// source and a log setup. `CommonArgs` is flattened into each parser.

use chrono::{DateTime, Utc};
use clap::Args;
use std::error::Error;
use std::path::PathBuf;
use tracing::info;

use crate::config::{CONFIG_ENV_VAR, ConfigError, ForecastConfig, MODEL_PATH_ENV_VAR};
use crate::db;
use crate::forecast::artifact::FileArtifactStore;
use crate::ingest::postgres::PgReadingSource;
use crate::ingest::{ReadingSource, load_readings_json};
use crate::logging::{LogFormat, init_logging};

#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Path to forecast.toml (default: ./forecast.toml, then built-in defaults)
    #[arg(long, value_name = "FILE", env = CONFIG_ENV_VAR)]
    pub config: Option<PathBuf>,

    /// Override forecast.model_path
    #[arg(long, value_name = "FILE", env = MODEL_PATH_ENV_VAR)]
    pub model: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct InputArgs {
    /// Read readings from a JSON export instead of the database
    #[arg(long, value_name = "FILE")]
    pub readings: Option<PathBuf>,

    /// Read readings from PostgreSQL (DATABASE_URL, .env supported)
    #[arg(long)]
    pub database: bool,
}

/// An opened reading source plus the newest reading time, when known.
pub struct OpenedSource {
    pub source: Box<dyn ReadingSource>,
    pub latest: Option<DateTime<Utc>>,
}

impl CommonArgs {
    pub fn init_logging(&self) {
        let format = if self.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        };
        init_logging("info", format);
    }

    /// Loads the configuration, honouring `--config` and `--model` (or
    /// their environment variables).
    pub fn load_config(&self) -> Result<ForecastConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => {
                let config = ForecastConfig::load_from_file(path)?;
                info!(path = %path.display(), "Loaded forecast config");
                config
            }
            None => ForecastConfig::load()?,
        };
        if let Some(model) = &self.model {
            config.model_path = model.clone();
        }
        Ok(config)
    }

    pub fn artifact_store(&self, config: &ForecastConfig) -> FileArtifactStore {
        FileArtifactStore::new(config.model_path.clone())
    }

    /// Opens the reading source selected on the command line.
    pub fn open_source(&self) -> Result<OpenedSource, Box<dyn Error>> {
        match &self.input.readings {
            Some(path) => {
                let readings = load_readings_json(path)?;
                let latest = readings.latest_timestamp();
                info!(path = %path.display(), readings = readings.len(), "Loaded reading export");
                Ok(OpenedSource {
                    source: Box::new(readings),
                    latest,
                })
            }
            None => {
                let client = db::connect_and_verify()?;
                Ok(OpenedSource {
                    source: Box::new(PgReadingSource::new(client)),
                    latest: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, Parser};

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        common: CommonArgs,
    }

    #[test]
    fn test_config_and_model_read_their_environment_variables() {
        let command = TestCli::command();
        let env_of = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .map(|env| env.to_string_lossy().into_owned())
        };
        assert_eq!(env_of("config").as_deref(), Some("FLOMON_FORECAST_CONFIG"));
        assert_eq!(env_of("model").as_deref(), Some("FLOMON_MODEL_PATH"));
    }

    #[test]
    fn test_input_source_is_required() {
        assert!(TestCli::try_parse_from(["bin"]).is_err());
    }

    #[test]
    fn test_readings_and_database_are_exclusive() {
        let result = TestCli::try_parse_from(["bin", "--readings", "x.json", "--database"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_model_flag_overrides_config() {
        let cli = TestCli::try_parse_from([
            "bin",
            "--config",
            concat!(env!("CARGO_MANIFEST_DIR"), "/forecast.toml"),
            "--model",
            "/tmp/other.json",
            "--database",
        ])
        .unwrap();
        let config = cli.common.load_config().unwrap();
        assert_eq!(config.model_path, PathBuf::from("/tmp/other.json"));
    }
}
