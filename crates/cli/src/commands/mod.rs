pub mod calculate;
pub mod config;
pub mod doctor;
pub mod expand;
pub mod lookup;
pub mod migrate;
pub mod quote;
pub mod seed;

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tariff_core::config::{AppConfig, LoadOptions};
use tariff_core::{ReferenceDataset, ReferenceStore, TariffError};
use tariff_db::{connect_with_config, InMemoryReferenceStore, SqlReferenceStore};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: None,
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn success_with(command: &str, message: impl Into<String>, data: impl Serialize) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), 1);
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: None,
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            correlation_id: None,
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Renders an engine error through the interface mapping so callers see
    /// the same message a service boundary would return.
    pub fn from_tariff_error(command: &str, error: TariffError) -> Self {
        let exit_code = match &error {
            TariffError::InvalidArgument(_) | TariffError::Arithmetic(_) => 7,
            TariffError::NotFound { .. } => 8,
            TariffError::StoreUnavailable(_) => 9,
            TariffError::DataIntegrity(_) => 10,
        };
        let error_class = error.kind();
        let detail = error.to_string();
        let interface = error.into_interface(correlation_id(command));
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: format!("{} ({detail})", interface.user_message()),
            correlation_id: Some(interface.correlation_id().to_string()),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\
             \"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

fn correlation_id(command: &str) -> String {
    format!("{command}-{}-{}", std::process::id(), chrono::Utc::now().timestamp_millis())
}

/// Where lookups read reference data from.
#[derive(Clone, Debug, Default)]
pub enum StoreSource {
    /// The configured SQLite database.
    #[default]
    Database,
    /// A JSON dataset snapshot held in memory.
    Snapshot(PathBuf),
}

pub(crate) fn load_config(
    command: &str,
    options: &LoadOptions,
) -> Result<AppConfig, CommandResult> {
    AppConfig::load(options.clone()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn build_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

pub(crate) async fn open_store(
    command: &str,
    config: &AppConfig,
    source: &StoreSource,
) -> Result<Arc<dyn ReferenceStore>, CommandResult> {
    match source {
        StoreSource::Database => {
            let pool = connect_with_config(&config.database).await.map_err(|error| {
                CommandResult::failure(command, "db_connectivity", error.to_string(), 4)
            })?;
            Ok(Arc::new(SqlReferenceStore::new(pool)))
        }
        StoreSource::Snapshot(path) => {
            let dataset = read_dataset(path).map_err(|error| {
                CommandResult::failure(command, "invalid_input", format!("{error:#}"), 7)
            })?;
            Ok(Arc::new(InMemoryReferenceStore::from_dataset(dataset)))
        }
    }
}

pub(crate) fn read_dataset(path: &Path) -> anyhow::Result<ReferenceDataset> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read dataset `{}`", path.display()))?;
    ReferenceDataset::from_json(&raw)
        .with_context(|| format!("could not parse dataset `{}`", path.display()))
}

/// Reads a JSON request from `--input`, or from stdin when it is piped.
/// `-` forces stdin.
pub(crate) fn read_json_input<T: DeserializeOwned>(input: Option<&Path>) -> anyhow::Result<T> {
    let raw = match input {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("could not read input `{}`", path.display()))?,
        Some(_) => read_stdin()?,
        None if io::stdin().is_terminal() => {
            bail!("no request given; pass --input <file> or pipe JSON on stdin")
        }
        None => read_stdin()?,
    };
    serde_json::from_str(&raw).context("request is not valid JSON for this command")
}

fn read_stdin() -> anyhow::Result<String> {
    let mut raw = String::new();
    io::stdin().read_to_string(&mut raw).context("could not read stdin")?;
    Ok(raw)
}

pub(crate) fn invalid_input(command: &str, error: anyhow::Error) -> CommandResult {
    CommandResult::failure(command, "invalid_input", format!("{error:#}"), 7)
}
