use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tariff_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let fallback_rates = config
        .resolver
        .fallback_rates_pct
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let aliases = if config.countries.aliases.is_empty() {
        "<none>".to_string()
    } else {
        config
            .countries
            .aliases
            .iter()
            .map(|(alias, code)| format!("{alias}->{code}"))
            .collect::<Vec<_>>()
            .join(", ")
    };

    vec![
        Field {
            key: "database.url",
            env_keys: &["TARIFF_DATABASE_URL"],
            value: config.database.url.clone(),
        },
        Field {
            key: "database.max_connections",
            env_keys: &["TARIFF_DATABASE_MAX_CONNECTIONS"],
            value: config.database.max_connections.to_string(),
        },
        Field {
            key: "database.timeout_secs",
            env_keys: &["TARIFF_DATABASE_TIMEOUT_SECS"],
            value: config.database.timeout_secs.to_string(),
        },
        Field {
            key: "resolver.strictness",
            env_keys: &["TARIFF_RESOLVER_STRICTNESS"],
            value: format!("{:?}", config.resolver.strictness),
        },
        Field {
            key: "resolver.fallback_rates_pct",
            env_keys: &["TARIFF_RESOLVER_FALLBACK_RATES_PCT"],
            value: format!("[{fallback_rates}]"),
        },
        Field {
            key: "resolver.expand_limit",
            env_keys: &["TARIFF_RESOLVER_EXPAND_LIMIT"],
            value: config.resolver.expand_limit.to_string(),
        },
        Field {
            key: "countries.code_length",
            env_keys: &["TARIFF_COUNTRIES_CODE_LENGTH"],
            value: config.countries.code_length.to_string(),
        },
        Field { key: "countries.aliases", env_keys: &[], value: aliases },
        Field {
            key: "logging.level",
            env_keys: &["TARIFF_LOGGING_LEVEL", "TARIFF_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key: "logging.format",
            env_keys: &["TARIFF_LOGGING_FORMAT", "TARIFF_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format),
        },
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from("tariff.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/tariff.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
