use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CodeConvention, CountryCodes};
use crate::resolver::{FallbackRates, ResolverPolicy, Strictness, MAX_EXPAND_LIMIT};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub resolver: ResolverConfig,
    pub countries: CountriesConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ResolverConfig {
    pub strictness: Strictness,
    /// Whole percentages, e.g. `10` for 10%.
    pub fallback_rates_pct: Vec<Decimal>,
    pub expand_limit: usize,
}

#[derive(Clone, Debug)]
pub struct CountriesConfig {
    pub code_length: u8,
    /// Alpha-2 code to alpha-3 code.
    pub aliases: BTreeMap<String, String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub strictness: Option<Strictness>,
    pub expand_limit: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://tariff.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            resolver: ResolverConfig {
                strictness: Strictness::Strict,
                fallback_rates_pct: FallbackRates::default().candidates_pct().to_vec(),
                expand_limit: 50,
            },
            countries: CountriesConfig { code_length: 3, aliases: BTreeMap::new() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tariff.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// The resolver strategy this configuration describes. Call after
    /// `validate`; an unsupported code length falls back to alpha-3.
    pub fn resolver_policy(&self) -> ResolverPolicy {
        let convention =
            CodeConvention::from_length(self.countries.code_length).unwrap_or_default();
        ResolverPolicy {
            strictness: self.resolver.strictness,
            country_codes: CountryCodes::new(convention, self.countries.aliases.clone()),
            fallback: FallbackRates::new(self.resolver.fallback_rates_pct.clone()),
            default_expand_limit: self.resolver.expand_limit,
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(resolver) = patch.resolver {
            if let Some(strictness) = resolver.strictness {
                self.resolver.strictness = strictness;
            }
            if let Some(fallback_rates_pct) = resolver.fallback_rates_pct {
                self.resolver.fallback_rates_pct = fallback_rates_pct;
            }
            if let Some(expand_limit) = resolver.expand_limit {
                self.resolver.expand_limit = expand_limit;
            }
        }

        if let Some(countries) = patch.countries {
            if let Some(code_length) = countries.code_length {
                self.countries.code_length = code_length;
            }
            if let Some(aliases) = countries.aliases {
                self.countries.aliases.extend(aliases);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TARIFF_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TARIFF_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("TARIFF_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TARIFF_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("TARIFF_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TARIFF_RESOLVER_STRICTNESS") {
            self.resolver.strictness =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "TARIFF_RESOLVER_STRICTNESS".to_string(),
                    value: value.clone(),
                })?;
        }
        if let Some(value) = read_env("TARIFF_RESOLVER_FALLBACK_RATES_PCT") {
            self.resolver.fallback_rates_pct =
                parse_decimal_list("TARIFF_RESOLVER_FALLBACK_RATES_PCT", &value)?;
        }
        if let Some(value) = read_env("TARIFF_RESOLVER_EXPAND_LIMIT") {
            self.resolver.expand_limit = parse_usize("TARIFF_RESOLVER_EXPAND_LIMIT", &value)?;
        }

        if let Some(value) = read_env("TARIFF_COUNTRIES_CODE_LENGTH") {
            self.countries.code_length = parse_u8("TARIFF_COUNTRIES_CODE_LENGTH", &value)?;
        }

        let log_level = read_env("TARIFF_LOGGING_LEVEL").or_else(|| read_env("TARIFF_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TARIFF_LOGGING_FORMAT").or_else(|| read_env("TARIFF_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(strictness) = overrides.strictness {
            self.resolver.strictness = strictness;
        }
        if let Some(expand_limit) = overrides.expand_limit {
            self.resolver.expand_limit = expand_limit;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_resolver(&self.resolver)?;
        validate_countries(&self.countries)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tariff.toml"), PathBuf::from("config/tariff.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_resolver(resolver: &ResolverConfig) -> Result<(), ConfigError> {
    if resolver.expand_limit == 0 || resolver.expand_limit > MAX_EXPAND_LIMIT {
        return Err(ConfigError::Validation(format!(
            "resolver.expand_limit must be in range 1..={MAX_EXPAND_LIMIT}"
        )));
    }

    let out_of_range = resolver
        .fallback_rates_pct
        .iter()
        .find(|pct| pct.is_sign_negative() || **pct > Decimal::ONE_HUNDRED);
    if let Some(pct) = out_of_range {
        return Err(ConfigError::Validation(format!(
            "resolver.fallback_rates_pct entries must be within 0..=100 (got {pct})"
        )));
    }

    if resolver.strictness == Strictness::Fallback && resolver.fallback_rates_pct.is_empty() {
        return Err(ConfigError::Validation(
            "resolver.strictness = \"fallback\" needs a resolver.fallback_rates_pct entry"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_countries(countries: &CountriesConfig) -> Result<(), ConfigError> {
    if CodeConvention::from_length(countries.code_length).is_none() {
        return Err(ConfigError::Validation(
            "countries.code_length must be 2 (alpha-2) or 3 (alpha-3)".to_string(),
        ));
    }

    for (alpha2, alpha3) in &countries.aliases {
        let well_formed = |code: &str, length: usize| {
            code.trim().len() == length && code.trim().chars().all(|ch| ch.is_ascii_alphabetic())
        };
        if !well_formed(alpha2, 2) || !well_formed(alpha3, 3) {
            return Err(ConfigError::Validation(format!(
                "countries.aliases entry `{alpha2} = \"{alpha3}\"` must map a 2-letter code to \
                 a 3-letter code"
            )));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_env(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.trim().parse::<u8>().map_err(|_| invalid_env(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_env(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_env(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| invalid_env(key, value))
}

fn parse_decimal_list(key: &str, value: &str) -> Result<Vec<Decimal>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse::<Decimal>().map_err(|_| invalid_env(key, value)))
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    resolver: Option<ResolverPatch>,
    countries: Option<CountriesPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ResolverPatch {
    strictness: Option<Strictness>,
    fallback_rates_pct: Option<Vec<Decimal>>,
    expand_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct CountriesPatch {
    code_length: Option<u8>,
    aliases: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::domain::{CodeConvention, CountryCode};
    use crate::resolver::Strictness;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn write_config(dir: &TempDir, body: &str) -> Result<std::path::PathBuf, String> {
        let path = dir.path().join("tariff.toml");
        fs::write(&path, body).map_err(|err| err.to_string())?;
        Ok(path)
    }

    #[test]
    fn defaults_are_strict_alpha3_without_file() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;
        let policy = config.resolver_policy();

        ensure(policy.strictness == Strictness::Strict, "fallback must be opt-in")?;
        ensure(
            policy.country_codes.convention() == CodeConvention::Alpha3,
            "alpha-3 is the default convention",
        )?;
        ensure(policy.fallback.candidates_pct().len() == 3, "three default fallback candidates")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_TARIFF_DB_PATH", "/tmp/interpolated.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[database]
url = "sqlite://${TEST_TARIFF_DB_PATH}"
"#,
            )?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite:///tmp/interpolated.db",
                "database url should be interpolated from environment",
            )
        })();

        clear_vars(&["TEST_TARIFF_DB_PATH"]);
        result
    }

    #[test]
    fn file_sections_build_the_resolver_policy() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(
            &dir,
            r#"
[resolver]
strictness = "fallback"
fallback_rates_pct = [5, 7.5]
expand_limit = 120

[countries]
code_length = 3

[countries.aliases]
us = "USA"
MX = "MEX"
"#,
        )?;

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;
        let policy = config.resolver_policy();

        ensure(policy.strictness == Strictness::Fallback, "strictness read from file")?;
        ensure(policy.default_expand_limit == 120, "expand limit read from file")?;
        ensure(
            policy.fallback.candidates_pct() == [Decimal::new(5, 0), Decimal::new(75, 1)],
            "fallback candidates read from file",
        )?;
        ensure(
            policy.country_codes.normalize("us").ok() == Some(CountryCode("USA".to_string())),
            "aliases translate alpha-2 input",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TARIFF_LOG_LEVEL", "warn");
        env::set_var("TARIFF_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )
        })();

        clear_vars(&["TARIFF_LOG_LEVEL", "TARIFF_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TARIFF_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("TARIFF_RESOLVER_FALLBACK_RATES_PCT", "12, 18");
        env::set_var("TARIFF_RESOLVER_STRICTNESS", "fallback");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[database]
url = "sqlite://from-file.db"

[resolver]
strictness = "strict"
expand_limit = 10

[logging]
level = "warn"
"#,
            )?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.resolver.strictness == Strictness::Fallback,
                "env strictness should win over file",
            )?;
            ensure(config.resolver.expand_limit == 10, "file expand limit should beat default")?;
            ensure(
                config.resolver.fallback_rates_pct
                    == vec![Decimal::new(12, 0), Decimal::new(18, 0)],
                "env fallback table should be parsed as a comma list",
            )
        })();

        clear_vars(&[
            "TARIFF_DATABASE_URL",
            "TARIFF_RESOLVER_FALLBACK_RATES_PCT",
            "TARIFF_RESOLVER_STRICTNESS",
        ]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TARIFF_COUNTRIES_CODE_LENGTH", "4");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("countries.code_length")
            );
            ensure(has_message, "validation failure should mention countries.code_length")
        })();

        clear_vars(&["TARIFF_COUNTRIES_CODE_LENGTH"]);
        result
    }

    #[test]
    fn expand_limit_outside_range_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides { expand_limit: Some(501), ..ConfigOverrides::default() },
            ..LoadOptions::default()
        });

        ensure(
            matches!(
                result,
                Err(ConfigError::Validation(ref message)) if message.contains("expand_limit")
            ),
            "expand limit above 500 must fail validation",
        )
    }

    #[test]
    fn malformed_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TARIFF_RESOLVER_STRICTNESS", "lenient");
        let result = AppConfig::load(LoadOptions::default());
        clear_vars(&["TARIFF_RESOLVER_STRICTNESS"]);

        ensure(
            matches!(
                result,
                Err(ConfigError::InvalidEnvOverride { ref key, .. })
                    if key == "TARIFF_RESOLVER_STRICTNESS"
            ),
            "invalid strictness should name the variable",
        )
    }

    #[test]
    fn missing_required_file_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let result = AppConfig::load(LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            require_file: true,
            ..LoadOptions::default()
        });

        ensure(
            matches!(result, Err(ConfigError::MissingConfigFile(_))),
            "require_file should fail when the file is absent",
        )
    }
}
