pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tariff_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use tariff_core::Strictness;

use commands::calculate::CalculateArgs;
use commands::expand::ExpandArgs;
use commands::lookup::LookupArgs;
use commands::quote::QuoteArgs;
use commands::{CommandResult, StoreSource};

#[derive(Debug, Parser)]
#[command(
    name = "tariff",
    about = "Tariff rate resolution and duty calculation",
    long_about = "Resolve MFN and preferential tariff rates, expand code subtrees, and compute \
                  duties with rules-of-origin checks. Output is JSON on stdout; logs go to stderr.",
    after_help = "Examples:\n  tariff seed\n  tariff lookup --importer USA --origin MEX --code \
                  0804.40\n  tariff expand --importer USA --prefix 0804\n  tariff quote --input \
                  shipment.json"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Config file to load; it must exist when given
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "URL")]
    pub database_url: Option<String>,
    /// Missing-MFN policy: strict or fallback
    #[arg(long, global = true)]
    pub strictness: Option<Strictness>,
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    /// Serve lookups from a JSON dataset instead of the database
    #[arg(long, global = true, value_name = "FILE")]
    pub reference_file: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                log_level: self.log_level.clone(),
                strictness: self.strictness,
                expand_limit: None,
            },
        }
    }

    pub fn store_source(&self) -> StoreSource {
        match &self.reference_file {
            Some(path) => StoreSource::Snapshot(path.clone()),
            None => StoreSource::Database,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Resolve the MFN and preferential rates for one classification")]
    Lookup(LookupArgs),
    #[command(about = "List every classification and rate under a code prefix")]
    Expand(ExpandArgs),
    #[command(about = "Compute duty from explicit rates and costs (JSON request)")]
    Calculate(CalculateArgs),
    #[command(about = "Look up rates and compute duty in one step (JSON request)")]
    Quote(QuoteArgs),
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the bundled demo reference data into the database")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity, schema and reference data")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.global.load_options();
    init_logging(&options);

    let source = cli.global.store_source();
    let result = match &cli.command {
        Command::Lookup(args) => commands::lookup::run(&options, &source, args),
        Command::Expand(args) => commands::expand::run(&options, &source, args),
        Command::Calculate(args) => commands::calculate::run(&options, args),
        Command::Quote(args) => commands::quote::run(&options, &source, args),
        Command::Migrate => commands::migrate::run(&options),
        Command::Seed => commands::seed::run(&options),
        Command::Config => {
            CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Doctor { json } => {
            CommandResult { exit_code: 0, output: commands::doctor::run(&options, *json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays machine-readable. A config that fails
/// to load still gets default logging; the command reports the failure.
fn init_logging(options: &LoadOptions) {
    use tracing::Level;

    let config = AppConfig::load(options.clone()).unwrap_or_default();
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder =
        tracing_subscriber::fmt().with_target(false).with_max_level(log_level).with_writer(
            std::io::stderr,
        );

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use tariff_core::Strictness;

    use super::{Cli, Command};
    use crate::commands::StoreSource;

    #[test]
    fn command_tree_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_become_load_overrides() {
        let cli = Cli::parse_from([
            "tariff",
            "lookup",
            "--importer",
            "USA",
            "--code",
            "080440",
            "--strictness",
            "fallback",
            "--database-url",
            "sqlite::memory:",
        ]);

        let options = cli.global.load_options();
        assert_eq!(options.overrides.strictness, Some(Strictness::Fallback));
        assert_eq!(options.overrides.database_url.as_deref(), Some("sqlite::memory:"));
        assert!(!options.require_file);
        assert!(matches!(cli.global.store_source(), StoreSource::Database));

        let Command::Lookup(args) = cli.command else {
            panic!("expected lookup command");
        };
        let request = args.to_request();
        assert_eq!(request.origin_code, None);
        assert_eq!(request.as_of, None);
    }

    #[test]
    fn explicit_config_file_is_required_to_exist() {
        let cli = Cli::parse_from(["tariff", "--config", "custom.toml", "migrate"]);
        let options = cli.global.load_options();
        assert!(options.require_file);
        assert_eq!(options.config_path.as_deref(), Some(std::path::Path::new("custom.toml")));
    }

    #[test]
    fn seed_only_loads_the_bundled_dataset() {
        assert!(matches!(Cli::parse_from(["tariff", "seed"]).command, Command::Seed));
        assert!(Cli::try_parse_from(["tariff", "seed", "--file", "dataset.json"]).is_err());
    }

    #[test]
    fn as_of_dates_are_parsed() {
        let cli = Cli::parse_from([
            "tariff",
            "lookup",
            "--importer",
            "USA",
            "--origin",
            "MEX",
            "--code",
            "0804.40",
            "--as-of",
            "2018-03-01",
        ]);
        let Command::Lookup(args) = cli.command else {
            panic!("expected lookup command");
        };
        let as_of = args.to_request().as_of.map(|date| date.to_string());
        assert_eq!(as_of.as_deref(), Some("2018-03-01"));
    }
}
