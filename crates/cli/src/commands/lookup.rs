use chrono::NaiveDate;
use clap::Args;
use tariff_core::config::LoadOptions;
use tariff_core::{LookupRequest, TariffEngine};

use crate::commands::{build_runtime, load_config, open_store, CommandResult, StoreSource};

#[derive(Debug, Clone, Args)]
pub struct LookupArgs {
    /// Importing country, alpha-3 or a configured alias
    #[arg(long)]
    pub importer: String,
    /// Country of origin; omit for the general schedule only
    #[arg(long)]
    pub origin: Option<String>,
    /// Classification code, separators allowed (e.g. 0804.40)
    #[arg(long)]
    pub code: String,
    /// Resolve the rates in force on this date instead of today
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub as_of: Option<NaiveDate>,
}

impl LookupArgs {
    pub fn to_request(&self) -> LookupRequest {
        let request = LookupRequest::new(&self.importer, self.origin.as_deref(), &self.code);
        match self.as_of {
            Some(date) => request.as_of(date),
            None => request,
        }
    }
}

pub fn run(options: &LoadOptions, source: &StoreSource, args: &LookupArgs) -> CommandResult {
    let config = match load_config("lookup", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("lookup") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async {
        let store = match open_store("lookup", &config, source).await {
            Ok(store) => store,
            Err(result) => return result,
        };
        let engine = TariffEngine::deterministic(store, config.resolver_policy());

        match engine.lookup(&args.to_request()).await {
            Ok(result) => {
                let message = format!(
                    "{} option(s) for {}/{}",
                    result.options.len(),
                    result.importer_code,
                    result.classification_code
                );
                CommandResult::success_with("lookup", message, result)
            }
            Err(error) => CommandResult::from_tariff_error("lookup", error),
        }
    })
}
