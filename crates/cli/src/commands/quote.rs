use std::path::PathBuf;

use clap::Args;
use tariff_core::config::LoadOptions;
use tariff_core::{QuoteRequest, TariffEngine};

use crate::commands::{
    build_runtime, invalid_input, load_config, open_store, read_json_input, CommandResult,
    StoreSource,
};

#[derive(Debug, Clone, Args)]
pub struct QuoteArgs {
    /// JSON quote request (lookup keys plus costs and values)
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
}

pub fn run(options: &LoadOptions, source: &StoreSource, args: &QuoteArgs) -> CommandResult {
    let config = match load_config("quote", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let request: QuoteRequest = match read_json_input(args.input.as_deref()) {
        Ok(request) => request,
        Err(error) => return invalid_input("quote", error),
    };
    let runtime = match build_runtime("quote") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async {
        let store = match open_store("quote", &config, source).await {
            Ok(store) => store,
            Err(result) => return result,
        };
        let engine = TariffEngine::deterministic(store, config.resolver_policy());

        match engine.quote(&request).await {
            Ok(quote) => {
                let message = format!(
                    "{} basis applied to {}/{}, total duty {}",
                    quote.calculation.basis,
                    quote.lookup.importer_code,
                    quote.lookup.classification_code,
                    quote.calculation.total_duty
                );
                CommandResult::success_with("quote", message, quote)
            }
            Err(error) => CommandResult::from_tariff_error("quote", error),
        }
    })
}
