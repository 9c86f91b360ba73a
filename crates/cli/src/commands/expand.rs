use clap::Args;
use tariff_core::config::LoadOptions;
use tariff_core::{ExpandRequest, TariffEngine};

use crate::commands::{build_runtime, load_config, open_store, CommandResult, StoreSource};

#[derive(Debug, Clone, Args)]
pub struct ExpandArgs {
    #[arg(long)]
    pub importer: String,
    #[arg(long)]
    pub origin: Option<String>,
    /// At least four digits of the code subtree, e.g. 0804
    #[arg(long)]
    pub prefix: String,
    /// Maximum number of classifications returned
    #[arg(long)]
    pub limit: Option<usize>,
}

impl ExpandArgs {
    pub fn to_request(&self) -> ExpandRequest {
        let request = ExpandRequest::new(&self.importer, self.origin.as_deref(), &self.prefix);
        match self.limit {
            Some(limit) => request.limit(limit),
            None => request,
        }
    }
}

pub fn run(options: &LoadOptions, source: &StoreSource, args: &ExpandArgs) -> CommandResult {
    let config = match load_config("expand", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("expand") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async {
        let store = match open_store("expand", &config, source).await {
            Ok(store) => store,
            Err(result) => return result,
        };
        let engine = TariffEngine::deterministic(store, config.resolver_policy());

        match engine.expand(&args.to_request()).await {
            Ok(results) => {
                let message = format!("{} classification(s) under {}", results.len(), args.prefix);
                CommandResult::success_with("expand", message, results)
            }
            Err(error) => CommandResult::from_tariff_error("expand", error),
        }
    })
}
