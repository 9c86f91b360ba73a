use std::path::PathBuf;

use clap::Args;
use tariff_core::config::LoadOptions;
use tariff_core::{calculate, CalculationRequest};

use crate::commands::{invalid_input, load_config, read_json_input, CommandResult};

#[derive(Debug, Clone, Args)]
pub struct CalculateArgs {
    /// JSON calculation request; `-` or omitted reads stdin
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
}

/// Pure arithmetic; no reference data is read. Config is still loaded so a
/// broken config file fails every command the same way.
pub fn run(options: &LoadOptions, args: &CalculateArgs) -> CommandResult {
    if let Err(result) = load_config("calculate", options) {
        return result;
    }

    let request: CalculationRequest = match read_json_input(args.input.as_deref()) {
        Ok(request) => request,
        Err(error) => return invalid_input("calculate", error),
    };

    match calculate(&request) {
        Ok(response) => {
            let message =
                format!("{} basis applied, total duty {}", response.basis, response.total_duty);
            CommandResult::success_with("calculate", message, response)
        }
        Err(error) => CommandResult::from_tariff_error("calculate", error),
    }
}
