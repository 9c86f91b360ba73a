use std::process::ExitCode;

fn main() -> ExitCode {
    tariff_cli::run()
}
