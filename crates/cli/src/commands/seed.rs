use tariff_core::config::LoadOptions;
use tariff_db::{connect_with_config, migrations, DemoReferenceDataset, SeedResult};

use crate::commands::{build_runtime, load_config, CommandResult};

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("seed", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let run_result = seed_demo(&pool).await;

        pool.close().await;
        run_result
    });

    match result {
        Ok(seeded) => {
            let message = format!(
                "demo dataset loaded: {} countries, {} agreements, {} classifications, {} rates",
                seeded.countries, seeded.agreements, seeded.classifications, seeded.rates
            );
            CommandResult::success_with("seed", message, seeded)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

async fn seed_demo(pool: &tariff_db::DbPool) -> Result<SeedResult, (&'static str, String, u8)> {
    let seeded = DemoReferenceDataset::load(pool)
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

    let verification = DemoReferenceDataset::verify(pool)
        .await
        .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

    if !verification.all_present {
        let failed_checks = verification
            .checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
            .collect::<Vec<_>>();
        return Err(("seed_verification", verification_message(&failed_checks), 6u8));
    }

    Ok(seeded)
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
