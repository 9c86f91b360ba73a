use serde::Serialize;
use sqlx::Executor;
use tracing::info;

use tariff_core::domain::ReferenceDataset;

use crate::connection::DbPool;
use crate::repositories::reference::{format_date, kind_columns};
use crate::repositories::RepositoryError;

/// Demo reference data: a small avocado/guava/banana slice of the US and
/// Canadian schedules with USMCA and CPTPP agreements.
///
/// The set deliberately carries the data-quality cases the resolver must
/// tolerate:
/// 1. an expired general MFN row next to the current one
/// 2. a PREF row pointing at an agreement that was never loaded
/// 3. a PREF row with no agreement at all
/// 4. specific and compound duties
pub struct DemoReferenceDataset;

impl DemoReferenceDataset {
    pub const JSON: &'static str = include_str!("../../../fixtures/demo_reference.json");

    pub fn dataset() -> Result<ReferenceDataset, RepositoryError> {
        ReferenceDataset::from_json(Self::JSON)
            .map_err(|error| RepositoryError::Decode(error.to_string()))
    }

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        load_dataset(pool, &Self::dataset()?).await
    }

    /// Checks that every demo record is present with the expected key.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let dataset = Self::dataset()?;
        let mut checks = Vec::new();

        for country in &dataset.countries {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM country WHERE code = ?1)")
                    .bind(country.code.as_str())
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("country {}", country.code), exists == 1));
        }

        for agreement in &dataset.agreements {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM agreement WHERE id = ?1)")
                    .bind(agreement.id.0)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("agreement {}", agreement.name), exists == 1));
        }

        for classification in &dataset.classifications {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM classification
                               WHERE id = ?1 AND importer_code = ?2 AND code = ?3)",
            )
            .bind(classification.id.0)
            .bind(classification.importer.as_str())
            .bind(&classification.code)
            .fetch_one(pool)
            .await?;
            checks.push((
                format!("classification {}/{}", classification.importer, classification.code),
                exists == 1,
            ));
        }

        let rate_ids: Vec<i64> = dataset.rates.iter().map(|rate| rate.id.0).collect();
        let rate_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM tariff_rate WHERE id IN {}",
            sql_array_from_ids(&rate_ids)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("tariff rates".to_string(), rate_count == rate_ids.len() as i64));

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let dataset = Self::dataset()?;
        let rate_ids: Vec<i64> = dataset.rates.iter().map(|rate| rate.id.0).collect();
        let classification_ids: Vec<i64> =
            dataset.classifications.iter().map(|classification| classification.id.0).collect();
        let agreement_ids: Vec<i64> =
            dataset.agreements.iter().map(|agreement| agreement.id.0).collect();

        let mut tx = pool.begin().await?;
        tx.execute(
            format!("DELETE FROM tariff_rate WHERE id IN {}", sql_array_from_ids(&rate_ids))
                .as_str(),
        )
        .await?;
        tx.execute(
            format!(
                "DELETE FROM classification WHERE id IN {}",
                sql_array_from_ids(&classification_ids)
            )
            .as_str(),
        )
        .await?;
        tx.execute(
            format!("DELETE FROM agreement WHERE id IN {}", sql_array_from_ids(&agreement_ids))
                .as_str(),
        )
        .await?;
        for country in &dataset.countries {
            sqlx::query("DELETE FROM country WHERE code = ?1")
                .bind(country.code.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Upserts a dataset in one transaction, parents before children.
pub(crate) async fn load_dataset(
    pool: &DbPool,
    dataset: &ReferenceDataset,
) -> Result<SeedResult, RepositoryError> {
    let mut tx = pool.begin().await?;

    for country in &dataset.countries {
        sqlx::query(
            "INSERT INTO country (code, name) VALUES (?1, ?2)
             ON CONFLICT(code) DO UPDATE SET name = excluded.name",
        )
        .bind(country.code.as_str())
        .bind(&country.name)
        .execute(&mut *tx)
        .await?;
    }

    for agreement in &dataset.agreements {
        sqlx::query(
            "INSERT INTO agreement (id, name, rvc_threshold) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 rvc_threshold = excluded.rvc_threshold",
        )
        .bind(agreement.id.0)
        .bind(&agreement.name)
        .bind(agreement.rvc_threshold.map(|threshold| threshold.to_string()))
        .execute(&mut *tx)
        .await?;
    }

    for classification in &dataset.classifications {
        sqlx::query(
            "INSERT INTO classification (id, importer_code, code, label) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 importer_code = excluded.importer_code,
                 code = excluded.code,
                 label = excluded.label",
        )
        .bind(classification.id.0)
        .bind(classification.importer.as_str())
        .bind(&classification.code)
        .bind(&classification.label)
        .execute(&mut *tx)
        .await?;
    }

    for rate in &dataset.rates {
        let (kind, ad_valorem_rate, specific_amount, specific_unit, text) =
            kind_columns(&rate.kind);
        sqlx::query(
            "INSERT INTO tariff_rate (id, importer_code, origin_code, classification_id, basis,
                                      agreement_id, rate_kind, ad_valorem_rate, specific_amount,
                                      specific_unit, non_ad_valorem_text, valid_from, valid_to,
                                      source_ref)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(id) DO UPDATE SET
                 importer_code = excluded.importer_code,
                 origin_code = excluded.origin_code,
                 classification_id = excluded.classification_id,
                 basis = excluded.basis,
                 agreement_id = excluded.agreement_id,
                 rate_kind = excluded.rate_kind,
                 ad_valorem_rate = excluded.ad_valorem_rate,
                 specific_amount = excluded.specific_amount,
                 specific_unit = excluded.specific_unit,
                 non_ad_valorem_text = excluded.non_ad_valorem_text,
                 valid_from = excluded.valid_from,
                 valid_to = excluded.valid_to,
                 source_ref = excluded.source_ref",
        )
        .bind(rate.id.0)
        .bind(rate.importer.as_str())
        .bind(rate.origin.as_ref().map(|origin| origin.as_str()))
        .bind(rate.classification_id.0)
        .bind(rate.basis.as_str())
        .bind(rate.agreement_id.map(|id| id.0))
        .bind(kind)
        .bind(ad_valorem_rate)
        .bind(specific_amount)
        .bind(specific_unit)
        .bind(text)
        .bind(format_date(rate.valid_from))
        .bind(rate.valid_to.map(format_date))
        .bind(rate.source_ref.as_deref())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let result = SeedResult {
        countries: dataset.countries.len(),
        agreements: dataset.agreements.len(),
        classifications: dataset.classifications.len(),
        rates: dataset.rates.len(),
        integrity_issues: dataset.integrity_issues(),
    };
    info!(
        event_name = "tariff.seed.loaded",
        countries = result.countries,
        agreements = result.agreements,
        classifications = result.classifications,
        rates = result.rates,
        integrity_issues = result.integrity_issues.len(),
        "reference dataset loaded"
    );
    Ok(result)
}

fn sql_array_from_ids(ids: &[i64]) -> String {
    if ids.is_empty() {
        return "(NULL)".to_string();
    }
    let joined = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(", ");
    format!("({joined})")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub countries: usize,
    pub agreements: usize,
    pub classifications: usize,
    pub rates: usize,
    /// Reported, not rejected.
    pub integrity_issues: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}
