use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use tariff_core::domain::{
    Agreement, AgreementId, Basis, Classification, ClassificationId, Country, CountryCode, Rate,
    RateId, RateKind,
};
use tariff_core::errors::StoreError;
use tariff_core::store::{ClassifiedRate, OriginScope, RateQuery, ReferenceStore};

use super::{decode_error, RepositoryError};
use crate::DbPool;

const DATE_FORMAT: &str = "%Y-%m-%d";

const RATE_COLUMNS: &str = "r.id, r.importer_code, r.origin_code, r.classification_id, r.basis,
     r.agreement_id, r.rate_kind, r.ad_valorem_rate, r.specific_amount, r.specific_unit,
     r.non_ad_valorem_text, r.valid_from, r.valid_to, r.source_ref";

pub struct SqlReferenceStore {
    pool: DbPool,
}

impl SqlReferenceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn rate_count(&self) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar("SELECT COUNT(1) FROM tariff_rate").fetch_one(&self.pool).await?)
    }

    async fn rates_for(&self, query: &RateQuery) -> Result<Vec<Rate>, RepositoryError> {
        let origin_clause = match query.origin {
            OriginScope::Exactly(_) => "r.origin_code = ?",
            OriginScope::General => "r.origin_code IS NULL",
        };
        let sql = format!(
            "SELECT {RATE_COLUMNS}
             FROM tariff_rate r
             WHERE r.importer_code = ? AND r.classification_id = ? AND r.basis = ?
               AND {origin_clause}
             ORDER BY r.valid_from DESC, r.id DESC"
        );

        let mut statement = sqlx::query(&sql)
            .bind(query.importer.as_str())
            .bind(query.classification_id.0)
            .bind(query.basis.as_str());
        if let OriginScope::Exactly(origin) = &query.origin {
            statement = statement.bind(origin.as_str());
        }

        let rows = statement.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_rate).collect()
    }

    async fn scan(
        &self,
        importer: &CountryCode,
        origin: Option<&CountryCode>,
        prefix: &str,
    ) -> Result<Vec<ClassifiedRate>, RepositoryError> {
        let sql = format!(
            "SELECT {RATE_COLUMNS}, c.code AS classification_code, c.label AS classification_label
             FROM tariff_rate r
             JOIN classification c ON c.id = r.classification_id
             WHERE c.importer_code = ?1
               AND r.importer_code = ?1
               AND substr(c.code, 1, length(?2)) = ?2
               AND (?3 IS NULL OR r.origin_code = ?3)
             ORDER BY c.code, r.id"
        );

        let rows = sqlx::query(&sql)
            .bind(importer.as_str())
            .bind(prefix)
            .bind(origin.map(CountryCode::as_str))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let rate = row_to_rate(row)?;
                let classification = Classification {
                    id: rate.classification_id,
                    importer: rate.importer.clone(),
                    code: row.try_get("classification_code").map_err(decode_error)?,
                    label: row.try_get("classification_label").map_err(decode_error)?,
                };
                Ok(ClassifiedRate { classification, rate })
            })
            .collect()
    }
}

#[async_trait]
impl ReferenceStore for SqlReferenceStore {
    async fn find_country(&self, code: &CountryCode) -> Result<Option<Country>, StoreError> {
        let row = sqlx::query("SELECT code, name FROM country WHERE code = ?")
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.as_ref().map(row_to_country).transpose()?)
    }

    async fn find_classification(
        &self,
        importer: &CountryCode,
        code: &str,
    ) -> Result<Option<Classification>, StoreError> {
        let row = sqlx::query(
            "SELECT id, importer_code, code, label
             FROM classification WHERE importer_code = ? AND code = ?",
        )
        .bind(importer.as_str())
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.as_ref().map(row_to_classification).transpose()?)
    }

    async fn find_rates(&self, query: &RateQuery) -> Result<Vec<Rate>, StoreError> {
        Ok(self.rates_for(query).await?)
    }

    async fn find_agreement(&self, id: AgreementId) -> Result<Option<Agreement>, StoreError> {
        let row = sqlx::query("SELECT id, name, rvc_threshold FROM agreement WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.as_ref().map(row_to_agreement).transpose()?)
    }

    async fn scan_prefix(
        &self,
        importer: &CountryCode,
        origin: Option<&CountryCode>,
        prefix: &str,
    ) -> Result<Vec<ClassifiedRate>, StoreError> {
        Ok(self.scan(importer, origin, prefix).await?)
    }
}

fn row_to_country(row: &SqliteRow) -> Result<Country, RepositoryError> {
    let code: String = row.try_get("code").map_err(decode_error)?;
    let name: String = row.try_get("name").map_err(decode_error)?;
    Ok(Country { code: CountryCode(code), name })
}

fn row_to_classification(row: &SqliteRow) -> Result<Classification, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let importer: String = row.try_get("importer_code").map_err(decode_error)?;
    Ok(Classification {
        id: ClassificationId(id),
        importer: CountryCode(importer),
        code: row.try_get("code").map_err(decode_error)?,
        label: row.try_get("label").map_err(decode_error)?,
    })
}

fn row_to_agreement(row: &SqliteRow) -> Result<Agreement, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let threshold: Option<String> = row.try_get("rvc_threshold").map_err(decode_error)?;
    Ok(Agreement {
        id: AgreementId(id),
        name: row.try_get("name").map_err(decode_error)?,
        rvc_threshold: threshold
            .as_deref()
            .map(|value| parse_decimal("rvc_threshold", value))
            .transpose()?,
    })
}

fn row_to_rate(row: &SqliteRow) -> Result<Rate, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let importer: String = row.try_get("importer_code").map_err(decode_error)?;
    let origin: Option<String> = row.try_get("origin_code").map_err(decode_error)?;
    let classification_id: i64 = row.try_get("classification_id").map_err(decode_error)?;
    let basis: String = row.try_get("basis").map_err(decode_error)?;
    let agreement_id: Option<i64> = row.try_get("agreement_id").map_err(decode_error)?;
    let valid_from: String = row.try_get("valid_from").map_err(decode_error)?;
    let valid_to: Option<String> = row.try_get("valid_to").map_err(decode_error)?;

    Ok(Rate {
        id: RateId(id),
        importer: CountryCode(importer),
        origin: origin.map(CountryCode),
        classification_id: ClassificationId(classification_id),
        basis: Basis::parse(&basis).ok_or_else(|| {
            RepositoryError::Decode(format!("rate {id}: unknown basis `{basis}`"))
        })?,
        agreement_id: agreement_id.map(AgreementId),
        kind: row_to_kind(id, row)?,
        valid_from: parse_date("valid_from", &valid_from)?,
        valid_to: valid_to.as_deref().map(|value| parse_date("valid_to", value)).transpose()?,
        source_ref: row.try_get("source_ref").map_err(decode_error)?,
    })
}

fn row_to_kind(id: i64, row: &SqliteRow) -> Result<RateKind, RepositoryError> {
    let kind: String = row.try_get("rate_kind").map_err(decode_error)?;
    let rate: Option<String> = row.try_get("ad_valorem_rate").map_err(decode_error)?;
    let amount: Option<String> = row.try_get("specific_amount").map_err(decode_error)?;
    let unit: Option<String> = row.try_get("specific_unit").map_err(decode_error)?;
    let text: Option<String> = row.try_get("non_ad_valorem_text").map_err(decode_error)?;

    let missing = |column: &str| {
        RepositoryError::Decode(format!("rate {id}: `{kind}` row has no {column}"))
    };
    let decimal = |column: &'static str, value: Option<String>| {
        value
            .as_deref()
            .ok_or_else(|| missing(column))
            .and_then(|value| parse_decimal(column, value))
    };

    match kind.as_str() {
        "ad_valorem" => Ok(RateKind::AdValorem { rate: decimal("ad_valorem_rate", rate)? }),
        "specific" => Ok(RateKind::Specific {
            amount: decimal("specific_amount", amount)?,
            unit: unit.ok_or_else(|| missing("specific_unit"))?,
        }),
        "compound" => Ok(RateKind::Compound {
            rate: decimal("ad_valorem_rate", rate)?,
            amount: decimal("specific_amount", amount)?,
            unit: unit.ok_or_else(|| missing("specific_unit"))?,
        }),
        "non_ad_valorem" => Ok(RateKind::NonAdValorem { text: text.unwrap_or_default() }),
        other => Err(RepositoryError::Decode(format!("rate {id}: unknown rate_kind `{other}`"))),
    }
}

/// Column values for a `RateKind`:
/// `(rate_kind, ad_valorem_rate, specific_amount, specific_unit, non_ad_valorem_text)`.
pub(crate) fn kind_columns(
    kind: &RateKind,
) -> (&'static str, Option<String>, Option<String>, Option<String>, Option<String>) {
    match kind {
        RateKind::AdValorem { rate } => ("ad_valorem", Some(rate.to_string()), None, None, None),
        RateKind::Specific { amount, unit } => {
            ("specific", None, Some(amount.to_string()), Some(unit.clone()), None)
        }
        RateKind::Compound { rate, amount, unit } => (
            "compound",
            Some(rate.to_string()),
            Some(amount.to_string()),
            Some(unit.clone()),
            None,
        ),
        RateKind::NonAdValorem { text } => ("non_ad_valorem", None, None, None, Some(text.clone())),
    }
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(column: &str, value: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|error| RepositoryError::Decode(format!("{column} `{value}`: {error}")))
}

fn parse_decimal(column: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value.trim())
        .map_err(|error| RepositoryError::Decode(format!("{column} `{value}`: {error}")))
}
