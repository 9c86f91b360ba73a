pub mod enrich;
pub mod expand;
pub mod fallback;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{
    normalize_classification_code, select_current, Basis, Classification, Country, CountryCode,
    CountryCodes, LookupResult, Rate, RateOption,
};
use crate::errors::TariffError;
use crate::store::{OriginScope, RateQuery, ReferenceStore};

pub use enrich::AgreementEnricher;
pub use expand::{ExpandRequest, MAX_EXPAND_LIMIT};
pub use fallback::FallbackRates;

/// What to do when no MFN row exists for a classification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Fail with `NotFound`.
    #[default]
    Strict,
    /// Synthesize a tagged rate from the fallback table.
    Fallback,
}

impl std::str::FromStr for Strictness {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "fallback" => Ok(Self::Fallback),
            other => Err(format!("unsupported strictness `{other}` (expected strict|fallback)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolverPolicy {
    pub strictness: Strictness,
    pub country_codes: CountryCodes,
    pub fallback: FallbackRates,
    pub default_expand_limit: usize,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            strictness: Strictness::Strict,
            country_codes: CountryCodes::default(),
            fallback: FallbackRates::default(),
            default_expand_limit: 50,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub importer_code: String,
    #[serde(default)]
    pub origin_code: Option<String>,
    pub classification_code: String,
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

impl LookupRequest {
    pub fn new(
        importer_code: impl Into<String>,
        origin_code: Option<&str>,
        classification_code: impl Into<String>,
    ) -> Self {
        Self {
            importer_code: importer_code.into(),
            origin_code: origin_code.map(str::to_string),
            classification_code: classification_code.into(),
            as_of: None,
        }
    }

    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }
}

/// Resolves MFN and preferential rate candidates against a reference store.
pub struct RateResolver<S> {
    store: S,
    policy: ResolverPolicy,
}

impl<S> RateResolver<S>
where
    S: ReferenceStore,
{
    pub fn new(store: S, policy: ResolverPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &ResolverPolicy {
        &self.policy
    }

    pub async fn resolve_rates(
        &self,
        request: &LookupRequest,
    ) -> Result<LookupResult, TariffError> {
        let classification_code = normalize_classification_code(&request.classification_code)?;
        let importer_code = self.policy.country_codes.normalize(&request.importer_code)?;
        let origin_code = self.normalize_origin(request.origin_code.as_deref())?;
        let as_of = request.as_of.unwrap_or_else(|| Utc::now().date_naive());

        let importer = self.require_country(&importer_code).await?;
        let origin = match &origin_code {
            Some(code) => Some(self.require_country(code).await?),
            None => None,
        };
        let classification = self
            .store
            .find_classification(&importer.code, &classification_code)
            .await?
            .ok_or_else(|| {
                TariffError::not_found(
                    "classification",
                    format!("{}/{}", importer.code, classification_code),
                )
            })?;

        let mut warnings = Vec::new();
        let mut enricher = AgreementEnricher::new(&self.store);

        let mut mfn = None;
        if let Some(origin) = &origin {
            mfn = self
                .current_rate(
                    &classification,
                    OriginScope::Exactly(origin.code.clone()),
                    Basis::Mfn,
                    as_of,
                )
                .await?;
        }
        if mfn.is_none() {
            mfn = self
                .current_rate(&classification, OriginScope::General, Basis::Mfn, as_of)
                .await?;
        }

        let mfn_option = match mfn {
            Some(rate) => {
                collect_mismatch(&rate, &mut warnings);
                enricher.option_for(&rate).await
            }
            None => self.fallback_mfn(&importer, &classification)?,
        };

        let mut options = vec![mfn_option];
        if let Some(origin) = &origin {
            let pref = self
                .current_rate(
                    &classification,
                    OriginScope::Exactly(origin.code.clone()),
                    Basis::Pref,
                    as_of,
                )
                .await?;
            match pref {
                Some(rate) => {
                    collect_mismatch(&rate, &mut warnings);
                    options.push(enricher.option_for(&rate).await);
                }
                None => debug!(
                    event_name = "tariff.lookup.no_preference",
                    importer = %importer.code,
                    origin = %origin.code,
                    classification = %classification.code,
                    "no preferential rate in force; MFN only"
                ),
            }
        }

        info!(
            event_name = "tariff.lookup.resolved",
            importer = %importer.code,
            origin = origin.as_ref().map(|country| country.code.as_str()).unwrap_or("none"),
            classification = %classification.code,
            as_of = %as_of,
            options = options.len(),
            "tariff rates resolved"
        );

        Ok(LookupResult {
            importer_code: importer.code.0,
            origin_code: origin.map(|country| country.code.0),
            classification_code: classification.code,
            options,
            warnings,
        })
    }

    fn normalize_origin(&self, raw: Option<&str>) -> Result<Option<CountryCode>, TariffError> {
        raw.filter(|value| !value.trim().is_empty())
            .map(|value| self.policy.country_codes.normalize(value))
            .transpose()
    }

    async fn require_country(&self, code: &CountryCode) -> Result<Country, TariffError> {
        self.store
            .find_country(code)
            .await?
            .ok_or_else(|| TariffError::not_found("country", code.as_str()))
    }

    async fn current_rate(
        &self,
        classification: &Classification,
        origin: OriginScope,
        basis: Basis,
        as_of: NaiveDate,
    ) -> Result<Option<Rate>, TariffError> {
        let query = RateQuery {
            importer: classification.importer.clone(),
            origin,
            classification_id: classification.id,
            basis,
        };
        let rows = self.store.find_rates(&query).await?;

        for rate in rows.iter().filter(|rate| !rate.has_valid_window()) {
            warn!(
                event_name = "tariff.data.inverted_validity",
                rate_id = rate.id.0,
                "rate has valid_to before valid_from; ignored"
            );
        }

        Ok(select_current(&rows, as_of).cloned())
    }

    fn fallback_mfn(
        &self,
        importer: &Country,
        classification: &Classification,
    ) -> Result<RateOption, TariffError> {
        let missing = || {
            TariffError::not_found(
                "mfn rate",
                format!("{}/{}", importer.code, classification.code),
            )
        };

        if self.policy.strictness == Strictness::Strict {
            return Err(missing());
        }

        let option = self.policy.fallback.synthesize(&importer.name).ok_or_else(missing)?;
        warn!(
            event_name = "tariff.lookup.fallback_synthesized",
            importer = %importer.code,
            classification = %classification.code,
            rate = ?option.ad_valorem_rate,
            "no MFN row in force; synthesized fallback rate"
        );
        Ok(option)
    }
}

fn collect_mismatch(rate: &Rate, warnings: &mut Vec<String>) {
    if let Some(message) = rate.agreement_mismatch() {
        warn!(event_name = "tariff.data.agreement_mismatch", rate_id = rate.id.0, "{message}");
        warnings.push(message);
    }
}
