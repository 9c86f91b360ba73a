use serde::{Deserialize, Serialize};
use tracing::info;

use super::{collect_mismatch, AgreementEnricher, RateResolver};
use crate::domain::{sanitize_code_prefix, Classification, LookupResult, Rate};
use crate::errors::TariffError;
use crate::store::{ClassifiedRate, ReferenceStore};

pub const MAX_EXPAND_LIMIT: usize = 500;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandRequest {
    pub importer_code: String,
    #[serde(default)]
    pub origin_code: Option<String>,
    pub code_prefix: String,
    /// Falls back to the configured default when absent.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ExpandRequest {
    pub fn new(
        importer_code: impl Into<String>,
        origin_code: Option<&str>,
        code_prefix: impl Into<String>,
    ) -> Self {
        Self {
            importer_code: importer_code.into(),
            origin_code: origin_code.map(str::to_string),
            code_prefix: code_prefix.into(),
            limit: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_EXPAND_LIMIT)
}

/// Groups scanned rows by classification, keeping the order in which each
/// classification was first seen.
pub fn group_by_classification(rows: Vec<ClassifiedRate>) -> Vec<(Classification, Vec<Rate>)> {
    let mut groups: Vec<(Classification, Vec<Rate>)> = Vec::new();
    for row in rows {
        let existing = groups
            .iter_mut()
            .find(|(classification, _)| classification.id == row.classification.id);
        match existing {
            Some((_, rates)) => rates.push(row.rate),
            None => groups.push((row.classification, vec![row.rate])),
        }
    }
    groups
}

impl<S> RateResolver<S>
where
    S: ReferenceStore,
{
    /// One `LookupResult` per classification under `code_prefix`.
    ///
    /// An origin with no rows under the prefix degrades to the importer-only
    /// scan; those results report no origin since their options are not
    /// origin-filtered.
    pub async fn expand_subcategories(
        &self,
        request: &ExpandRequest,
    ) -> Result<Vec<LookupResult>, TariffError> {
        let prefix = sanitize_code_prefix(&request.code_prefix)?;
        let limit = clamp_limit(request.limit.unwrap_or(self.policy.default_expand_limit));
        let importer_code = self.policy.country_codes.normalize(&request.importer_code)?;
        let origin_code = self.normalize_origin(request.origin_code.as_deref())?;

        let importer = self.require_country(&importer_code).await?;
        let origin = match &origin_code {
            Some(code) => Some(self.require_country(code).await?),
            None => None,
        };

        let mut reported_origin = origin.as_ref().map(|country| country.code.clone());
        let mut rows =
            self.store.scan_prefix(&importer.code, reported_origin.as_ref(), &prefix).await?;

        if rows.is_empty() {
            if let Some(origin) = reported_origin.take() {
                rows = self.store.scan_prefix(&importer.code, None, &prefix).await?;
                info!(
                    event_name = "tariff.expand.origin_degraded",
                    importer = %importer.code,
                    origin = %origin,
                    prefix = %prefix,
                    rows = rows.len(),
                    "no origin-specific rows under prefix; using importer-only scan"
                );
            }
        }

        let mut groups = group_by_classification(rows);
        groups.truncate(limit);

        let mut enricher = AgreementEnricher::new(&self.store);
        let mut results = Vec::with_capacity(groups.len());
        for (classification, rates) in groups {
            let mut warnings = Vec::new();
            let mut options = Vec::with_capacity(rates.len());
            for rate in &rates {
                collect_mismatch(rate, &mut warnings);
                options.push(enricher.option_for(rate).await);
            }
            results.push(LookupResult {
                importer_code: importer.code.0.clone(),
                origin_code: reported_origin.as_ref().map(|code| code.0.clone()),
                classification_code: classification.code,
                options,
                warnings,
            });
        }

        info!(
            event_name = "tariff.expand.completed",
            importer = %importer.code,
            prefix = %prefix,
            limit,
            results = results.len(),
            agreements_fetched = enricher.cached_agreements(),
            "classification subtree expanded"
        );

        Ok(results)
    }
}
