use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tariff_core::domain::{
    Agreement, AgreementId, Classification, ClassificationId, Country, CountryCode, Rate,
    ReferenceDataset,
};
use tariff_core::errors::StoreError;
use tariff_core::store::{ClassifiedRate, RateQuery, ReferenceStore};

#[derive(Default)]
struct Tables {
    countries: HashMap<CountryCode, Country>,
    agreements: HashMap<AgreementId, Agreement>,
    classifications: HashMap<ClassificationId, Classification>,
    rates: Vec<Rate>,
}

impl Tables {
    fn from_dataset(dataset: ReferenceDataset) -> Self {
        Self {
            countries: dataset
                .countries
                .into_iter()
                .map(|country| (country.code.clone(), country))
                .collect(),
            agreements: dataset
                .agreements
                .into_iter()
                .map(|agreement| (agreement.id, agreement))
                .collect(),
            classifications: dataset
                .classifications
                .into_iter()
                .map(|classification| (classification.id, classification))
                .collect(),
            rates: dataset.rates,
        }
    }
}

/// Reference data held in memory. `replace` swaps the whole snapshot so
/// readers never observe a half-loaded dataset.
#[derive(Default)]
pub struct InMemoryReferenceStore {
    tables: RwLock<Tables>,
}

impl InMemoryReferenceStore {
    pub fn from_dataset(dataset: ReferenceDataset) -> Self {
        Self { tables: RwLock::new(Tables::from_dataset(dataset)) }
    }

    pub async fn replace(&self, dataset: ReferenceDataset) {
        let mut tables = self.tables.write().await;
        *tables = Tables::from_dataset(dataset);
    }

    pub async fn rate_count(&self) -> usize {
        self.tables.read().await.rates.len()
    }
}

#[async_trait]
impl ReferenceStore for InMemoryReferenceStore {
    async fn find_country(&self, code: &CountryCode) -> Result<Option<Country>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.countries.get(code).cloned())
    }

    async fn find_classification(
        &self,
        importer: &CountryCode,
        code: &str,
    ) -> Result<Option<Classification>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .classifications
            .values()
            .find(|classification| {
                &classification.importer == importer && classification.code == code
            })
            .cloned())
    }

    async fn find_rates(&self, query: &RateQuery) -> Result<Vec<Rate>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .rates
            .iter()
            .filter(|rate| {
                rate.importer == query.importer
                    && rate.classification_id == query.classification_id
                    && rate.basis == query.basis
                    && query.origin.matches(rate.origin.as_ref())
            })
            .cloned()
            .collect())
    }

    async fn find_agreement(&self, id: AgreementId) -> Result<Option<Agreement>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.agreements.get(&id).cloned())
    }

    async fn scan_prefix(
        &self,
        importer: &CountryCode,
        origin: Option<&CountryCode>,
        prefix: &str,
    ) -> Result<Vec<ClassifiedRate>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<ClassifiedRate> = tables
            .rates
            .iter()
            .filter(|rate| &rate.importer == importer)
            .filter(|rate| origin.map_or(true, |origin| rate.origin.as_ref() == Some(origin)))
            .filter_map(|rate| {
                let classification = tables.classifications.get(&rate.classification_id)?;
                classification.code.starts_with(prefix).then(|| ClassifiedRate {
                    classification: classification.clone(),
                    rate: rate.clone(),
                })
            })
            .collect();

        rows.sort_by(|left, right| {
            left.classification
                .code
                .cmp(&right.classification.code)
                .then_with(|| left.rate.id.cmp(&right.rate.id))
        });
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use tariff_core::domain::{Basis, ClassificationId, CountryCode};
    use tariff_core::store::{OriginScope, RateQuery, ReferenceStore};

    use super::InMemoryReferenceStore;
    use crate::fixtures::DemoReferenceDataset;

    fn code(value: &str) -> CountryCode {
        CountryCode(value.to_string())
    }

    #[tokio::test]
    async fn classification_lookup_is_scoped_by_importer() {
        let store = InMemoryReferenceStore::from_dataset(
            DemoReferenceDataset::dataset().expect("demo dataset"),
        );

        let usa = store.find_classification(&code("USA"), "080440").await.expect("read");
        let can = store.find_classification(&code("CAN"), "080440").await.expect("read");

        assert_eq!(usa.map(|c| c.id), Some(ClassificationId(10)));
        assert_eq!(can.map(|c| c.id), Some(ClassificationId(20)));
    }

    #[tokio::test]
    async fn general_scope_only_returns_rows_without_origin() {
        let store = InMemoryReferenceStore::from_dataset(
            DemoReferenceDataset::dataset().expect("demo dataset"),
        );
        let rates = store
            .find_rates(&RateQuery {
                importer: code("USA"),
                origin: OriginScope::General,
                classification_id: ClassificationId(10),
                basis: Basis::Mfn,
            })
            .await
            .expect("read");

        let mut ids: Vec<_> = rates.iter().map(|rate| rate.id.0).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![100, 104]);
    }

    #[tokio::test]
    async fn replace_swaps_the_snapshot() {
        let store = InMemoryReferenceStore::default();
        assert_eq!(store.rate_count().await, 0);

        store.replace(DemoReferenceDataset::dataset().expect("demo dataset")).await;

        assert_eq!(store.rate_count().await, 8);
        assert!(store.find_country(&code("MEX")).await.expect("read").is_some());
    }
}
