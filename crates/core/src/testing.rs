use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::domain::{
    Agreement, AgreementId, Classification, CodeConvention, Country, CountryCode, CountryCodes,
    Rate, RateId, ReferenceDataset,
};
use crate::errors::StoreError;
use crate::resolver::ResolverPolicy;
use crate::store::{ClassifiedRate, RateQuery, ReferenceStore};

const DEMO_REFERENCE: &str = include_str!("../../../fixtures/demo_reference.json");

pub(crate) fn demo_dataset() -> ReferenceDataset {
    ReferenceDataset::from_json(DEMO_REFERENCE).expect("demo fixture parses")
}

pub(crate) fn demo_policy() -> ResolverPolicy {
    let aliases = BTreeMap::from(
        [("US", "USA"), ("MX", "MEX"), ("CA", "CAN"), ("CN", "CHN"), ("DE", "DEU")]
            .map(|(alpha2, alpha3)| (alpha2.to_string(), alpha3.to_string())),
    );
    ResolverPolicy {
        country_codes: CountryCodes::new(CodeConvention::Alpha3, aliases),
        ..ResolverPolicy::default()
    }
}

/// Vec-backed store with switches for outage scenarios and read counters.
#[derive(Default)]
pub(crate) struct FixtureStore {
    dataset: ReferenceDataset,
    failing_agreements: bool,
    unavailable: bool,
    agreement_fetches: AtomicUsize,
    reads: AtomicUsize,
}

impl FixtureStore {
    pub(crate) fn demo() -> Self {
        Self { dataset: demo_dataset(), ..Self::default() }
    }

    pub(crate) fn failing_agreements(mut self) -> Self {
        self.failing_agreements = true;
        self
    }

    pub(crate) fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub(crate) fn agreement_fetches(&self) -> usize {
        self.agreement_fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub(crate) fn rate(&self, id: RateId) -> Option<Rate> {
        self.dataset.rates.iter().find(|rate| rate.id == id).cloned()
    }

    pub(crate) fn classification_for(&self, rate: &Rate) -> Option<Classification> {
        self.dataset.classifications.iter().find(|c| c.id == rate.classification_id).cloned()
    }

    fn read(&self) -> Result<(), StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(StoreError::Unavailable("fixture store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReferenceStore for FixtureStore {
    async fn find_country(&self, code: &CountryCode) -> Result<Option<Country>, StoreError> {
        self.read()?;
        Ok(self.dataset.countries.iter().find(|country| &country.code == code).cloned())
    }

    async fn find_classification(
        &self,
        importer: &CountryCode,
        code: &str,
    ) -> Result<Option<Classification>, StoreError> {
        self.read()?;
        Ok(self
            .dataset
            .classifications
            .iter()
            .find(|c| &c.importer == importer && c.code == code)
            .cloned())
    }

    async fn find_rates(&self, query: &RateQuery) -> Result<Vec<Rate>, StoreError> {
        self.read()?;
        Ok(self
            .dataset
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
        self.read()?;
        self.agreement_fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing_agreements {
            return Err(StoreError::Unavailable("agreement table locked".to_string()));
        }
        Ok(self.dataset.agreements.iter().find(|agreement| agreement.id == id).cloned())
    }

    async fn scan_prefix(
        &self,
        importer: &CountryCode,
        origin: Option<&CountryCode>,
        prefix: &str,
    ) -> Result<Vec<ClassifiedRate>, StoreError> {
        self.read()?;
        let mut rows: Vec<ClassifiedRate> = self
            .dataset
            .rates
            .iter()
            .filter(|rate| &rate.importer == importer)
            .filter(|rate| origin.map_or(true, |origin| rate.origin.as_ref() == Some(origin)))
            .filter_map(|rate| {
                self.classification_for(rate)
                    .filter(|classification| classification.code.starts_with(prefix))
                    .map(|classification| ClassifiedRate { classification, rate: rate.clone() })
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
