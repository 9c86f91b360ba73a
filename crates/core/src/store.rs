use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{
    Agreement, AgreementId, Basis, Classification, ClassificationId, Country, CountryCode, Rate,
};
use crate::errors::StoreError;

/// Which origin a rate query is constrained to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OriginScope {
    /// Rows for exactly this origin.
    Exactly(CountryCode),
    /// Rows with no origin, i.e. the general schedule.
    General,
}

impl OriginScope {
    pub fn matches(&self, origin: Option<&CountryCode>) -> bool {
        match self {
            Self::Exactly(expected) => origin == Some(expected),
            Self::General => origin.is_none(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateQuery {
    pub importer: CountryCode,
    pub origin: OriginScope,
    pub classification_id: ClassificationId,
    pub basis: Basis,
}

/// A rate together with the classification it belongs to, as produced by a
/// prefix scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedRate {
    pub classification: Classification,
    pub rate: Rate,
}

/// Read-only access to countries, classifications, agreements and rates.
///
/// `find_rates` may return rows outside their validity window; callers pick
/// the row in force themselves. `scan_prefix` returns rows ordered by
/// classification code so grouping is stable.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn find_country(&self, code: &CountryCode) -> Result<Option<Country>, StoreError>;

    async fn find_classification(
        &self,
        importer: &CountryCode,
        code: &str,
    ) -> Result<Option<Classification>, StoreError>;

    async fn find_rates(&self, query: &RateQuery) -> Result<Vec<Rate>, StoreError>;

    async fn find_agreement(&self, id: AgreementId) -> Result<Option<Agreement>, StoreError>;

    /// With `origin` set, only rows for exactly that origin are returned.
    async fn scan_prefix(
        &self,
        importer: &CountryCode,
        origin: Option<&CountryCode>,
        prefix: &str,
    ) -> Result<Vec<ClassifiedRate>, StoreError>;
}

#[async_trait]
impl<T> ReferenceStore for Arc<T>
where
    T: ReferenceStore + ?Sized,
{
    async fn find_country(&self, code: &CountryCode) -> Result<Option<Country>, StoreError> {
        (**self).find_country(code).await
    }

    async fn find_classification(
        &self,
        importer: &CountryCode,
        code: &str,
    ) -> Result<Option<Classification>, StoreError> {
        (**self).find_classification(importer, code).await
    }

    async fn find_rates(&self, query: &RateQuery) -> Result<Vec<Rate>, StoreError> {
        (**self).find_rates(query).await
    }

    async fn find_agreement(&self, id: AgreementId) -> Result<Option<Agreement>, StoreError> {
        (**self).find_agreement(id).await
    }

    async fn scan_prefix(
        &self,
        importer: &CountryCode,
        origin: Option<&CountryCode>,
        prefix: &str,
    ) -> Result<Vec<ClassifiedRate>, StoreError> {
        (**self).scan_prefix(importer, origin, prefix).await
    }
}
