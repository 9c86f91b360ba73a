use std::collections::HashMap;

use tracing::warn;

use crate::domain::{Agreement, AgreementId, Rate, RateOption};
use crate::store::ReferenceStore;

/// Attaches agreement name and RVC threshold to rate options.
///
/// Lives for one request. Agreements are fetched at most once per id; a
/// missing agreement or a failed fetch leaves the metadata null instead of
/// failing the lookup. Failed fetches are not cached.
pub struct AgreementEnricher<'a, S: ?Sized> {
    store: &'a S,
    cache: HashMap<AgreementId, Option<Agreement>>,
}

impl<'a, S> AgreementEnricher<'a, S>
where
    S: ReferenceStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store, cache: HashMap::new() }
    }

    pub async fn agreement(&mut self, id: AgreementId) -> Option<Agreement> {
        if let Some(cached) = self.cache.get(&id) {
            return cached.clone();
        }

        match self.store.find_agreement(id).await {
            Ok(found) => {
                if found.is_none() {
                    warn!(
                        event_name = "tariff.enrich.agreement_missing",
                        agreement_id = id.0,
                        "agreement referenced by rate is missing; metadata left null"
                    );
                }
                self.cache.insert(id, found.clone());
                found
            }
            Err(error) => {
                warn!(
                    event_name = "tariff.enrich.agreement_unavailable",
                    agreement_id = id.0,
                    error = %error,
                    "agreement fetch failed; metadata left null"
                );
                None
            }
        }
    }

    pub async fn option_for(&mut self, rate: &Rate) -> RateOption {
        let agreement = match rate.agreement_id {
            Some(id) => self.agreement(id).await,
            None => None,
        };
        RateOption::from_rate(rate, agreement.as_ref())
    }

    pub fn cached_agreements(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::AgreementEnricher;
    use crate::domain::{AgreementId, RateId};
    use crate::testing::FixtureStore;

    #[tokio::test]
    async fn repeated_agreements_are_fetched_once() {
        let store = FixtureStore::demo();
        let mut enricher = AgreementEnricher::new(&store);

        for _ in 0..3 {
            let agreement = enricher.agreement(AgreementId(1)).await.expect("USMCA exists");
            assert_eq!(agreement.rvc_threshold, Some(Decimal::new(60, 0)));
        }

        assert_eq!(store.agreement_fetches(), 1);
        assert_eq!(enricher.cached_agreements(), 1);
    }

    #[tokio::test]
    async fn missing_agreement_degrades_to_null_metadata() {
        let store = FixtureStore::demo();
        let rate = store.rate(RateId(103)).expect("CHN pref row");
        let mut enricher = AgreementEnricher::new(&store);

        let option = enricher.option_for(&rate).await;
        assert_eq!(option.agreement_id, Some(99));
        assert_eq!(option.agreement_name, None);
        assert_eq!(option.rvc_threshold, None);
    }

    #[tokio::test]
    async fn store_failure_during_enrichment_is_absorbed() {
        let store = FixtureStore::demo().failing_agreements();
        let rate = store.rate(RateId(102)).expect("MEX pref row");
        let mut enricher = AgreementEnricher::new(&store);

        let option = enricher.option_for(&rate).await;
        assert_eq!(option.agreement_name, None);
        assert_eq!(enricher.cached_agreements(), 0);
    }
}
