use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::LookupResult;
use crate::duty::{
    CalculationRequest, CalculationResponse, CostBreakdown, DeterministicDutyCalculator,
    DutyCalculator,
};
use crate::errors::TariffError;
use crate::resolver::{ExpandRequest, LookupRequest, RateResolver, ResolverPolicy};
use crate::store::ReferenceStore;

/// A lookup plus the shipment figures needed to price it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[serde(flatten)]
    pub lookup: LookupRequest,
    #[serde(flatten)]
    pub costs: CostBreakdown,
    #[serde(default)]
    pub fob: Option<Decimal>,
    #[serde(default)]
    pub total_value: Option<Decimal>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DutyQuote {
    pub lookup: LookupResult,
    pub calculation: CalculationResponse,
}

/// Resolver and calculator behind one facade.
pub struct TariffEngine<S, C = DeterministicDutyCalculator> {
    resolver: RateResolver<S>,
    calculator: C,
}

impl<S> TariffEngine<S, DeterministicDutyCalculator>
where
    S: ReferenceStore,
{
    pub fn deterministic(store: S, policy: ResolverPolicy) -> Self {
        Self::new(RateResolver::new(store, policy), DeterministicDutyCalculator)
    }
}

impl<S, C> TariffEngine<S, C>
where
    S: ReferenceStore,
    C: DutyCalculator,
{
    pub fn new(resolver: RateResolver<S>, calculator: C) -> Self {
        Self { resolver, calculator }
    }

    pub fn resolver(&self) -> &RateResolver<S> {
        &self.resolver
    }

    pub async fn lookup(&self, request: &LookupRequest) -> Result<LookupResult, TariffError> {
        self.resolver.resolve_rates(request).await
    }

    pub async fn expand(&self, request: &ExpandRequest) -> Result<Vec<LookupResult>, TariffError> {
        self.resolver.expand_subcategories(request).await
    }

    pub fn calculate(
        &self,
        request: &CalculationRequest,
    ) -> Result<CalculationResponse, TariffError> {
        self.calculator.calculate(request)
    }

    pub async fn quote(&self, request: &QuoteRequest) -> Result<DutyQuote, TariffError> {
        let lookup = self.resolver.resolve_rates(&request.lookup).await?;

        let mut calculation_request =
            CalculationRequest::from_lookup(&lookup).with_costs(request.costs.clone());
        calculation_request.fob = request.fob;
        calculation_request.total_value = request.total_value;
        calculation_request.quantity = request.quantity;

        let calculation = self.calculator.calculate(&calculation_request)?;
        info!(
            event_name = "tariff.quote.completed",
            importer = %lookup.importer_code,
            classification = %lookup.classification_code,
            basis = %calculation.basis,
            total_duty = %calculation.total_duty,
            "duty quote produced"
        );

        Ok(DutyQuote { lookup, calculation })
    }
}
