use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Basis, LookupResult, RateOption};
use crate::errors::TariffError;

/// Fraction digits kept on the computed RVC percentage.
pub const RVC_SCALE: u32 = 6;

/// Cost components that make up regional value content. Absent components
/// count as zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CostBreakdown {
    pub material: Decimal,
    pub labour: Decimal,
    pub overhead: Decimal,
    pub profit: Decimal,
    pub other: Decimal,
}

impl CostBreakdown {
    /// `None` when the sum leaves the decimal range.
    pub fn total(&self) -> Option<Decimal> {
        self.material
            .checked_add(self.labour)?
            .checked_add(self.overhead)?
            .checked_add(self.profit)?
            .checked_add(self.other)
    }

    fn components(&self) -> [(&'static str, Decimal); 5] {
        [
            ("material", self.material),
            ("labour", self.labour),
            ("overhead", self.overhead),
            ("profit", self.profit),
            ("other", self.other),
        ]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationRequest {
    #[serde(default)]
    pub mfn_rate: Option<Decimal>,
    #[serde(default)]
    pub pref_rate: Option<Decimal>,
    /// Percentage, 0-100.
    #[serde(default)]
    pub rvc_threshold: Option<Decimal>,
    #[serde(flatten)]
    pub costs: CostBreakdown,
    #[serde(default)]
    pub fob: Option<Decimal>,
    #[serde(default)]
    pub total_value: Option<Decimal>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub mfn_specific_amount: Option<Decimal>,
    #[serde(default)]
    pub pref_specific_amount: Option<Decimal>,
}

impl CalculationRequest {
    /// Seeds rates and threshold from a prior lookup. Costs, fob, value and
    /// quantity are left for the caller.
    pub fn from_lookup(lookup: &LookupResult) -> Self {
        let mfn = lookup.mfn();
        let pref = lookup.pref().filter(|option| !option.is_opaque());
        Self {
            mfn_rate: mfn.and_then(|option| option.ad_valorem_rate),
            mfn_specific_amount: mfn.and_then(|option| option.specific_amount),
            pref_rate: pref.map(pref_ad_valorem),
            pref_specific_amount: pref.and_then(|option| option.specific_amount),
            rvc_threshold: pref.and_then(|option| option.rvc_threshold),
            ..Self::default()
        }
    }

    pub fn with_costs(mut self, costs: CostBreakdown) -> Self {
        self.costs = costs;
        self
    }

    pub fn with_values(mut self, fob: Decimal, total_value: Decimal) -> Self {
        self.fob = Some(fob);
        self.total_value = Some(total_value);
        self
    }

    pub fn with_quantity(mut self, quantity: Option<Decimal>) -> Self {
        self.quantity = quantity;
        self
    }
}

// A purely specific PREF row still counts as a preferential rate.
fn pref_ad_valorem(option: &RateOption) -> Decimal {
    option.ad_valorem_rate.unwrap_or(Decimal::ZERO)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResponse {
    pub basis: Basis,
    pub applied_rate: Decimal,
    pub applied_specific_amount: Option<Decimal>,
    pub ad_valorem_duty: Decimal,
    pub specific_duty: Decimal,
    pub total_duty: Decimal,
    pub rvc_computed: Decimal,
    pub rvc_threshold: Option<Decimal>,
    pub trace: Vec<CalculationStep>,
}

pub trait DutyCalculator: Send + Sync {
    fn calculate(&self, request: &CalculationRequest) -> Result<CalculationResponse, TariffError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicDutyCalculator;

impl DutyCalculator for DeterministicDutyCalculator {
    fn calculate(&self, request: &CalculationRequest) -> Result<CalculationResponse, TariffError> {
        calculate(request)
    }
}

pub fn calculate(request: &CalculationRequest) -> Result<CalculationResponse, TariffError> {
    let total_value = require(request.total_value, "totalValue")?;
    let fob = require(request.fob, "fob")?;

    for (name, value) in request.costs.components() {
        non_negative(value, name)?;
    }
    non_negative(fob, "fob")?;
    non_negative(total_value, "totalValue")?;
    if let Some(quantity) = request.quantity {
        non_negative(quantity, "quantity")?;
    }
    if request.mfn_rate.is_none() && request.mfn_specific_amount.is_none() {
        return Err(TariffError::InvalidArgument(
            "mfnRate or mfnSpecificAmount is required".to_string(),
        ));
    }

    if fob.is_zero() {
        return Err(TariffError::Arithmetic("fob is zero; RVC is undefined".to_string()));
    }

    let cost_total = request
        .costs
        .total()
        .ok_or_else(|| TariffError::Arithmetic("cost total overflows".to_string()))?;
    let rvc = cost_total
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.checked_div(fob))
        .ok_or_else(|| TariffError::Arithmetic("RVC overflows decimal range".to_string()))?
        .round_dp_with_strategy(RVC_SCALE, RoundingStrategy::MidpointAwayFromZero);

    let mut trace = vec![step("rvc", format!("{cost_total} * 100 / {fob}"), rvc)];

    let has_pref = request.pref_rate.is_some() || request.pref_specific_amount.is_some();
    let qualifies = match (has_pref, request.rvc_threshold) {
        (true, Some(threshold)) => rvc >= threshold,
        _ => false,
    };

    let (basis, applied_rate, applied_specific) = if qualifies {
        (
            Basis::Pref,
            request.pref_rate.unwrap_or(Decimal::ZERO),
            request.pref_specific_amount,
        )
    } else {
        (
            Basis::Mfn,
            request.mfn_rate.unwrap_or(Decimal::ZERO),
            request.mfn_specific_amount,
        )
    };
    let detail = basis_detail(basis, has_pref, rvc, request.rvc_threshold);
    trace.push(step("basis", detail, applied_rate));

    let ad_valorem_duty = total_value
        .checked_mul(applied_rate)
        .ok_or_else(|| TariffError::Arithmetic("ad valorem duty overflows".to_string()))?;
    trace.push(step(
        "ad_valorem_duty",
        format!("{total_value} * {applied_rate}"),
        ad_valorem_duty,
    ));

    let specific_duty = match applied_specific {
        Some(amount) => {
            let quantity = request.quantity.ok_or_else(|| {
                TariffError::InvalidArgument(format!(
                    "quantity is required for the {basis} specific duty component"
                ))
            })?;
            let duty = amount
                .checked_mul(quantity)
                .ok_or_else(|| TariffError::Arithmetic("specific duty overflows".to_string()))?;
            trace.push(step("specific_duty", format!("{amount} * {quantity}"), duty));
            duty
        }
        None => Decimal::ZERO,
    };

    let total_duty = ad_valorem_duty
        .checked_add(specific_duty)
        .ok_or_else(|| TariffError::Arithmetic("total duty overflows".to_string()))?;
    trace.push(step("total_duty", "ad_valorem_duty + specific_duty".to_string(), total_duty));

    debug!(
        event_name = "tariff.duty.calculated",
        basis = %basis,
        rvc = %rvc,
        total_duty = %total_duty,
        "duty calculated"
    );

    Ok(CalculationResponse {
        basis,
        applied_rate,
        applied_specific_amount: applied_specific,
        ad_valorem_duty,
        specific_duty,
        total_duty,
        rvc_computed: rvc,
        rvc_threshold: request.rvc_threshold,
        trace,
    })
}

fn require(value: Option<Decimal>, name: &str) -> Result<Decimal, TariffError> {
    value.ok_or_else(|| TariffError::InvalidArgument(format!("{name} is required")))
}

fn non_negative(value: Decimal, name: &str) -> Result<(), TariffError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(TariffError::InvalidArgument(format!("{name} must not be negative")));
    }
    Ok(())
}

fn basis_detail(basis: Basis, has_pref: bool, rvc: Decimal, threshold: Option<Decimal>) -> String {
    match (basis, has_pref, threshold) {
        (Basis::Pref, _, Some(threshold)) => format!("rvc {rvc} >= threshold {threshold}"),
        (_, false, _) => "no preferential rate".to_string(),
        (_, true, None) => "preferential rate has no RVC threshold".to_string(),
        (_, true, Some(threshold)) => format!("rvc {rvc} < threshold {threshold}"),
    }
}

fn step(stage: &str, detail: String, amount: Decimal) -> CalculationStep {
    CalculationStep { stage: stage.to_string(), detail, amount }
}
