use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::agreement::Agreement;
use crate::domain::rate::{Basis, Rate};

/// Provenance tag carried by every synthesized fallback option.
pub const SYNTHETIC_SOURCE_REF: &str = "synthetic:importer-name-hash";

/// One candidate rate as returned to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateOption {
    pub id: Option<i64>,
    pub basis: Basis,
    pub ad_valorem_rate: Option<Decimal>,
    pub non_ad_valorem: bool,
    pub non_ad_valorem_text: Option<String>,
    pub specific_amount: Option<Decimal>,
    pub specific_unit: Option<String>,
    pub agreement_id: Option<i64>,
    pub agreement_name: Option<String>,
    pub rvc_threshold: Option<Decimal>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub source_ref: Option<String>,
    #[serde(default)]
    pub synthetic: bool,
}

impl RateOption {
    /// Projects a stored rate. Agreement metadata stays null when the
    /// agreement could not be resolved.
    pub fn from_rate(rate: &Rate, agreement: Option<&Agreement>) -> Self {
        let specific = rate.kind.specific_component();
        Self {
            id: Some(rate.id.0),
            basis: rate.basis,
            ad_valorem_rate: rate.kind.ad_valorem_rate(),
            non_ad_valorem: rate.kind.is_non_ad_valorem(),
            non_ad_valorem_text: rate.kind.non_ad_valorem_text(),
            specific_amount: specific.map(|(amount, _)| amount),
            specific_unit: specific.map(|(_, unit)| unit.to_string()),
            agreement_id: rate.agreement_id.map(|id| id.0),
            agreement_name: agreement.map(|agreement| agreement.name.clone()),
            rvc_threshold: agreement.and_then(|agreement| agreement.rvc_threshold),
            valid_from: Some(rate.valid_from),
            valid_to: rate.valid_to,
            source_ref: rate.source_ref.clone(),
            synthetic: false,
        }
    }

    pub fn synthetic_mfn(ad_valorem_rate: Decimal) -> Self {
        Self {
            id: None,
            basis: Basis::Mfn,
            ad_valorem_rate: Some(ad_valorem_rate),
            non_ad_valorem: false,
            non_ad_valorem_text: None,
            specific_amount: None,
            specific_unit: None,
            agreement_id: None,
            agreement_name: None,
            rvc_threshold: None,
            valid_from: None,
            valid_to: None,
            source_ref: Some(SYNTHETIC_SOURCE_REF.to_string()),
            synthetic: true,
        }
    }

    /// True when only opaque text describes the duty.
    pub fn is_opaque(&self) -> bool {
        self.ad_valorem_rate.is_none() && self.specific_amount.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResult {
    pub importer_code: String,
    pub origin_code: Option<String>,
    pub classification_code: String,
    pub options: Vec<RateOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl LookupResult {
    pub fn option(&self, basis: Basis) -> Option<&RateOption> {
        self.options.iter().find(|option| option.basis == basis)
    }

    pub fn mfn(&self) -> Option<&RateOption> {
        self.option(Basis::Mfn)
    }

    pub fn pref(&self) -> Option<&RateOption> {
        self.option(Basis::Pref)
    }
}
