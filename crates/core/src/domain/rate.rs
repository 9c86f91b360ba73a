use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::agreement::AgreementId;
use crate::domain::classification::ClassificationId;
use crate::domain::country::CountryCode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RateId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Basis {
    #[serde(rename = "MFN", alias = "mfn")]
    Mfn,
    #[serde(rename = "PREF", alias = "pref")]
    Pref,
}

impl Basis {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mfn => "MFN",
            Self::Pref => "PREF",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "MFN" => Some(Self::Mfn),
            "PREF" => Some(Self::Pref),
            _ => None,
        }
    }
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a duty is expressed. Ad-valorem rates are ratios (`0.10` is 10%).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RateKind {
    AdValorem { rate: Decimal },
    Specific { amount: Decimal, unit: String },
    Compound { rate: Decimal, amount: Decimal, unit: String },
    NonAdValorem { text: String },
}

impl RateKind {
    pub fn ad_valorem_rate(&self) -> Option<Decimal> {
        match self {
            Self::AdValorem { rate } | Self::Compound { rate, .. } => Some(*rate),
            Self::Specific { .. } | Self::NonAdValorem { .. } => None,
        }
    }

    pub fn specific_component(&self) -> Option<(Decimal, &str)> {
        match self {
            Self::Specific { amount, unit } | Self::Compound { amount, unit, .. } => {
                Some((*amount, unit.as_str()))
            }
            Self::AdValorem { .. } | Self::NonAdValorem { .. } => None,
        }
    }

    pub fn is_non_ad_valorem(&self) -> bool {
        !matches!(self, Self::AdValorem { .. })
    }

    /// Human text for the non-percentage part, if there is one.
    pub fn non_ad_valorem_text(&self) -> Option<String> {
        match self {
            Self::AdValorem { .. } => None,
            Self::NonAdValorem { text } => Some(text.clone()),
            Self::Specific { amount, unit } | Self::Compound { amount, unit, .. } => {
                Some(format!("{amount} {unit}"))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    pub id: RateId,
    pub importer: CountryCode,
    /// `None` is the general, non-origin-specific row.
    pub origin: Option<CountryCode>,
    pub classification_id: ClassificationId,
    pub basis: Basis,
    pub agreement_id: Option<AgreementId>,
    pub kind: RateKind,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    pub source_ref: Option<String>,
}

impl Rate {
    pub fn has_valid_window(&self) -> bool {
        self.valid_to.map_or(true, |valid_to| self.valid_from <= valid_to)
    }

    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && self.valid_to.map_or(true, |valid_to| date <= valid_to)
    }

    /// PREF rows are expected to name an agreement and MFN rows not to.
    pub fn agreement_mismatch(&self) -> Option<String> {
        match (self.basis, self.agreement_id) {
            (Basis::Pref, None) => {
                Some(format!("PREF rate {} has no agreement reference", self.id.0))
            }
            (Basis::Mfn, Some(agreement)) => Some(format!(
                "MFN rate {} references agreement {}",
                self.id.0, agreement.0
            )),
            _ => None,
        }
    }
}

/// Picks the row in force on `date`: greatest `valid_from`, then greatest
/// id. Rows with an inverted window never qualify.
pub fn select_current(rates: &[Rate], date: NaiveDate) -> Option<&Rate> {
    rates
        .iter()
        .filter(|rate| rate.has_valid_window() && rate.is_valid_on(date))
        .max_by(|left, right| {
            left.valid_from.cmp(&right.valid_from).then_with(|| left.id.cmp(&right.id))
        })
}
