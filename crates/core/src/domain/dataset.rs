use serde::{Deserialize, Serialize};

use crate::domain::{Agreement, Classification, Country, Rate};

/// A snapshot of reference data, as handed over by the ingestion process.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDataset {
    #[serde(default)]
    pub countries: Vec<Country>,
    #[serde(default)]
    pub classifications: Vec<Classification>,
    #[serde(default)]
    pub agreements: Vec<Agreement>,
    #[serde(default)]
    pub rates: Vec<Rate>,
}

impl ReferenceDataset {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Dangling references and inverted validity windows. The resolver
    /// tolerates all of these; the list is for operators.
    pub fn integrity_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for classification in &self.classifications {
            if !self.countries.iter().any(|country| country.code == classification.importer) {
                issues.push(format!(
                    "classification {} references unknown importer {}",
                    classification.id.0, classification.importer
                ));
            }
        }

        for rate in &self.rates {
            if !rate.has_valid_window() {
                issues.push(format!("rate {} has valid_to before valid_from", rate.id.0));
            }
            if !self.classifications.iter().any(|c| c.id == rate.classification_id) {
                issues.push(format!(
                    "rate {} references unknown classification {}",
                    rate.id.0, rate.classification_id.0
                ));
            }
            if let Some(agreement_id) = rate.agreement_id {
                if !self.agreements.iter().any(|agreement| agreement.id == agreement_id) {
                    issues.push(format!(
                        "rate {} references unknown agreement {}",
                        rate.id.0, agreement_id.0
                    ));
                }
            }
        }

        issues
    }
}
