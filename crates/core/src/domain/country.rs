use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::TariffError;

/// Canonical country key as stored in the reference data.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CountryCode(pub String);

impl CountryCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub code: CountryCode,
    pub name: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeConvention {
    Alpha2,
    #[default]
    Alpha3,
}

impl CodeConvention {
    pub fn code_length(self) -> usize {
        match self {
            Self::Alpha2 => 2,
            Self::Alpha3 => 3,
        }
    }

    pub fn from_length(length: u8) -> Option<Self> {
        match length {
            2 => Some(Self::Alpha2),
            3 => Some(Self::Alpha3),
            _ => None,
        }
    }
}

/// Normalizes caller-supplied country codes into the store's canonical
/// convention. Codes in the other length are translated through the
/// alpha-2 to alpha-3 alias table supplied by configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CountryCodes {
    convention: CodeConvention,
    alpha2_to_alpha3: BTreeMap<String, String>,
}

impl CountryCodes {
    pub fn new(convention: CodeConvention, aliases: BTreeMap<String, String>) -> Self {
        let alpha2_to_alpha3 = aliases
            .into_iter()
            .map(|(alpha2, alpha3)| {
                (alpha2.trim().to_ascii_uppercase(), alpha3.trim().to_ascii_uppercase())
            })
            .collect();
        Self { convention, alpha2_to_alpha3 }
    }

    pub fn convention(&self) -> CodeConvention {
        self.convention
    }

    pub fn normalize(&self, raw: &str) -> Result<CountryCode, TariffError> {
        let code = raw.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Err(TariffError::InvalidArgument("country code is required".to_string()));
        }
        if !(2..=3).contains(&code.len()) || !code.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(TariffError::InvalidArgument(format!(
                "country code `{code}` must be 2 or 3 ASCII letters"
            )));
        }

        if code.len() == self.convention.code_length() {
            return Ok(CountryCode(code));
        }

        let translated = match self.convention {
            CodeConvention::Alpha3 => self.alpha2_to_alpha3.get(&code).cloned(),
            CodeConvention::Alpha2 => self
                .alpha2_to_alpha3
                .iter()
                .find(|(_, alpha3)| **alpha3 == code)
                .map(|(alpha2, _)| alpha2.clone()),
        };

        translated.map(CountryCode).ok_or_else(|| TariffError::not_found("country", code))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{CodeConvention, CountryCode, CountryCodes};
    use crate::errors::TariffError;

    fn aliases() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("us".to_string(), "usa".to_string()),
            ("MX".to_string(), "MEX".to_string()),
        ])
    }

    #[test]
    fn alpha3_convention_accepts_canonical_codes_case_insensitively() {
        let codes = CountryCodes::new(CodeConvention::Alpha3, aliases());
        assert_eq!(codes.normalize(" can ").unwrap(), CountryCode("CAN".to_string()));
    }

    #[test]
    fn alpha3_convention_translates_alpha2_through_aliases() {
        let codes = CountryCodes::new(CodeConvention::Alpha3, aliases());
        assert_eq!(codes.normalize("us").unwrap(), CountryCode("USA".to_string()));
    }

    #[test]
    fn alpha2_convention_translates_alpha3_back() {
        let codes = CountryCodes::new(CodeConvention::Alpha2, aliases());
        assert_eq!(codes.normalize("MEX").unwrap(), CountryCode("MX".to_string()));
        assert_eq!(codes.normalize("mx").unwrap(), CountryCode("MX".to_string()));
    }

    #[test]
    fn unmapped_alternate_length_is_not_found() {
        let codes = CountryCodes::new(CodeConvention::Alpha3, aliases());
        assert!(matches!(
            codes.normalize("DE"),
            Err(TariffError::NotFound { entity: "country", .. })
        ));
    }

    #[test]
    fn malformed_codes_are_invalid_arguments() {
        let codes = CountryCodes::default();
        for raw in ["", "   ", "U", "USAX", "U5A"] {
            assert!(
                matches!(codes.normalize(raw), Err(TariffError::InvalidArgument(_))),
                "`{raw}` should be rejected"
            );
        }
    }
}
