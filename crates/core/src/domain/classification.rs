use serde::{Deserialize, Serialize};

use crate::domain::country::CountryCode;
use crate::errors::TariffError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassificationId(pub i64);

/// A product classification line in one importer's tariff schedule. The
/// same code string may appear under several importers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub id: ClassificationId,
    pub importer: CountryCode,
    pub code: String,
    pub label: String,
}

/// Strips `.` and whitespace separators (`0804.40` -> `080440`) and rejects
/// anything that is not a run of ASCII digits.
pub fn normalize_classification_code(raw: &str) -> Result<String, TariffError> {
    let code: String =
        raw.chars().filter(|ch| *ch != '.' && !ch.is_whitespace()).collect();
    if code.is_empty() {
        return Err(TariffError::InvalidArgument("classification_code is required".to_string()));
    }
    if !code.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(TariffError::InvalidArgument(format!(
            "classification_code `{}` must contain only digits",
            raw.trim()
        )));
    }
    Ok(code)
}

/// Keeps only the digits of a subtree prefix. Fewer than four digits is too
/// broad to expand.
pub fn sanitize_code_prefix(raw: &str) -> Result<String, TariffError> {
    let prefix: String = raw.chars().filter(|ch| ch.is_ascii_digit()).collect();
    if prefix.len() < 4 {
        return Err(TariffError::InvalidArgument(format!(
            "code prefix `{}` must contain at least 4 digits",
            raw.trim()
        )));
    }
    Ok(prefix)
}

#[cfg(test)]
mod tests {
    use super::{normalize_classification_code, sanitize_code_prefix};
    use crate::errors::TariffError;

    #[test]
    fn classification_code_separators_are_stripped() {
        assert_eq!(normalize_classification_code(" 0804.40 ").unwrap(), "080440");
    }

    #[test]
    fn empty_or_alphabetic_codes_are_rejected() {
        assert!(matches!(normalize_classification_code(""), Err(TariffError::InvalidArgument(_))));
        assert!(matches!(
            normalize_classification_code("08A440"),
            Err(TariffError::InvalidArgument(_))
        ));
    }

    #[test]
    fn prefix_needs_four_digits() {
        assert!(matches!(sanitize_code_prefix("12"), Err(TariffError::InvalidArgument(_))));
        assert_eq!(sanitize_code_prefix("1234").unwrap(), "1234");
    }

    #[test]
    fn prefix_drops_non_digits_before_counting() {
        assert_eq!(sanitize_code_prefix("HS 08.04-").unwrap(), "0804");
        assert!(matches!(sanitize_code_prefix("ab.1.2c3"), Err(TariffError::InvalidArgument(_))));
    }
}
