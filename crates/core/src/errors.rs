use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("reference store unavailable: {0}")]
    Unavailable(String),
    #[error("reference record could not be decoded: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TariffError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("arithmetic error: {0}")]
    Arithmetic(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("reference data is malformed: {0}")]
    DataIntegrity(String),
}

impl TariffError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound { entity, key: key.into() }
    }

    /// Every operation is a read, so a store outage can be retried as is.
    /// A row that fails to decode fails the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound { .. } => "not_found",
            Self::Arithmetic(_) => "arithmetic_error",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::DataIntegrity(_) => "data_integrity",
        }
    }
}

impl From<StoreError> for TariffError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(_) => Self::StoreUnavailable(value.to_string()),
            StoreError::Decode(_) => Self::DataIntegrity(value.to_string()),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "No tariff data matches the requested country or product.",
            Self::ServiceUnavailable { .. } => {
                "Tariff reference data is temporarily unavailable. Please retry shortly."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl TariffError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<TariffError> for InterfaceError {
    fn from(value: TariffError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            TariffError::InvalidArgument(message) | TariffError::Arithmetic(message) => {
                Self::BadRequest { message, correlation_id }
            }
            TariffError::NotFound { entity, key } => {
                Self::NotFound { message: format!("{entity} `{key}`"), correlation_id }
            }
            TariffError::StoreUnavailable(message) | TariffError::DataIntegrity(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{InterfaceError, StoreError, TariffError};

    #[test]
    fn invalid_argument_maps_to_bad_request_with_correlation_id() {
        let interface = TariffError::InvalidArgument("classification_code is required".to_owned())
            .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn zero_denominator_is_a_bad_request() {
        let interface =
            TariffError::Arithmetic("fob must not be zero".to_owned()).into_interface("req-2");
        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
    }

    #[test]
    fn not_found_names_the_missing_reference() {
        let interface =
            TariffError::not_found("classification", "USA/999999").into_interface("req-3");
        assert!(matches!(
            interface,
            InterfaceError::NotFound { ref message, .. } if message == "classification `USA/999999`"
        ));
    }

    #[test]
    fn store_errors_become_retryable_service_unavailable() {
        let error = TariffError::from(StoreError::Unavailable("pool timed out".to_owned()));
        assert!(error.is_retryable());
        assert_eq!(error.kind(), "store_unavailable");

        let interface = error.into_interface("req-4");
        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "req-4");
    }

    #[test]
    fn undecodable_rows_are_service_unavailable_but_not_retryable() {
        let error = TariffError::from(StoreError::Decode("rate 7: unknown basis".to_owned()));
        assert!(matches!(error, TariffError::DataIntegrity(_)));
        assert!(!error.is_retryable());
        assert_eq!(error.kind(), "data_integrity");

        let interface = error.into_interface("req-5");
        assert!(matches!(
            interface,
            InterfaceError::ServiceUnavailable { ref message, .. } if message.contains("rate 7")
        ));
    }

    #[test]
    fn only_store_outages_are_retryable() {
        assert!(!TariffError::InvalidArgument("x".to_owned()).is_retryable());
        assert!(!TariffError::not_found("country", "ZZZ").is_retryable());
        assert!(!TariffError::Arithmetic("x".to_owned()).is_retryable());
        assert!(!TariffError::DataIntegrity("x".to_owned()).is_retryable());
    }
}
