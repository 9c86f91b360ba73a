pub mod config;
pub mod domain;
pub mod duty;
pub mod engine;
pub mod errors;
pub mod resolver;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::{
    Agreement, AgreementId, Basis, Classification, ClassificationId, CodeConvention, Country,
    CountryCode, CountryCodes, LookupResult, Rate, RateId, RateKind, RateOption, ReferenceDataset,
};
pub use duty::{
    calculate, CalculationRequest, CalculationResponse, CalculationStep, CostBreakdown,
    DeterministicDutyCalculator, DutyCalculator,
};
pub use engine::{DutyQuote, QuoteRequest, TariffEngine};
pub use errors::{InterfaceError, StoreError, TariffError};
pub use resolver::{
    ExpandRequest, FallbackRates, LookupRequest, RateResolver, ResolverPolicy, Strictness,
};
pub use store::{ClassifiedRate, OriginScope, RateQuery, ReferenceStore};
