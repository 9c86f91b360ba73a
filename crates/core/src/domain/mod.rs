pub mod agreement;
pub mod classification;
pub mod country;
pub mod dataset;
pub mod lookup;
pub mod rate;

pub use agreement::{Agreement, AgreementId};
pub use classification::{
    normalize_classification_code, sanitize_code_prefix, Classification, ClassificationId,
};
pub use country::{CodeConvention, Country, CountryCode, CountryCodes};
pub use dataset::ReferenceDataset;
pub use lookup::{LookupResult, RateOption, SYNTHETIC_SOURCE_REF};
pub use rate::{select_current, Basis, Rate, RateId, RateKind};
