use thiserror::Error;

/// Rejections raised when validating a donation payload at the boundary.
/// Invalid payloads are never persisted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("latitude {0} is outside -90..=90")]
    InvalidLatitude(f64),

    #[error("longitude {0} is outside -180..=180")]
    InvalidLongitude(f64),

    #[error("title must not be empty")]
    EmptyTitle,

    #[error("quantity must be a positive number of kilograms, got {0}")]
    NonPositiveQuantity(f64),

    #[error("freshness window would place the deadline in the past")]
    DeadlineInPast,

    #[error("freshness window of {0} minutes exceeds the maximum of one year")]
    FreshnessTooLong(i64),
}
