use thiserror::Error;

use mealbridge_shared::{DonationState, ValidationError};
use mealbridge_store::StoreError;

/// Errors produced by the engine.
///
/// Expected race results are not errors: "already claimed" is a
/// [`ClaimOutcome`](mealbridge_shared::ClaimOutcome) value. [`Stale`]
/// surfaces only where the caller initiated the transition itself (e.g. a
/// donor cancelling a donation that just got claimed).
///
/// [`Stale`]: EngineError::Stale
#[derive(Error, Debug)]
pub enum EngineError {
    /// Unknown donation or user id.
    #[error("Record not found")]
    NotFound,

    /// A transition's precondition failed: the donation already left the
    /// expected state.
    #[error("Donation is already {actual}")]
    Stale { actual: DonationState },

    /// Payload rejected at the boundary; nothing was persisted.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A rescuer attempted to claim a donation they posted themselves.
    #[error("Rescuers cannot claim their own donation")]
    OwnDonation,

    /// A cancel attempt by someone other than the posting donor.
    #[error("Only the posting donor may cancel a donation")]
    NotOwner,

    /// The durable store failed for a reason other than a missing record or
    /// a stale precondition.
    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),

    /// The detached claim-resolution task died before reporting an outcome.
    #[error("Claim resolution task failed: {0}")]
    Task(String),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => EngineError::NotFound,
            StoreError::StaleState { actual } => EngineError::Stale { actual },
            other => EngineError::Storage(other),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
