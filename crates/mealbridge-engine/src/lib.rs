//! # mealbridge-engine
//!
//! The donation lifecycle and claim-contention core:
//!
//! - [`SpatialIndex`] -- in-memory projection of open donation positions,
//!   answering nearest-neighbor queries in meters
//! - [`DonationStore`] -- owns every donation mutation and enforces the
//!   state machine through a single conditional-transition primitive
//! - [`ClaimCoordinator`] -- serializes competing claims per donation id and
//!   resolves exactly one winner
//! - [`ExpiryReaper`] -- periodic sweep transitioning stale open donations
//!   to expired
//! - [`QueryService`] -- distance-ranked listings with a store-side state
//!   re-check at read time
//!
//! All components are plain structs wired together with `Arc` handles; there
//! is no ambient global state.

pub mod claim;
pub mod query;
pub mod reaper;
pub mod spatial;
pub mod store;
pub mod users;

mod error;

pub use claim::ClaimCoordinator;
pub use error::EngineError;
pub use query::{DonationView, QueryService};
pub use reaper::ExpiryReaper;
pub use spatial::SpatialIndex;
pub use store::{DonationStore, NewDonation};
pub use users::{NewUser, UserDirectory};
