//! # mealbridge-store
//!
//! Durable storage for MealBridge, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for every persisted
//! record: donations, users, and the claim-attempt audit trail. Schema
//! migrations run on every open, guarded by `PRAGMA user_version`.
//!
//! The one operation with real semantics is
//! [`Database::transition_donation`]: a conditional update that only applies
//! while the persisted state still matches the caller's expectation. It is
//! the compare-and-swap primitive the claim engine and the expiry reaper
//! both serialize through.

pub mod audit;
pub mod database;
pub mod donations;
pub mod migrations;
pub mod models;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
