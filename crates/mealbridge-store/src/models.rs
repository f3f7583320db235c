//! Record structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` so it can be handed directly to the HTTP
//! layer; identities and coordinates use the shared newtypes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mealbridge_shared::{ClaimOutcome, Coordinate, DonationId, DonationState, Role, UserId};

// ---------------------------------------------------------------------------
// Donation
// ---------------------------------------------------------------------------

/// A posted food donation.
///
/// Everything except `state`, `claimed_by` and `claimed_at` is written once
/// at creation and read-only afterwards. The pairing invariant holds at all
/// times: `claimed_by` and `claimed_at` are set iff `state` is `Claimed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Donation {
    /// Unique donation identifier.
    pub id: DonationId,
    /// The donor who posted it. A reference, not ownership.
    pub donor_id: UserId,
    /// Short listing title, e.g. "Jollof rice, 40 portions".
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Quantity in kilograms, positive.
    pub quantity_kg: f64,
    /// Food class, e.g. "Cooked", "Baked Goods", "Raw".
    pub food_type: String,
    /// Pickup position in WGS84 decimal degrees.
    pub coordinate: Coordinate,
    /// When the donation was created.
    pub created_at: DateTime<Utc>,
    /// Instant after which an unclaimed donation auto-expires. Fixed at
    /// creation, never mutated.
    pub freshness_deadline: DateTime<Utc>,
    /// Current lifecycle state.
    pub state: DonationState,
    /// Winning rescuer, set iff `state` is `Claimed`.
    pub claimed_by: Option<UserId>,
    /// When the winning claim committed, set iff `claimed_by` is set.
    pub claimed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered organization. The core treats users as reference targets;
/// credentials are opaque and handled by the upstream auth layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// Unique user identifier.
    pub id: UserId,
    /// Organization display name.
    pub display_name: String,
    /// Whether this account posts (donor) or claims (rescuer) food.
    pub role: Role,
    /// Opaque credential hash supplied by the auth layer. Never inspected.
    pub credential_hash: Option<String>,
    /// Accounts must be verified before posting or claiming.
    pub verified: bool,
    /// Optional home position, used as the default query origin.
    pub location: Option<Coordinate>,
    /// When the account was registered.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Claim attempt (audit trail)
// ---------------------------------------------------------------------------

/// One resolved claim attempt, appended for dispute resolution.
///
/// Only attempts that reached resolution on an existing donation are
/// recorded; self-claim rejections never produce a row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClaimAttempt {
    /// Monotonic row id, preserves attempt order per donation.
    pub seq: i64,
    /// The contested donation.
    pub donation_id: DonationId,
    /// The rescuer who attempted the claim.
    pub rescuer_id: UserId,
    /// How the attempt resolved.
    pub outcome: ClaimOutcome,
    /// When the attempt resolved.
    pub attempted_at: DateTime<Utc>,
}
