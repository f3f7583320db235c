use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique donation identifier (UUID v4), assigned at creation and immutable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DonationId(pub Uuid);

impl DonationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DonationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DonationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique user identifier (UUID v4). Users hold the donor and/or rescuer
/// capability; the id itself carries no role information.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Capability a registered organization holds on the platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Posts surplus food (restaurant, caterer, grocer).
    Donor,
    /// Claims and picks up posted food (NGO, food bank).
    Rescuer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Donor => "donor",
            Role::Rescuer => "rescuer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "donor" => Some(Role::Donor),
            "rescuer" => Some(Role::Rescuer),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Donation state machine
// ---------------------------------------------------------------------------

/// Lifecycle state of a donation.
///
/// `Open` is the only non-terminal state; the legal transitions are
/// Open -> Claimed, Open -> Expired, and Open -> Cancelled. Every transition
/// is conditional on the persisted state still being `Open`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DonationState {
    /// Available for claiming.
    Open,
    /// Assigned to exactly one rescuer.
    Claimed,
    /// Passed its freshness deadline unclaimed.
    Expired,
    /// Withdrawn by the donor.
    Cancelled,
}

impl DonationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationState::Open => "open",
            DonationState::Claimed => "claimed",
            DonationState::Expired => "expired",
            DonationState::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(DonationState::Open),
            "claimed" => Some(DonationState::Claimed),
            "expired" => Some(DonationState::Expired),
            "cancelled" => Some(DonationState::Cancelled),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DonationState::Open)
    }
}

impl std::fmt::Display for DonationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Claim outcomes
// ---------------------------------------------------------------------------

/// Resolution of a claim attempt. "Somebody else got it" is an outcome, not
/// an error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClaimOutcome {
    /// This rescuer now holds the donation.
    Won,
    /// Another rescuer's claim committed first.
    Lost,
    /// No donation with that id exists.
    NotFound,
    /// The donation expired or was cancelled before the attempt resolved.
    AlreadyTerminal,
}

impl ClaimOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimOutcome::Won => "won",
            ClaimOutcome::Lost => "lost",
            ClaimOutcome::NotFound => "not_found",
            ClaimOutcome::AlreadyTerminal => "already_terminal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "won" => Some(ClaimOutcome::Won),
            "lost" => Some(ClaimOutcome::Lost),
            "not_found" => Some(ClaimOutcome::NotFound),
            "already_terminal" => Some(ClaimOutcome::AlreadyTerminal),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    /// Degrees north, -90 to 90.
    pub lat: f64,
    /// Degrees east, -180 to 180.
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check the position is a real point on the globe.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(ValidationError::InvalidLatitude(self.lat));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(ValidationError::InvalidLongitude(self.lng));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trip() {
        for state in [
            DonationState::Open,
            DonationState::Claimed,
            DonationState::Expired,
            DonationState::Cancelled,
        ] {
            assert_eq!(DonationState::parse(state.as_str()), Some(state));
        }
        assert_eq!(DonationState::parse("available"), None);
    }

    #[test]
    fn only_open_is_non_terminal() {
        assert!(!DonationState::Open.is_terminal());
        assert!(DonationState::Claimed.is_terminal());
        assert!(DonationState::Expired.is_terminal());
        assert!(DonationState::Cancelled.is_terminal());
    }

    #[test]
    fn coordinate_bounds() {
        assert!(Coordinate::new(6.1, 3.3).validate().is_ok());
        assert!(Coordinate::new(-90.0, 180.0).validate().is_ok());
        assert!(Coordinate::new(90.5, 0.0).validate().is_err());
        assert!(Coordinate::new(0.0, -180.1).validate().is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).validate().is_err());
    }

    #[test]
    fn outcome_wire_names() {
        assert_eq!(ClaimOutcome::AlreadyTerminal.as_str(), "already_terminal");
        assert_eq!(ClaimOutcome::parse("won"), Some(ClaimOutcome::Won));
        assert_eq!(ClaimOutcome::parse("draw"), None);
    }
}
