//! Donation ownership and the state machine.
//!
//! [`DonationStore`] is the single owner of donation mutation. Everything
//! else sees donations through it: the claim coordinator and the reaper
//! funnel their transitions through [`DonationStore::transition`], and the
//! spatial projection is updated inside the same call, so no reader can find
//! a donation that is both spatially discoverable and non-open.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use mealbridge_shared::{
    ClaimOutcome, Coordinate, DonationId, DonationState, UserId, ValidationError,
};
use mealbridge_store::{ClaimAttempt, Database, Donation};

use crate::error::Result;
use crate::spatial::SpatialIndex;

/// A validated donation payload. Construction is unchecked; call
/// [`NewDonation::validate`] at the boundary before handing it to the store.
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub donor_id: UserId,
    pub title: String,
    pub description: String,
    pub quantity_kg: f64,
    pub food_type: String,
    pub coordinate: Coordinate,
    /// Minutes until the donation auto-expires. Zero is allowed and means
    /// "expire on the next reaper cycle"; negative values are rejected.
    pub freshness_minutes: i64,
}

/// Perishable food does not keep for more than a year; this also keeps the
/// deadline arithmetic comfortably inside chrono's range.
const MAX_FRESHNESS_MINUTES: i64 = 60 * 24 * 365;

impl NewDonation {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if !self.quantity_kg.is_finite() || self.quantity_kg <= 0.0 {
            return Err(ValidationError::NonPositiveQuantity(self.quantity_kg));
        }
        self.coordinate.validate()?;
        if self.freshness_minutes < 0 {
            return Err(ValidationError::DeadlineInPast);
        }
        if self.freshness_minutes > MAX_FRESHNESS_MINUTES {
            return Err(ValidationError::FreshnessTooLong(self.freshness_minutes));
        }
        Ok(())
    }
}

/// Persistent record of donations, the state machine, and the spatial
/// projection kept consistent with it.
pub struct DonationStore {
    db: Arc<Mutex<Database>>,
    spatial: Arc<SpatialIndex>,
}

impl DonationStore {
    /// Wire the store to an open database and rebuild the spatial index by
    /// replaying every open donation.
    pub async fn open(db: Arc<Mutex<Database>>, spatial: Arc<SpatialIndex>) -> Result<Self> {
        let store = Self { db, spatial };

        let open = store.db.lock().await.open_donations()?;
        for donation in &open {
            store.spatial.insert(donation.id, donation.coordinate);
        }
        info!(indexed = open.len(), "rebuilt spatial index from open donations");

        Ok(store)
    }

    /// Validate, persist (state = open) and index a new donation.
    pub async fn create(&self, new: NewDonation) -> Result<Donation> {
        new.validate()?;

        let now = Utc::now();
        let donation = Donation {
            id: DonationId::new(),
            donor_id: new.donor_id,
            title: new.title,
            description: new.description,
            quantity_kg: new.quantity_kg,
            food_type: new.food_type,
            coordinate: new.coordinate,
            created_at: now,
            freshness_deadline: now + Duration::minutes(new.freshness_minutes),
            state: DonationState::Open,
            claimed_by: None,
            claimed_at: None,
        };

        self.db.lock().await.insert_donation(&donation)?;
        self.spatial.insert(donation.id, donation.coordinate);

        debug!(id = %donation.id, donor = %donation.donor_id, "donation created");
        Ok(donation)
    }

    /// The spatial projection this store keeps consistent.
    pub fn spatial(&self) -> &Arc<SpatialIndex> {
        &self.spatial
    }

    /// Fetch a donation by id.
    pub async fn get(&self, id: DonationId) -> Result<Donation> {
        Ok(self.db.lock().await.get_donation(id)?)
    }

    /// Open donations, newest first.
    pub async fn list_open(&self, limit: u32) -> Result<Vec<Donation>> {
        Ok(self.db.lock().await.list_open_donations(limit)?)
    }

    /// Open donations whose freshness deadline has passed.
    pub async fn expired_candidates(&self, now: DateTime<Utc>) -> Result<Vec<DonationId>> {
        Ok(self.db.lock().await.expired_candidates(now)?)
    }

    /// Donor-initiated Open -> Cancelled. Fails with
    /// [`EngineError::NotOwner`](crate::EngineError::NotOwner) for anyone but
    /// the posting donor and with `Stale` once the donation left open.
    pub async fn cancel(&self, id: DonationId, caller: UserId) -> Result<()> {
        let donation = self.get(id).await?;
        if donation.donor_id != caller {
            return Err(crate::EngineError::NotOwner);
        }

        self.transition(id, DonationState::Open, DonationState::Cancelled, None, None)
            .await?;
        info!(id = %id, "donation cancelled by donor");
        Ok(())
    }

    /// The conditional transition. Applies `expected -> next` atomically
    /// against the durable store; on success the spatial entry is removed
    /// before this method returns, keeping the projection consistent.
    pub(crate) async fn transition(
        &self,
        id: DonationId,
        expected: DonationState,
        next: DonationState,
        claimed_by: Option<UserId>,
        claimed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.db
            .lock()
            .await
            .transition_donation(id, expected, next, claimed_by, claimed_at)?;

        if next.is_terminal() {
            self.spatial.remove(id);
        }
        Ok(())
    }

    /// Append a resolved claim attempt to the audit trail.
    pub(crate) async fn record_attempt(
        &self,
        donation_id: DonationId,
        rescuer_id: UserId,
        outcome: ClaimOutcome,
        attempted_at: DateTime<Utc>,
    ) -> Result<()> {
        self.db
            .lock()
            .await
            .record_claim_attempt(donation_id, rescuer_id, outcome, attempted_at)?;
        Ok(())
    }

    /// Audit trail for a donation, in resolution order.
    pub async fn claim_attempts(&self, donation_id: DonationId) -> Result<Vec<ClaimAttempt>> {
        Ok(self.db.lock().await.claim_attempts_for(donation_id)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::EngineError;

    pub(crate) async fn test_store(dir: &tempfile::TempDir) -> Arc<DonationStore> {
        let db = Database::open_at(&dir.path().join("engine.db")).unwrap();
        let db = Arc::new(Mutex::new(db));
        let spatial = Arc::new(SpatialIndex::new());
        Arc::new(DonationStore::open(db, spatial).await.unwrap())
    }

    pub(crate) fn sample_new(donor: UserId, freshness_minutes: i64) -> NewDonation {
        NewDonation {
            donor_id: donor,
            title: "Day-old bread".into(),
            description: "Two crates of loaves".into(),
            quantity_kg: 8.0,
            food_type: "Baked Goods".into(),
            coordinate: Coordinate::new(6.1, 3.3),
            freshness_minutes,
        }
    }

    #[test]
    fn validation_rejects_bad_payloads() {
        let donor = UserId::new();

        let mut bad = sample_new(donor, 60);
        bad.title = "   ".into();
        assert_eq!(bad.validate(), Err(ValidationError::EmptyTitle));

        let mut bad = sample_new(donor, 60);
        bad.quantity_kg = 0.0;
        assert!(matches!(
            bad.validate(),
            Err(ValidationError::NonPositiveQuantity(_))
        ));

        let mut bad = sample_new(donor, 60);
        bad.coordinate = Coordinate::new(91.0, 0.0);
        assert!(matches!(
            bad.validate(),
            Err(ValidationError::InvalidLatitude(_))
        ));

        let mut bad = sample_new(donor, 60);
        bad.freshness_minutes = -1;
        assert_eq!(bad.validate(), Err(ValidationError::DeadlineInPast));

        let mut bad = sample_new(donor, 60);
        bad.freshness_minutes = i64::MAX;
        assert!(matches!(
            bad.validate(),
            Err(ValidationError::FreshnessTooLong(_))
        ));

        // Zero freshness is legal: expire on the next reaper cycle.
        assert!(sample_new(donor, 0).validate().is_ok());
    }

    #[tokio::test]
    async fn create_persists_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        let donation = store.create(sample_new(UserId::new(), 60)).await.unwrap();

        let loaded = store.get(donation.id).await.unwrap();
        assert_eq!(loaded.state, DonationState::Open);
        assert_eq!(loaded.claimed_by, None);
    }

    #[tokio::test]
    async fn create_rejects_invalid_without_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        let mut bad = sample_new(UserId::new(), 60);
        bad.quantity_kg = -2.0;
        assert!(matches!(
            store.create(bad).await,
            Err(EngineError::Validation(_))
        ));
        assert!(store.list_open(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_requires_owner() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        let donor = UserId::new();
        let donation = store.create(sample_new(donor, 60)).await.unwrap();

        assert!(matches!(
            store.cancel(donation.id, UserId::new()).await,
            Err(EngineError::NotOwner)
        ));
        assert_eq!(
            store.get(donation.id).await.unwrap().state,
            DonationState::Open
        );

        store.cancel(donation.id, donor).await.unwrap();
        assert_eq!(
            store.get(donation.id).await.unwrap().state,
            DonationState::Cancelled
        );
    }

    #[tokio::test]
    async fn cancel_after_terminal_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        let donor = UserId::new();
        let donation = store.create(sample_new(donor, 60)).await.unwrap();
        store.cancel(donation.id, donor).await.unwrap();

        match store.cancel(donation.id, donor).await {
            Err(EngineError::Stale { actual }) => assert_eq!(actual, DonationState::Cancelled),
            other => panic!("expected Stale, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn spatial_rebuild_indexes_open_rows_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rebuild.db");

        let donor = UserId::new();
        let (open_id, cancelled_id) = {
            let db = Arc::new(Mutex::new(Database::open_at(&path).unwrap()));
            let spatial = Arc::new(SpatialIndex::new());
            let store = DonationStore::open(db, spatial).await.unwrap();

            let open = store.create(sample_new(donor, 60)).await.unwrap();
            let cancelled = store.create(sample_new(donor, 60)).await.unwrap();
            store.cancel(cancelled.id, donor).await.unwrap();
            (open.id, cancelled.id)
        };

        // Fresh process: index rebuilt from the durable store.
        let db = Arc::new(Mutex::new(Database::open_at(&path).unwrap()));
        let spatial = Arc::new(SpatialIndex::new());
        let _store = DonationStore::open(db, Arc::clone(&spatial)).await.unwrap();

        assert!(spatial.contains(open_id));
        assert!(!spatial.contains(cancelled_id));
    }
}
