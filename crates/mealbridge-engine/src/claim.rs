//! Claim contention resolution.
//!
//! Any number of rescuers may race for the same donation; exactly one wins.
//! The winner is decided by the store's conditional Open -> Claimed update,
//! which is the linearization point. The per-donation keyed lock in front of
//! it only serializes redundant attempts so that losers resolve with one
//! cheap read instead of a failed write; correctness never depends on it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use mealbridge_shared::{ClaimOutcome, DonationId, DonationState, UserId};

use crate::error::{EngineError, Result};
use crate::store::DonationStore;

/// Serializes competing claim attempts per donation id.
pub struct ClaimCoordinator {
    store: Arc<DonationStore>,
    locks: Mutex<HashMap<DonationId, Arc<Mutex<()>>>>,
}

impl ClaimCoordinator {
    pub fn new(store: Arc<DonationStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Attempt to claim `donation_id` for `rescuer_id`.
    ///
    /// Self-claims are rejected before any serialization; unknown ids
    /// resolve to [`ClaimOutcome::NotFound`]. Every other attempt reaches
    /// the per-donation critical section and resolves to exactly one of
    /// `Won`, `Lost` or `AlreadyTerminal`, with an audit row appended.
    ///
    /// Resolution runs on a detached task: once the conditional update is
    /// issued the outcome commits even if the caller has disconnected.
    pub async fn claim(&self, donation_id: DonationId, rescuer_id: UserId) -> Result<ClaimOutcome> {
        let donation = match self.store.get(donation_id).await {
            Ok(d) => d,
            Err(EngineError::NotFound) => return Ok(ClaimOutcome::NotFound),
            Err(e) => return Err(e),
        };

        if donation.donor_id == rescuer_id {
            return Err(EngineError::OwnDonation);
        }

        let lock = self.lock_entry(donation_id).await;
        let store = Arc::clone(&self.store);
        let handle = tokio::spawn(async move {
            let _guard = lock.lock().await;
            resolve(&store, donation_id, rescuer_id).await
        });

        let outcome = handle.await.map_err(|e| EngineError::Task(e.to_string()))??;

        // Won, Lost and AlreadyTerminal all mean the donation is terminal
        // now, so its lock entry will never be contended again.
        if outcome != ClaimOutcome::NotFound {
            self.locks.lock().await.remove(&donation_id);
        }

        Ok(outcome)
    }

    async fn lock_entry(&self, donation_id: DonationId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(donation_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// The critical section: one read, at most one conditional write.
async fn resolve(
    store: &DonationStore,
    donation_id: DonationId,
    rescuer_id: UserId,
) -> Result<ClaimOutcome> {
    let donation = match store.get(donation_id).await {
        Ok(d) => d,
        Err(EngineError::NotFound) => return Ok(ClaimOutcome::NotFound),
        Err(e) => return Err(e),
    };

    let outcome = match donation.state {
        DonationState::Open => {
            let now = Utc::now();
            match store
                .transition(
                    donation_id,
                    DonationState::Open,
                    DonationState::Claimed,
                    Some(rescuer_id),
                    Some(now),
                )
                .await
            {
                Ok(()) => ClaimOutcome::Won,
                // The reaper or a cancel can still slip in between the read
                // and the write; the precondition settles it either way.
                Err(EngineError::Stale {
                    actual: DonationState::Claimed,
                }) => ClaimOutcome::Lost,
                Err(EngineError::Stale { .. }) => ClaimOutcome::AlreadyTerminal,
                Err(e) => return Err(e),
            }
        }
        DonationState::Claimed => ClaimOutcome::Lost,
        DonationState::Expired | DonationState::Cancelled => ClaimOutcome::AlreadyTerminal,
    };

    // The audit row is best-effort: losing it is a logging problem, not a
    // reason to fail a resolved claim.
    if let Err(e) = store
        .record_attempt(donation_id, rescuer_id, outcome, Utc::now())
        .await
    {
        warn!(donation = %donation_id, error = %e, "failed to record claim attempt");
    }

    match outcome {
        ClaimOutcome::Won => {
            info!(donation = %donation_id, rescuer = %rescuer_id, "claim won")
        }
        _ => debug!(
            donation = %donation_id,
            rescuer = %rescuer_id,
            outcome = outcome.as_str(),
            "claim resolved"
        ),
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{sample_new, test_store};
    use futures::future::join_all;

    #[tokio::test]
    async fn single_claim_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let coordinator = ClaimCoordinator::new(Arc::clone(&store));

        let donation = store.create(sample_new(UserId::new(), 60)).await.unwrap();
        let rescuer = UserId::new();

        let outcome = coordinator.claim(donation.id, rescuer).await.unwrap();
        assert_eq!(outcome, ClaimOutcome::Won);

        let loaded = store.get(donation.id).await.unwrap();
        assert_eq!(loaded.state, DonationState::Claimed);
        assert_eq!(loaded.claimed_by, Some(rescuer));
        assert!(loaded.claimed_at.is_some());
    }

    #[tokio::test]
    async fn contended_claim_has_exactly_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let coordinator = Arc::new(ClaimCoordinator::new(Arc::clone(&store)));

        let donation = store.create(sample_new(UserId::new(), 60)).await.unwrap();

        let rescuers: Vec<UserId> = (0..16).map(|_| UserId::new()).collect();
        let attempts = rescuers.iter().map(|rescuer| {
            let coordinator = Arc::clone(&coordinator);
            let rescuer = *rescuer;
            async move { (rescuer, coordinator.claim(donation.id, rescuer).await.unwrap()) }
        });

        let results = join_all(attempts).await;

        let winners: Vec<UserId> = results
            .iter()
            .filter(|(_, o)| *o == ClaimOutcome::Won)
            .map(|(r, _)| *r)
            .collect();
        let losses = results
            .iter()
            .filter(|(_, o)| *o == ClaimOutcome::Lost)
            .count();

        assert_eq!(winners.len(), 1);
        assert_eq!(losses, 15);

        let loaded = store.get(donation.id).await.unwrap();
        assert_eq!(loaded.claimed_by, Some(winners[0]));
    }

    #[tokio::test]
    async fn claims_on_different_donations_do_not_contend() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let coordinator = Arc::new(ClaimCoordinator::new(Arc::clone(&store)));

        let a = store.create(sample_new(UserId::new(), 60)).await.unwrap();
        let b = store.create(sample_new(UserId::new(), 60)).await.unwrap();

        let (ra, rb) = (UserId::new(), UserId::new());
        let (oa, ob) = tokio::join!(coordinator.claim(a.id, ra), coordinator.claim(b.id, rb));
        assert_eq!(oa.unwrap(), ClaimOutcome::Won);
        assert_eq!(ob.unwrap(), ClaimOutcome::Won);
    }

    #[tokio::test]
    async fn unknown_donation_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let coordinator = ClaimCoordinator::new(Arc::clone(&store));

        let outcome = coordinator
            .claim(DonationId::new(), UserId::new())
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::NotFound);
    }

    #[tokio::test]
    async fn self_claim_rejected_before_any_state_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let coordinator = ClaimCoordinator::new(Arc::clone(&store));

        let donor = UserId::new();
        let donation = store.create(sample_new(donor, 60)).await.unwrap();

        assert!(matches!(
            coordinator.claim(donation.id, donor).await,
            Err(EngineError::OwnDonation)
        ));

        // Nothing moved and nothing was audited.
        let loaded = store.get(donation.id).await.unwrap();
        assert_eq!(loaded.state, DonationState::Open);
        assert!(store.claim_attempts(donation.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn claim_on_cancelled_is_already_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let coordinator = ClaimCoordinator::new(Arc::clone(&store));

        let donor = UserId::new();
        let donation = store.create(sample_new(donor, 60)).await.unwrap();
        store.cancel(donation.id, donor).await.unwrap();

        let outcome = coordinator
            .claim(donation.id, UserId::new())
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::AlreadyTerminal);
    }

    #[tokio::test]
    async fn late_claim_after_win_is_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let coordinator = ClaimCoordinator::new(Arc::clone(&store));

        let donation = store.create(sample_new(UserId::new(), 60)).await.unwrap();

        let winner = UserId::new();
        let late = UserId::new();
        assert_eq!(
            coordinator.claim(donation.id, winner).await.unwrap(),
            ClaimOutcome::Won
        );
        assert_eq!(
            coordinator.claim(donation.id, late).await.unwrap(),
            ClaimOutcome::Lost
        );

        // The first winner keeps the donation.
        let loaded = store.get(donation.id).await.unwrap();
        assert_eq!(loaded.claimed_by, Some(winner));
    }

    #[tokio::test]
    async fn audit_trail_records_winner_and_losers() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let coordinator = ClaimCoordinator::new(Arc::clone(&store));

        let donation = store.create(sample_new(UserId::new(), 60)).await.unwrap();
        let winner = UserId::new();
        let loser = UserId::new();

        coordinator.claim(donation.id, winner).await.unwrap();
        coordinator.claim(donation.id, loser).await.unwrap();

        let attempts = store.claim_attempts(donation.id).await.unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].rescuer_id, winner);
        assert_eq!(attempts[0].outcome, ClaimOutcome::Won);
        assert_eq!(attempts[1].rescuer_id, loser);
        assert_eq!(attempts[1].outcome, ClaimOutcome::Lost);
    }

    #[tokio::test]
    async fn claimed_donation_leaves_the_spatial_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let coordinator = ClaimCoordinator::new(Arc::clone(&store));

        let donation = store.create(sample_new(UserId::new(), 60)).await.unwrap();
        assert!(store.spatial().contains(donation.id));

        coordinator.claim(donation.id, UserId::new()).await.unwrap();

        assert!(!store.spatial().contains(donation.id));
        let anywhere = store.spatial().nearest(Some(donation.coordinate), 100, None);
        assert!(anywhere.iter().all(|(id, _)| *id != donation.id));
    }

    #[tokio::test]
    async fn lock_entries_are_dropped_after_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let coordinator = ClaimCoordinator::new(Arc::clone(&store));

        let donation = store.create(sample_new(UserId::new(), 60)).await.unwrap();
        coordinator.claim(donation.id, UserId::new()).await.unwrap();
        coordinator.claim(donation.id, UserId::new()).await.unwrap();

        assert!(coordinator.locks.lock().await.is_empty());
    }
}
