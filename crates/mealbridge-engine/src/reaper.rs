//! Background expiry sweep.
//!
//! Stale open donations stop being claimable by transitioning to Expired
//! through the same conditional primitive claims use, so a reaper cycle
//! racing a claim resolves cleanly: whichever write commits first wins and
//! the other side observes a stale precondition. Cycles hold no state, so
//! running zero or several reapers at once is safe.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};

use mealbridge_shared::DonationState;

use crate::error::{EngineError, Result};
use crate::store::DonationStore;

/// Periodic Open -> Expired sweep over the durable store.
pub struct ExpiryReaper {
    store: Arc<DonationStore>,
    interval: Duration,
}

impl ExpiryReaper {
    pub fn new(store: Arc<DonationStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run one sweep and return how many donations this cycle expired.
    ///
    /// Donations snatched by a claim (or cancel) between the scan and the
    /// transition are skipped silently; that race is the expected case, not
    /// a failure.
    pub async fn run_cycle(&self) -> Result<usize> {
        let now = Utc::now();
        let candidates = self.store.expired_candidates(now).await?;

        let mut expired = 0usize;
        for id in candidates {
            match self
                .store
                .transition(id, DonationState::Open, DonationState::Expired, None, None)
                .await
            {
                Ok(()) => {
                    debug!(id = %id, "donation expired");
                    expired += 1;
                }
                Err(EngineError::Stale { .. }) | Err(EngineError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }

        if expired > 0 {
            info!(count = expired, "expired stale donations");
        }
        Ok(expired)
    }

    /// Run cycles forever on the configured interval. Cycle errors are
    /// logged and the loop keeps going.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_cycle().await {
                    error!(error = %e, "expiry cycle failed");
                }
            }
        })
    }
}
