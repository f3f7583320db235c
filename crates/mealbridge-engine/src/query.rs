//! Read-side composition of the spatial index and the durable store.
//!
//! The index ranks; the store decides. Every candidate's state is re-checked
//! against the store at read time, so a listing never contains a donation
//! known to be non-open at the moment the filter ran. A donation may still
//! be claimed between listing and a follow-up claim attempt; that surfaces
//! as a `Lost` outcome there, not here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use mealbridge_shared::{geo, Coordinate, DonationId, DonationState, UserId};
use mealbridge_store::Donation;

use crate::error::{EngineError, Result};
use crate::spatial::SpatialIndex;
use crate::store::DonationStore;

/// What a rescuer sees in a listing.
#[derive(Debug, Clone, Serialize)]
pub struct DonationView {
    pub id: DonationId,
    pub title: String,
    pub description: String,
    pub quantity_kg: f64,
    pub food_type: String,
    pub state: DonationState,
    pub coordinate: Coordinate,
    pub created_at: DateTime<Utc>,
    pub freshness_deadline: DateTime<Utc>,
    /// Distance from the query origin in meters; absent for unranked
    /// listings.
    pub distance_m: Option<f64>,
    /// Whether the requesting user could attempt a claim: open, and not
    /// their own posting. Always false for anonymous requests.
    pub claimable: bool,
}

impl DonationView {
    fn build(donation: &Donation, distance_m: Option<f64>, requester: Option<UserId>) -> Self {
        let claimable = donation.state == DonationState::Open
            && requester.is_some_and(|r| r != donation.donor_id);

        Self {
            id: donation.id,
            title: donation.title.clone(),
            description: donation.description.clone(),
            quantity_kg: donation.quantity_kg,
            food_type: donation.food_type.clone(),
            state: donation.state,
            coordinate: donation.coordinate,
            created_at: donation.created_at,
            freshness_deadline: donation.freshness_deadline,
            distance_m,
            claimable,
        }
    }
}

/// Answers "what can I rescue near me?".
pub struct QueryService {
    store: Arc<DonationStore>,
    spatial: Arc<SpatialIndex>,
}

impl QueryService {
    pub fn new(store: Arc<DonationStore>, spatial: Arc<SpatialIndex>) -> Self {
        Self { store, spatial }
    }

    /// List open donations. With an origin the result is ranked by distance
    /// (meters, closest first) and optionally cut off at `radius_m`; without
    /// one it is a plain newest-first listing.
    pub async fn list_near(
        &self,
        origin: Option<Coordinate>,
        radius_m: Option<f64>,
        limit: usize,
        requester: Option<UserId>,
    ) -> Result<Vec<DonationView>> {
        if let Some(origin) = &origin {
            origin.validate()?;
        }

        match origin {
            Some(origin) => {
                let ranked = self.spatial.nearest(Some(origin), limit, radius_m);
                let mut views = Vec::with_capacity(ranked.len());
                for (id, distance_m) in ranked {
                    // The index may trail the store by one in-flight
                    // transition; the store is the source of truth.
                    let donation = match self.store.get(id).await {
                        Ok(d) => d,
                        Err(EngineError::NotFound) => continue,
                        Err(e) => return Err(e),
                    };
                    if donation.state != DonationState::Open {
                        continue;
                    }
                    views.push(DonationView::build(&donation, distance_m, requester));
                }
                Ok(views)
            }
            None => {
                let open = self.store.list_open(limit as u32).await?;
                Ok(open
                    .iter()
                    .map(|d| DonationView::build(d, None, requester))
                    .collect())
            }
        }
    }

    /// Single-donation view, with distance when the caller shared a
    /// position. Unlike listings this returns terminal donations too, so a
    /// rescuer can see what happened to something they were watching.
    pub async fn donation_view(
        &self,
        id: DonationId,
        origin: Option<Coordinate>,
        requester: Option<UserId>,
    ) -> Result<DonationView> {
        if let Some(origin) = &origin {
            origin.validate()?;
        }

        let donation = self.store.get(id).await?;
        let distance_m = origin.map(|o| geo::distance_m(&o, &donation.coordinate));
        Ok(DonationView::build(&donation, distance_m, requester))
    }
}
