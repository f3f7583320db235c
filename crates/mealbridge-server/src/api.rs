use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use mealbridge_engine::{
    ClaimCoordinator, DonationStore, DonationView, EngineError, NewDonation, NewUser,
    QueryService, UserDirectory,
};
use mealbridge_shared::{ClaimOutcome, Coordinate, DonationId, Role, UserId};
use mealbridge_store::{ClaimAttempt, User};

use crate::auth::{AuthUser, MaybeUser};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::throttle::ClaimThrottle;

#[derive(Clone)]
pub struct AppState {
    pub donations: Arc<DonationStore>,
    pub users: Arc<UserDirectory>,
    pub claims: Arc<ClaimCoordinator>,
    pub query: Arc<QueryService>,
    pub throttle: ClaimThrottle,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/users", post(register_user))
        .route("/api/donations", post(create_donation).get(list_donations))
        .route(
            "/api/donations/:id",
            get(get_donation).delete(cancel_donation),
        )
        .route("/api/donations/:id/audit", get(donation_audit))
        .route("/api/claim", post(claim_donation))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Request / response bodies ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    instance: String,
}

#[derive(Deserialize)]
struct RegisterRequest {
    display_name: String,
    role: Role,
    /// Opaque credential hash from the auth layer; stored, never inspected.
    credential_hash: Option<String>,
    /// The provisioning layer is trusted, so it decides verification.
    #[serde(default = "default_verified")]
    verified: bool,
    lat: Option<f64>,
    lng: Option<f64>,
}

fn default_verified() -> bool {
    true
}

#[derive(Serialize)]
struct RegisterResponse {
    user_id: UserId,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct CreateDonationRequest {
    title: String,
    description: String,
    quantity_kg: f64,
    food_type: String,
    lat: f64,
    lng: f64,
    freshness_minutes: i64,
}

#[derive(Serialize)]
struct CreateDonationResponse {
    donation_id: DonationId,
    created_at: DateTime<Utc>,
    freshness_deadline: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ListQuery {
    lat: Option<f64>,
    lng: Option<f64>,
    radius_m: Option<f64>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct ListDonationsResponse {
    donations: Vec<DonationView>,
}

#[derive(Deserialize)]
struct PointQuery {
    lat: Option<f64>,
    lng: Option<f64>,
}

#[derive(Deserialize)]
struct ClaimRequest {
    donation_id: DonationId,
}

#[derive(Serialize)]
struct ClaimResponse {
    result: ClaimOutcome,
}

#[derive(Serialize)]
struct AuditResponse {
    attempts: Vec<ClaimAttempt>,
}

// ─── Handlers ───

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        instance: state.config.instance_name.clone(),
    })
}

async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ServerError> {
    if req.display_name.trim().is_empty() {
        return Err(ServerError::BadRequest(
            "display_name must not be empty".to_string(),
        ));
    }

    let location = origin_from_params(req.lat, req.lng)?;
    let user = state
        .users
        .register(NewUser {
            display_name: req.display_name,
            role: req.role,
            credential_hash: req.credential_hash,
            verified: req.verified,
            location,
        })
        .await?;

    info!(id = %user.id, role = user.role.as_str(), "user registered via API");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            created_at: user.created_at,
        }),
    ))
}

async fn create_donation(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateDonationRequest>,
) -> Result<(StatusCode, Json<CreateDonationResponse>), ServerError> {
    let user = lookup_actor(&state, caller).await?;
    require_verified(&user)?;
    if user.role != Role::Donor {
        return Err(ServerError::Forbidden(
            "only donors can post donations".to_string(),
        ));
    }

    let donation = state
        .donations
        .create(NewDonation {
            donor_id: caller,
            title: req.title,
            description: req.description,
            quantity_kg: req.quantity_kg,
            food_type: req.food_type,
            coordinate: Coordinate::new(req.lat, req.lng),
            freshness_minutes: req.freshness_minutes,
        })
        .await?;

    info!(id = %donation.id, donor = %caller, "donation posted via API");

    Ok((
        StatusCode::CREATED,
        Json(CreateDonationResponse {
            donation_id: donation.id,
            created_at: donation.created_at,
            freshness_deadline: donation.freshness_deadline,
        }),
    ))
}

async fn list_donations(
    MaybeUser(requester): MaybeUser,
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<ListDonationsResponse>, ServerError> {
    let origin = origin_from_params(params.lat, params.lng)?;
    let limit = state.config.effective_limit(params.limit);

    let donations = state
        .query
        .list_near(origin, params.radius_m, limit, requester)
        .await?;

    Ok(Json(ListDonationsResponse { donations }))
}

async fn get_donation(
    MaybeUser(requester): MaybeUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<PointQuery>,
) -> Result<Json<DonationView>, ServerError> {
    let origin = origin_from_params(params.lat, params.lng)?;
    let view = state
        .query
        .donation_view(DonationId(id), origin, requester)
        .await?;
    Ok(Json(view))
}

async fn cancel_donation(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state.donations.cancel(DonationId(id), caller).await?;
    Ok(Json(serde_json::json!({ "cancelled": true })))
}

async fn donation_audit(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditResponse>, ServerError> {
    let donation = state.donations.get(DonationId(id)).await?;
    if donation.donor_id != caller {
        return Err(ServerError::Forbidden(
            "only the posting donor may read the claim audit trail".to_string(),
        ));
    }

    let attempts = state.donations.claim_attempts(donation.id).await?;
    Ok(Json(AuditResponse { attempts }))
}

async fn claim_donation(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ClaimRequest>,
) -> Result<Json<ClaimResponse>, ServerError> {
    let user = lookup_actor(&state, caller).await?;
    require_verified(&user)?;
    if user.role != Role::Rescuer {
        return Err(ServerError::Forbidden(
            "only rescuers can claim donations".to_string(),
        ));
    }

    if !state.throttle.check(caller).await {
        return Err(ServerError::RateLimited);
    }

    let result = state.claims.claim(req.donation_id, caller).await?;
    Ok(Json(ClaimResponse { result }))
}

// ─── Helpers ───

/// Resolve the authenticated id to a user record. The id comes from the
/// trusted auth layer, so an unknown id means a deprovisioned account, not a
/// bad login.
async fn lookup_actor(state: &AppState, id: UserId) -> Result<User, ServerError> {
    match state.users.get(id).await {
        Ok(user) => Ok(user),
        Err(EngineError::NotFound) => {
            Err(ServerError::Forbidden("unknown user id".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

fn require_verified(user: &User) -> Result<(), ServerError> {
    if !user.verified {
        return Err(ServerError::Forbidden(
            "account not verified".to_string(),
        ));
    }
    Ok(())
}

/// Latitude and longitude travel together or not at all.
fn origin_from_params(
    lat: Option<f64>,
    lng: Option<f64>,
) -> Result<Option<Coordinate>, ServerError> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Ok(Some(Coordinate::new(lat, lng))),
        (None, None) => Ok(None),
        _ => Err(ServerError::BadRequest(
            "lat and lng must be provided together".to_string(),
        )),
    }
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_requires_both_params() {
        assert!(origin_from_params(None, None).unwrap().is_none());
        assert!(origin_from_params(Some(6.1), Some(3.3)).unwrap().is_some());
        assert!(origin_from_params(Some(6.1), None).is_err());
        assert!(origin_from_params(None, Some(3.3)).is_err());
    }
}
