// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users: profile and ride lifecycle.

use super::{clamp_per_page, total_pages, DEFAULT_PER_PAGE};
use crate::db::{page_offset, RideFilter, RideParty};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{DriverProfile, NewRide, ProfileUpdate, Ride, RideStatus, Role, User};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me).put(update_me))
        .route("/api/rides", post(request_ride).get(list_rides))
        .route("/api/rides/{ride_id}", get(get_ride))
        .route("/api/rides/{ride_id}/accept", post(accept_ride))
        .route("/api/rides/{ride_id}/status", put(update_status))
        .route("/api/rides/{ride_id}/rate", post(rate_ride))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub role: Role,
    pub rating: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_rides: i64,
    #[cfg_attr(feature = "binding-generation", ts(skip))]
    pub driver: Option<DriverProfile>,
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state
        .db
        .get_user(user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    Ok(Json(user_response(&state, profile).await?))
}

/// Update the current user's name or phone.
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<UserResponse>> {
    body.validate()?;

    let profile = state
        .db
        .update_profile(user.user_id, &body, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;
    tracing::info!(user_id = user.user_id, "Profile updated");

    Ok(Json(user_response(&state, profile).await?))
}

async fn user_response(state: &AppState, profile: User) -> Result<UserResponse> {
    let driver = if profile.role == Role::Driver {
        state.db.get_driver_profile(profile.id).await?
    } else {
        None
    };

    Ok(UserResponse {
        id: profile.id,
        email: profile.email,
        first_name: profile.first_name,
        last_name: profile.last_name,
        phone: profile.phone,
        role: profile.role,
        rating: profile.rating,
        total_rides: profile.total_rides,
        driver,
    })
}

// ─── Ride Lifecycle ──────────────────────────────────────────

/// Request a ride as the current user.
async fn request_ride(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<NewRide>,
) -> Result<(StatusCode, Json<Ride>)> {
    let ride = state.rides.request_ride(user.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(ride)))
}

/// Accept a waiting ride (drivers only).
async fn accept_ride(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<i64>,
) -> Result<Json<Ride>> {
    user.require_role(Role::Driver)?;
    let ride = state.rides.accept_ride(ride_id, user.user_id).await?;
    Ok(Json(ride))
}

#[derive(Deserialize)]
struct UpdateStatusBody {
    status: String,
}

/// Move a ride to its next status (rider or assigned driver).
async fn update_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<i64>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<Ride>> {
    let status = parse_status(&body.status)?;
    let ride = state
        .rides
        .update_status(ride_id, user.user_id, status)
        .await?;
    Ok(Json(ride))
}

#[derive(Deserialize)]
struct RateBody {
    rating: i64,
    #[serde(default)]
    feedback: Option<String>,
}

/// Rate a completed ride (rider only, once).
async fn rate_ride(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<i64>,
    Json(body): Json<RateBody>,
) -> Result<Json<Ride>> {
    let ride = state
        .rides
        .rate_ride(ride_id, user.user_id, body.rating, body.feedback)
        .await?;
    Ok(Json(ride))
}

/// Get a single ride the caller is party to.
async fn get_ride(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<i64>,
) -> Result<Json<Ride>> {
    let ride = state
        .rides
        .get_ride_for(ride_id, user.user_id, user.is_admin())
        .await?;
    Ok(Json(ride))
}

// ─── Ride History ────────────────────────────────────────────

/// Which side of the caller's rides to list.
#[derive(Deserialize, Default, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
enum RideView {
    #[default]
    Rider,
    Driver,
}

#[derive(Deserialize)]
struct RidesQuery {
    /// List rides taken as a rider (default) or driven as a driver
    #[serde(rename = "as", default)]
    view: RideView,
    /// Filter by ride status
    status: Option<String>,
    /// Pagination: page number (1-indexed)
    #[serde(default = "default_page")]
    page: u32,
    /// Pagination: items per page
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_page() -> u32 {
    1
}
fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RidesResponse {
    pub rides: Vec<Ride>,
    pub page: u32,
    pub per_page: u32,
    /// Total number of rides matching the query.
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_pages: i64,
}

/// List the caller's rides, newest first.
async fn list_rides(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<RidesQuery>,
) -> Result<Json<RidesResponse>> {
    tracing::debug!(
        user_id = user.user_id,
        view = ?params.view,
        status = ?params.status,
        page = params.page,
        "Fetching rides"
    );

    let party = match params.view {
        RideView::Rider => RideParty::Rider(user.user_id),
        RideView::Driver => {
            user.require_role(Role::Driver)?;
            RideParty::Driver(user.user_id)
        }
    };

    let response = list_page(
        &state,
        Some(party),
        params.status.as_deref(),
        params.page,
        params.per_page,
    )
    .await?;
    Ok(Json(response))
}

/// Shared listing logic for user and admin ride queries.
pub(crate) async fn list_page(
    state: &AppState,
    party: Option<RideParty>,
    status: Option<&str>,
    page: u32,
    per_page: u32,
) -> Result<RidesResponse> {
    let per_page = clamp_per_page(per_page);
    let status = status.map(parse_status).transpose()?;
    let offset = page_offset(page, per_page)?;

    let (rides, total) = state
        .db
        .list_rides(&RideFilter {
            party,
            status,
            limit: i64::from(per_page),
            offset,
        })
        .await?;

    Ok(RidesResponse {
        rides,
        page,
        per_page,
        total,
        total_pages: total_pages(total, per_page),
    })
}

fn parse_status(raw: &str) -> Result<RideStatus> {
    raw.trim()
        .to_lowercase()
        .parse()
        .map_err(|e: crate::models::ride::UnknownStatus| AppError::Validation(e.to_string()))
}
