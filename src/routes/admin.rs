// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes: dashboard, ride oversight and account management.
//!
//! The admin role check is applied in routes/mod.rs.

use super::api::{list_page, RidesResponse};
use super::{clamp_per_page, total_pages};
use crate::db::{page_offset, Analytics, AnalyticsPeriod, DashboardStats, UserFilter};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{AdminLog, NewUser, Role, User, UserListing};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/stats", get(get_stats))
        .route("/api/admin/analytics", get(get_analytics))
        .route("/api/admin/rides", get(list_all_rides))
        .route("/api/admin/users", get(list_users).post(create_user))
        .route("/api/admin/users/{user_id}/active", put(set_user_active))
        .route("/api/admin/drivers/{user_id}/verify", put(verify_driver))
        .route("/api/admin/logs", get(list_logs))
}

/// Dashboard aggregates.
async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<DashboardStats>> {
    let today_start = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
    Ok(Json(state.db.dashboard_stats(today_start).await?))
}

#[derive(Deserialize)]
struct AnalyticsQuery {
    period: Option<String>,
}

#[derive(Serialize)]
struct AnalyticsResponse {
    period: AnalyticsPeriod,
    since: DateTime<Utc>,
    #[serde(flatten)]
    analytics: Analytics,
}

/// Ride activity over the last day, week, month or quarter.
async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsResponse>> {
    let period = match params.period.as_deref() {
        Some(p) => p.parse::<AnalyticsPeriod>()?,
        None => AnalyticsPeriod::default(),
    };
    let since = period.since(Utc::now());
    let analytics = state.db.analytics(since).await?;

    Ok(Json(AnalyticsResponse {
        period,
        since,
        analytics,
    }))
}

#[derive(Deserialize)]
struct AdminRidesQuery {
    status: Option<String>,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_page() -> u32 {
    1
}
fn default_per_page() -> u32 {
    super::DEFAULT_PER_PAGE
}

/// All rides, newest first.
async fn list_all_rides(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminRidesQuery>,
) -> Result<Json<RidesResponse>> {
    let response = list_page(
        &state,
        None,
        params.status.as_deref(),
        params.page,
        params.per_page,
    )
    .await?;
    Ok(Json(response))
}

#[derive(Deserialize)]
struct UsersQuery {
    role: Option<String>,
    search: Option<String>,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_per_page")]
    per_page: u32,
}

#[derive(Serialize)]
struct UsersResponse {
    users: Vec<UserListing>,
    page: u32,
    per_page: u32,
    total: i64,
    total_pages: i64,
}

/// All accounts newest first, optionally by role or name/email substring.
async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UsersQuery>,
) -> Result<Json<UsersResponse>> {
    let role = params
        .role
        .as_deref()
        .map(|r| r.parse::<Role>().map_err(AppError::Validation))
        .transpose()?;
    let search = params
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let per_page = clamp_per_page(params.per_page);
    let offset = page_offset(params.page, per_page)?;
    let filter = UserFilter {
        role,
        search,
        limit: i64::from(per_page),
        offset,
    };
    let (users, total) = state.db.list_users(&filter).await?;

    Ok(Json(UsersResponse {
        users,
        page: params.page,
        per_page,
        total,
        total_pages: total_pages(total, per_page),
    }))
}

/// Provision a rider, driver or admin account.
async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Json(body): Json<NewUser>,
) -> Result<(StatusCode, Json<User>)> {
    body.validate()?;
    match (body.role, body.driver.is_some()) {
        (Role::Driver, false) => {
            return Err(AppError::Validation(
                "Driver accounts need a driver profile".to_string(),
            ))
        }
        (Role::Rider | Role::Admin, true) => {
            return Err(AppError::Validation(
                "Only driver accounts take a driver profile".to_string(),
            ))
        }
        _ => {}
    }

    let user = state
        .db
        .create_user_as_admin(admin.user_id, &body, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Deserialize)]
struct ActiveBody {
    active: bool,
}

#[derive(Serialize)]
struct ActiveResponse {
    user_id: i64,
    active: bool,
}

/// Activate or deactivate an account.
async fn set_user_active(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<i64>,
    Json(body): Json<ActiveBody>,
) -> Result<Json<ActiveResponse>> {
    if user_id == admin.user_id && !body.active {
        return Err(AppError::Validation(
            "Admins cannot deactivate themselves".to_string(),
        ));
    }

    if !state
        .db
        .set_user_active(admin.user_id, user_id, body.active, Utc::now())
        .await?
    {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    Ok(Json(ActiveResponse {
        user_id,
        active: body.active,
    }))
}

#[derive(Deserialize)]
struct VerifyBody {
    verified: bool,
}

#[derive(Serialize)]
struct VerifyResponse {
    user_id: i64,
    verified: bool,
}

/// Mark a driver's documents as verified.
async fn verify_driver(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<i64>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<VerifyResponse>> {
    if !state
        .db
        .set_driver_verified(admin.user_id, user_id, body.verified, Utc::now())
        .await?
    {
        return Err(AppError::NotFound(format!("Driver {} not found", user_id)));
    }

    Ok(Json(VerifyResponse {
        user_id,
        verified: body.verified,
    }))
}

#[derive(Deserialize)]
struct LogsQuery {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_logs_per_page")]
    per_page: u32,
}

fn default_logs_per_page() -> u32 {
    50
}

#[derive(Serialize)]
struct LogsResponse {
    logs: Vec<AdminLog>,
    page: u32,
    per_page: u32,
    total: i64,
    total_pages: i64,
}

/// Admin audit trail, newest first.
async fn list_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogsQuery>,
) -> Result<Json<LogsResponse>> {
    let per_page = clamp_per_page(params.per_page);
    let offset = page_offset(params.page, per_page)?;
    let (logs, total) = state
        .db
        .list_admin_logs(i64::from(per_page), offset)
        .await?;

    Ok(Json(LogsResponse {
        logs,
        page: params.page,
        per_page,
        total,
        total_pages: total_pages(total, per_page),
    }))
}
