// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use chrono::Utc;
use ride_lifecycle::config::Config;
use ride_lifecycle::db::Db;
use ride_lifecycle::middleware::auth::create_jwt;
use ride_lifecycle::models::{DriverProfile, NewRide, NewUser, Role, User};
use ride_lifecycle::routes::create_router;
use ride_lifecycle::AppState;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Create a test app backed by a fresh in-memory database.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub async fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = Db::open(&config.database_url)
        .await
        .expect("Failed to open in-memory database");
    let state = Arc::new(AppState::new(config, db));
    (create_router(state.clone()), state)
}

/// SQLite file under the system temp dir, removed with its WAL files on drop.
#[allow(dead_code)]
pub struct TempDbFile {
    path: PathBuf,
}

#[allow(dead_code)]
impl TempDbFile {
    pub fn new(tag: &str) -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let name = format!(
            "ride-lifecycle-{}-{}-{}.db",
            tag,
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        );
        Self {
            path: std::env::temp_dir().join(name),
        }
    }

    pub fn url(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }
}

impl Drop for TempDbFile {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = self.path.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Shared state over a file-backed pool, for tests that need real
/// concurrent connections.
#[allow(dead_code)]
pub async fn create_file_backed_state(file: &TempDbFile) -> Arc<AppState> {
    let config = Config {
        database_url: file.url(),
        ..Config::test_default()
    };
    let db = Db::open(&config.database_url)
        .await
        .expect("Failed to open file database");
    Arc::new(AppState::new(config, db))
}

#[allow(dead_code)]
pub async fn create_rider(state: &AppState, email: &str) -> User {
    create_user(state, email, Role::Rider, None).await
}

#[allow(dead_code)]
pub async fn create_driver(state: &AppState, email: &str) -> User {
    let profile = DriverProfile {
        user_id: 0,
        license_number: "D1234567".to_string(),
        vehicle_model: "Prius".to_string(),
        vehicle_plate: "8ABC123".to_string(),
        vehicle_color: "Silver".to_string(),
        vehicle_year: 2019,
        documents_verified: false,
    };
    create_user(state, email, Role::Driver, Some(profile)).await
}

#[allow(dead_code)]
pub async fn create_admin(state: &AppState) -> User {
    state
        .db
        .ensure_admin(&state.config.admin_email, Utc::now())
        .await
        .expect("Failed to create admin")
}

async fn create_user(
    state: &AppState,
    email: &str,
    role: Role,
    driver: Option<DriverProfile>,
) -> User {
    let new_user = NewUser {
        email: email.to_string(),
        first_name: "Test".to_string(),
        last_name: role.as_str().to_string(),
        phone: Some("555-0100".to_string()),
        role,
        driver,
    };
    state
        .db
        .create_user(&new_user, Utc::now())
        .await
        .expect("Failed to create user")
}

/// Ride request used across tests: 5.2 km, fare 8.74.
#[allow(dead_code)]
pub fn sample_ride() -> NewRide {
    NewRide {
        pickup_lat: 37.4419,
        pickup_lng: -122.143,
        pickup_address: "100 University Ave".to_string(),
        destination_lat: 37.4275,
        destination_lng: -122.1697,
        destination_address: "450 Serra Mall".to_string(),
        distance: 5.2,
        duration: Some(14),
    }
}

/// Create a test JWT token.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: i64, signing_key: &[u8]) -> String {
    create_jwt(user_id, signing_key).expect("Failed to create JWT")
}

/// Build an authenticated request, with a JSON body when given.
#[allow(dead_code)]
pub fn authed_request(
    method: &str,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
