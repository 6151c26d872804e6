// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin API tests: role gate, dashboard, account management, audit trail.

use chrono::Utc;
use ride_lifecycle::error::AppError;
use ride_lifecycle::models::{NewUser, Role};
use serde_json::json;
use tower::ServiceExt;

use axum::http::StatusCode;

mod common;

use common::{
    authed_request, body_json, create_admin, create_driver, create_rider, create_test_app,
    create_test_jwt, sample_ride,
};

#[tokio::test]
async fn test_non_admin_is_forbidden() {
    let (app, state) = create_test_app().await;
    let driver = create_driver(&state, "driver@example.com").await;
    let token = create_test_jwt(driver.id, &state.config.jwt_signing_key);

    let response = app
        .oneshot(authed_request("GET", "/api/admin/stats", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_stats() {
    let (app, state) = create_test_app().await;
    let admin = create_admin(&state).await;
    let rider = create_rider(&state, "rider@example.com").await;
    let driver = create_driver(&state, "driver@example.com").await;

    let done = state.rides.request_ride(rider.id, sample_ride()).await.unwrap();
    state.rides.accept_ride(done.id, driver.id).await.unwrap();
    for status in ["arrived", "started", "completed"] {
        state
            .rides
            .update_status(done.id, driver.id, status.parse().unwrap())
            .await
            .unwrap();
    }
    state.rides.request_ride(rider.id, sample_ride()).await.unwrap();

    let token = create_test_jwt(admin.id, &state.config.jwt_signing_key);
    let response = app
        .oneshot(authed_request("GET", "/api/admin/stats", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total_riders"], 1);
    assert_eq!(body["total_drivers"], 1);
    assert_eq!(body["total_rides"], 2);
    assert_eq!(body["active_rides"], 1);
    assert_eq!(body["total_revenue"], 8.74);
    assert_eq!(body["today_rides"], 2);
}

#[tokio::test]
async fn test_admin_sees_all_rides() {
    let (app, state) = create_test_app().await;
    let admin = create_admin(&state).await;
    let first = create_rider(&state, "first@example.com").await;
    let second = create_rider(&state, "second@example.com").await;
    let ride = state.rides.request_ride(first.id, sample_ride()).await.unwrap();
    state.rides.request_ride(second.id, sample_ride()).await.unwrap();
    let token = create_test_jwt(admin.id, &state.config.jwt_signing_key);

    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/admin/rides", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 2);

    // Admins may view any single ride
    let response = app
        .oneshot(authed_request(
            "GET",
            &format!("/api/rides/{}", ride.id),
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_driver_and_audit_log() {
    let (app, state) = create_test_app().await;
    let admin = create_admin(&state).await;
    let token = create_test_jwt(admin.id, &state.config.jwt_signing_key);

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/admin/users",
            &token,
            Some(json!({
                "email": "New.Driver@Example.com",
                "first_name": "Dana",
                "last_name": "Lee",
                "phone": "555-0199",
                "role": "driver",
                "driver": {
                    "license_number": "D7654321",
                    "vehicle_model": "Model 3",
                    "vehicle_plate": "7XYZ987",
                    "vehicle_color": "White",
                    "vehicle_year": 2022
                }
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["email"], "new.driver@example.com");
    assert_eq!(body["role"], "driver");
    let user_id = body["id"].as_i64().unwrap();

    let profile = state.db.get_driver_profile(user_id).await.unwrap().unwrap();
    assert_eq!(profile.vehicle_plate, "7XYZ987");
    assert!(!profile.documents_verified);

    let response = app
        .clone()
        .oneshot(authed_request(
            "PUT",
            &format!("/api/admin/drivers/{}/verify", user_id),
            &token,
            Some(json!({ "verified": true })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let profile = state.db.get_driver_profile(user_id).await.unwrap().unwrap();
    assert!(profile.documents_verified);

    let response = app
        .oneshot(authed_request("GET", "/api/admin/logs", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 2);
    let logs = body["logs"].as_array().unwrap();
    assert!(logs.iter().all(|l| l["target_user_id"] == user_id));
    assert!(logs.iter().any(|l| l["action"] == "DRIVER_VERIFICATION"));
    assert!(logs.iter().any(|l| l["action"] == "USER_CREATED"));
}

#[tokio::test]
async fn test_create_user_profile_rules() {
    let (app, state) = create_test_app().await;
    let admin = create_admin(&state).await;
    let token = create_test_jwt(admin.id, &state.config.jwt_signing_key);

    // Driver without vehicle details
    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/admin/users",
            &token,
            Some(json!({
                "email": "driver@example.com",
                "first_name": "Dana",
                "last_name": "Lee",
                "role": "driver"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Bad email
    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/admin/users",
            &token,
            Some(json!({
                "email": "not-an-email",
                "first_name": "Sam",
                "last_name": "Ng",
                "role": "rider"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Duplicate email
    create_rider(&state, "taken@example.com").await;
    let response = app
        .oneshot(authed_request(
            "POST",
            "/api/admin/users",
            &token,
            Some(json!({
                "email": "taken@example.com",
                "first_name": "Sam",
                "last_name": "Ng",
                "role": "rider"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deactivate_user() {
    let (app, state) = create_test_app().await;
    let admin = create_admin(&state).await;
    let rider = create_rider(&state, "rider@example.com").await;
    let admin_token = create_test_jwt(admin.id, &state.config.jwt_signing_key);
    let rider_token = create_test_jwt(rider.id, &state.config.jwt_signing_key);

    let response = app
        .clone()
        .oneshot(authed_request(
            "PUT",
            &format!("/api/admin/users/{}/active", rider.id),
            &admin_token,
            Some(json!({ "active": false })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Takes effect on the next request
    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/me", &rider_token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(authed_request(
            "PUT",
            &format!("/api/admin/users/{}/active", admin.id),
            &admin_token,
            Some(json!({ "active": false })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(authed_request(
            "PUT",
            "/api/admin/users/999/active",
            &admin_token,
            Some(json!({ "active": true })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_users_filters_and_joins_vehicle() {
    let (app, state) = create_test_app().await;
    let admin = create_admin(&state).await;
    let rider = create_rider(&state, "alice@example.com").await;
    create_rider(&state, "bob@example.com").await;
    let driver = create_driver(&state, "carol@example.com").await;
    let token = create_test_jwt(admin.id, &state.config.jwt_signing_key);

    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/admin/users", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 4);
    // Newest first
    assert_eq!(body["users"][0]["id"], driver.id);
    assert_eq!(body["users"][0]["vehicle_plate"], "8ABC123");
    assert_eq!(body["users"][0]["documents_verified"], false);

    let response = app
        .clone()
        .oneshot(authed_request(
            "GET",
            "/api/admin/users?role=rider&per_page=1",
            &token,
            None,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["total_pages"], 2);
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["role"], "rider");
    assert!(users[0]["vehicle_plate"].is_null());
    assert!(users[0]["documents_verified"].is_null());

    // Search matches email case-insensitively
    let response = app
        .clone()
        .oneshot(authed_request(
            "GET",
            "/api/admin/users?search=ALICE",
            &token,
            None,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["users"][0]["id"], rider.id);

    // Wildcards in the search term are literal
    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/admin/users?search=%25", &token, None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["total"], 0);

    let response = app
        .oneshot(authed_request(
            "GET",
            "/api/admin/users?role=pilot",
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analytics() {
    let (app, state) = create_test_app().await;
    let admin = create_admin(&state).await;
    let rider = create_rider(&state, "rider@example.com").await;
    let driver = create_driver(&state, "driver@example.com").await;

    let done = state.rides.request_ride(rider.id, sample_ride()).await.unwrap();
    state.rides.accept_ride(done.id, driver.id).await.unwrap();
    for status in ["arrived", "started", "completed"] {
        state
            .rides
            .update_status(done.id, driver.id, status.parse().unwrap())
            .await
            .unwrap();
    }
    state.rides.rate_ride(done.id, rider.id, 4, None).await.unwrap();
    state.rides.request_ride(rider.id, sample_ride()).await.unwrap();

    let token = create_test_jwt(admin.id, &state.config.jwt_signing_key);
    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/admin/analytics", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let today = Utc::now().date_naive().to_string();

    assert_eq!(body["period"], "7days");
    assert_eq!(
        body["rides_by_status"],
        json!([
            { "status": "completed", "count": 1 },
            { "status": "requested", "count": 1 }
        ])
    );
    assert_eq!(body["daily_rides"], json!([{ "date": today, "count": 2 }]));
    assert_eq!(body["daily_revenue"], json!([{ "date": today, "revenue": 8.74 }]));
    assert_eq!(body["top_drivers"][0]["driver_id"], driver.id);
    assert_eq!(body["top_drivers"][0]["ride_count"], 1);
    assert_eq!(body["top_drivers"][0]["avg_rating"], 4.0);

    let response = app
        .clone()
        .oneshot(authed_request(
            "GET",
            "/api/admin/analytics?period=24hours",
            &token,
            None,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["period"], "24hours");
    assert_eq!(body["daily_rides"][0]["count"], 2);

    let response = app
        .oneshot(authed_request(
            "GET",
            "/api/admin/analytics?period=1year",
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_audit_write_rolls_back_change() {
    let (_, state) = create_test_app().await;
    let rider = create_rider(&state, "rider@example.com").await;
    let driver = create_driver(&state, "driver@example.com").await;
    // No such admin, so the audit insert violates its foreign key
    let ghost_admin = 9999;
    let now = Utc::now();

    let result = state.db.set_user_active(ghost_admin, rider.id, false, now).await;
    assert!(matches!(result, Err(AppError::Database(_))));
    assert!(state.db.get_user(rider.id).await.unwrap().unwrap().is_active);

    let result = state
        .db
        .set_driver_verified(ghost_admin, driver.id, true, now)
        .await;
    assert!(result.is_err());
    let profile = state.db.get_driver_profile(driver.id).await.unwrap().unwrap();
    assert!(!profile.documents_verified);

    let new_user = NewUser {
        email: "orphan@example.com".to_string(),
        first_name: "Orphan".to_string(),
        last_name: "User".to_string(),
        phone: None,
        role: Role::Rider,
        driver: None,
    };
    let result = state.db.create_user_as_admin(ghost_admin, &new_user, now).await;
    assert!(result.is_err());
    assert!(state
        .db
        .find_user_by_email("orphan@example.com")
        .await
        .unwrap()
        .is_none());

    let (logs, total) = state.db.list_admin_logs(50, 0).await.unwrap();
    assert!(logs.is_empty());
    assert_eq!(total, 0);
}
