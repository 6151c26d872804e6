// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ride model, status state machine and fare calculation.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::{Validate, ValidationError};

/// Flat charge applied to every ride, in cents.
pub const BASE_FARE_CENTS: i64 = 250;
/// Charge per kilometre travelled, in cents.
pub const PER_KM_RATE_CENTS: i64 = 120;

/// Compute the fare for a trip, rounded half-up to cents.
///
/// The arithmetic is decimal on the distance as written, so 0.6375 km is
/// 3.265 before rounding and 3.27 after. Returns `None` for a distance with
/// no finite decimal form.
pub fn calculate_fare(distance_km: f64) -> Option<f64> {
    let distance = to_decimal(distance_km)?;
    let fare = Decimal::new(PER_KM_RATE_CENTS, 2)
        .checked_mul(distance)?
        .checked_add(Decimal::new(BASE_FARE_CENTS, 2))?;
    fare.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
}

/// Round half-up to `decimals` places on the shortest decimal form of `value`.
pub(crate) fn round_to(value: f64, decimals: u32) -> f64 {
    to_decimal(value)
        .map(|d| d.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// Shortest decimal that reads back as `value`.
fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string()).ok()
}

/// Lifecycle stage of a ride.
///
/// ```text
/// requested -> accepted -> arrived -> started -> completed
///     \            \           \          \
///      +------------+-----------+----------+--> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Requested,
    Accepted,
    Arrived,
    Started,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub const ALL: [RideStatus; 6] = [
        RideStatus::Requested,
        RideStatus::Accepted,
        RideStatus::Arrived,
        RideStatus::Started,
        RideStatus::Completed,
        RideStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RideStatus::Requested => "requested",
            RideStatus::Accepted => "accepted",
            RideStatus::Arrived => "arrived",
            RideStatus::Started => "started",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further status changes.
    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    /// Whether `next` is a permitted direct successor of `self`.
    pub fn can_transition_to(self, next: RideStatus) -> bool {
        use RideStatus::*;
        matches!(
            (self, next),
            (Requested, Accepted)
                | (Accepted, Arrived)
                | (Arrived, Started)
                | (Started, Completed)
                | (Requested | Accepted | Arrived | Started, Cancelled)
        )
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RideStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown ride status: {0}")]
pub struct UnknownStatus(pub String);

/// A pickup or drop-off point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

/// Stored ride record.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Ride {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    /// User who requested the ride
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub rider_id: i64,
    /// Driver who accepted it (None until accepted)
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub driver_id: Option<i64>,
    pub pickup: Location,
    pub destination: Location,
    pub distance_km: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub duration_minutes: Option<i64>,
    pub fare: f64,
    pub status: RideStatus,
    pub rating: Option<u8>,
    pub feedback: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    /// Whether `user_id` is the requester or the assigned driver.
    pub fn is_party(&self, user_id: i64) -> bool {
        self.rider_id == user_id || self.driver_id == Some(user_id)
    }
}

/// Input for a new ride request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewRide {
    #[validate(range(min = -90.0, max = 90.0, message = "Invalid pickup latitude"))]
    pub pickup_lat: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Invalid pickup longitude"))]
    pub pickup_lng: f64,
    #[validate(custom(function = "non_blank", message = "Pickup address is required"))]
    pub pickup_address: String,
    #[validate(range(min = -90.0, max = 90.0, message = "Invalid destination latitude"))]
    pub destination_lat: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Invalid destination longitude"))]
    pub destination_lng: f64,
    #[validate(custom(function = "non_blank", message = "Destination address is required"))]
    pub destination_address: String,
    /// Trip length in kilometres
    #[validate(range(min = 0.0, message = "Invalid distance"))]
    pub distance: f64,
    /// Estimated trip time in minutes
    #[validate(range(min = 0, message = "Invalid duration"))]
    pub duration: Option<i64>,
}

pub(crate) fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}
