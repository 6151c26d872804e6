//! Real-time ride events delivered to subscribers.

use crate::models::{DriverContact, Location, Ride, RideStatus};
use serde::{Deserialize, Serialize};

/// Event pushed over the notification channel.
///
/// Serialized with a `type` tag, e.g.
/// `{"type":"ride_status_updated","ride_id":7,"status":"arrived"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RideEvent {
    /// A rider is looking for a driver.
    NewRideRequest {
        ride_id: i64,
        pickup: Location,
        destination: Location,
        fare: f64,
        distance_km: f64,
    },
    /// A driver claimed the ride.
    RideAccepted { ride_id: i64, driver: DriverContact },
    RideStatusUpdated { ride_id: i64, status: RideStatus },
}

impl RideEvent {
    pub fn new_request(ride: &Ride) -> Self {
        RideEvent::NewRideRequest {
            ride_id: ride.id,
            pickup: ride.pickup.clone(),
            destination: ride.destination.clone(),
            fare: ride.fare,
            distance_km: ride.distance_km,
        }
    }

    pub fn ride_id(&self) -> i64 {
        match self {
            RideEvent::NewRideRequest { ride_id, .. }
            | RideEvent::RideAccepted { ride_id, .. }
            | RideEvent::RideStatusUpdated { ride_id, .. } => *ride_id,
        }
    }
}
