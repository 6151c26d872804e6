// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ride lifecycle: request, accept, status changes and rating.
//!
//! Every operation follows the same sequence: validate the input against the
//! current ride, apply a conditional update in the store, then notify the
//! parties. Notification is fire-and-forget and never fails the operation.

use crate::db::rides::RatingWrite;
use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::{calculate_fare, DriverContact, NewRide, Ride, RideEvent, RideStatus};
use crate::services::notifier::{Notifier, Topic};
use chrono::Utc;
use validator::Validate;

/// Longest feedback text accepted with a rating.
pub const MAX_FEEDBACK_LEN: usize = 500;

/// Enforces the ride state machine and fans out status notifications.
#[derive(Clone)]
pub struct RideLifecycleManager {
    db: Db,
    notifier: Notifier,
}

impl RideLifecycleManager {
    pub fn new(db: Db, notifier: Notifier) -> Self {
        Self { db, notifier }
    }

    /// Create a ride in state `requested` and announce it to drivers.
    pub async fn request_ride(&self, rider_id: i64, new_ride: NewRide) -> Result<Ride> {
        new_ride.validate()?;

        let fare = calculate_fare(new_ride.distance)
            .ok_or_else(|| AppError::Validation("distance: Invalid distance".to_string()))?;
        let ride = self
            .db
            .insert_ride(rider_id, &new_ride, fare, Utc::now())
            .await?;

        tracing::info!(
            ride_id = ride.id,
            rider_id,
            fare = ride.fare,
            distance_km = ride.distance_km,
            "Ride requested"
        );

        self.notify(&Topic::AvailableDrivers, RideEvent::new_request(&ride));
        Ok(ride)
    }

    /// Claim a `requested` ride for `driver_id`.
    ///
    /// Exactly one of several concurrent callers succeeds; the rest get
    /// `NotFound`, the same as for a ride that does not exist.
    pub async fn accept_ride(&self, ride_id: i64, driver_id: i64) -> Result<Ride> {
        if let Some(ride) = self.db.get_ride(ride_id).await? {
            if ride.rider_id == driver_id {
                return Err(AppError::Forbidden(
                    "Drivers cannot accept their own ride request".to_string(),
                ));
            }
        }

        if !self.db.claim_ride(ride_id, driver_id, Utc::now()).await? {
            tracing::debug!(ride_id, driver_id, "Accept lost: ride missing or already taken");
            return Err(AppError::NotFound(format!(
                "Ride {} not found or already accepted",
                ride_id
            )));
        }

        let ride = self.load(ride_id).await?;
        tracing::info!(ride_id, driver_id, rider_id = ride.rider_id, "Ride accepted");

        match self.driver_contact(driver_id).await {
            Ok(driver) => {
                self.notify(
                    &Topic::Rider(ride.rider_id),
                    RideEvent::RideAccepted { ride_id, driver },
                );
            }
            Err(e) => {
                tracing::warn!(ride_id, driver_id, error = %e, "Skipping accept notification: driver details unavailable");
            }
        }

        Ok(ride)
    }

    /// Advance a ride's status on behalf of its requester or driver.
    pub async fn update_status(
        &self,
        ride_id: i64,
        actor_id: i64,
        new_status: RideStatus,
    ) -> Result<Ride> {
        let ride = self.load(ride_id).await?;

        if !ride.is_party(actor_id) {
            return Err(AppError::Forbidden(format!(
                "User {} is not a party to ride {}",
                actor_id, ride_id
            )));
        }

        // `accepted` is only reachable through accept_ride, which assigns the driver.
        if new_status == RideStatus::Accepted || !ride.status.can_transition_to(new_status) {
            return Err(AppError::InvalidTransition {
                from: ride.status,
                to: new_status,
            });
        }

        let applied = self
            .db
            .transition_ride(ride_id, ride.rider_id, ride.status, new_status, Utc::now())
            .await?;
        if !applied {
            // Someone else moved the ride first; report against what it is now.
            let current = self.load(ride_id).await?;
            return Err(AppError::InvalidTransition {
                from: current.status,
                to: new_status,
            });
        }

        let ride = self.load(ride_id).await?;
        tracing::info!(
            ride_id,
            actor_id,
            status = %new_status,
            "Ride status updated"
        );

        let event = RideEvent::RideStatusUpdated {
            ride_id,
            status: new_status,
        };
        self.notify(&Topic::Rider(ride.rider_id), event.clone());
        if let Some(driver_id) = ride.driver_id {
            self.notify(&Topic::Driver(driver_id), event);
        }

        Ok(ride)
    }

    /// Rate a completed ride once, refreshing the driver's average rating.
    pub async fn rate_ride(
        &self,
        ride_id: i64,
        rider_id: i64,
        rating: i64,
        feedback: Option<String>,
    ) -> Result<Ride> {
        let rating = u8::try_from(rating)
            .ok()
            .filter(|r| (1..=5).contains(r))
            .ok_or_else(|| AppError::Validation("Rating must be between 1 and 5".to_string()))?;

        let feedback = feedback
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        if feedback
            .as_ref()
            .is_some_and(|f| f.chars().count() > MAX_FEEDBACK_LEN)
        {
            return Err(AppError::Validation("Feedback too long".to_string()));
        }

        let ride = self.load(ride_id).await?;
        if ride.rider_id != rider_id {
            return Err(AppError::Forbidden(
                "Only the rider can rate this ride".to_string(),
            ));
        }
        if ride.status != RideStatus::Completed {
            return Err(AppError::NotFound(format!(
                "Ride {} is {} and cannot be rated",
                ride_id, ride.status
            )));
        }
        if ride.rating.is_some() {
            return Err(AppError::AlreadyRated);
        }

        match self
            .db
            .record_rating(ride_id, rider_id, rating, feedback.as_deref(), Utc::now())
            .await?
        {
            RatingWrite::AlreadyRated => Err(AppError::AlreadyRated),
            RatingWrite::Applied { driver_rating } => {
                tracing::info!(
                    ride_id,
                    rating,
                    driver_id = ?ride.driver_id,
                    driver_rating = ?driver_rating,
                    "Ride rated"
                );
                self.load(ride_id).await
            }
        }
    }

    /// Fetch a ride visible to `viewer_id` (party to the ride, or any ride when `is_admin`).
    pub async fn get_ride_for(&self, ride_id: i64, viewer_id: i64, is_admin: bool) -> Result<Ride> {
        let ride = self.load(ride_id).await?;
        if !is_admin && !ride.is_party(viewer_id) {
            return Err(AppError::Forbidden(format!(
                "User {} is not a party to ride {}",
                viewer_id, ride_id
            )));
        }
        Ok(ride)
    }

    async fn load(&self, ride_id: i64) -> Result<Ride> {
        self.db
            .get_ride(ride_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ride {} not found", ride_id)))
    }

    async fn driver_contact(&self, driver_id: i64) -> Result<DriverContact> {
        let user = self
            .db
            .get_user(driver_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Driver {} not found", driver_id)))?;
        let profile = self.db.get_driver_profile(driver_id).await?;
        Ok(DriverContact::new(&user, profile.as_ref()))
    }

    fn notify(&self, topic: &Topic, event: RideEvent) {
        let ride_id = event.ride_id();
        let delivered = self.notifier.publish(topic, event);
        tracing::debug!(ride_id, topic = %topic, delivered, "Notification dispatched");
    }
}
