// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod event;
pub mod ride;
pub mod user;

pub use event::RideEvent;
pub use ride::{calculate_fare, Location, NewRide, Ride, RideStatus};
pub use user::{
    AdminLog, DriverContact, DriverProfile, NewUser, ProfileUpdate, Role, User, UserListing,
};
