// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Ride-Lifecycle: ride-hailing backend
//!
//! This crate provides the API for requesting rides, moving them through
//! their lifecycle, rating drivers, and pushing live ride events to riders
//! and drivers.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Db;
use services::{Notifier, RideLifecycleManager};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub notifier: Notifier,
    pub rides: RideLifecycleManager,
}

impl AppState {
    /// Wire the lifecycle manager to a shared notifier.
    pub fn new(config: Config, db: Db) -> Self {
        let notifier = Notifier::new(config.notify_channel_capacity);
        let rides = RideLifecycleManager::new(db.clone(), notifier.clone());
        Self {
            config,
            db,
            notifier,
            rides,
        }
    }
}
