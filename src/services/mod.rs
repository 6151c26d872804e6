// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod notifier;
pub mod rides;

pub use notifier::{Notifier, Topic};
pub use rides::RideLifecycleManager;
