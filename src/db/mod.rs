// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (SQLite via sqlx).
//!
//! Provides typed operations for:
//! - Rides (lifecycle writes are conditional updates)
//! - Users and driver profiles
//! - Admin audit log and dashboard aggregates

pub mod rides;
pub mod schema;
pub mod users;

pub use rides::{Analytics, AnalyticsPeriod, DashboardStats, RideFilter, RideParty};
pub use users::UserFilter;

use crate::error::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

const MAX_CONNECTIONS: u32 = 16;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database handle. Cheap to clone (shares the pool).
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Connect to the database at `url`, creating the file if needed.
    ///
    /// `sqlite::memory:` yields a private in-memory database held by a
    /// single pooled connection.
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        let mut options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::Database(format!("Invalid DATABASE_URL: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if in_memory {
            // Every connection to :memory: is a separate database, so keep exactly one alive.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database: {}", e)))?;

        tracing::info!(in_memory, "Connected to SQLite");

        Ok(Self { pool })
    }

    /// Create tables and indexes if they do not exist.
    pub async fn migrate(&self) -> Result<(), AppError> {
        for statement in schema::ALL {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!(statements = schema::ALL.len(), "Schema applied");
        Ok(())
    }

    /// Connect and apply the schema in one step.
    pub async fn open(url: &str) -> Result<Self, AppError> {
        let db = Self::connect(url).await?;
        db.migrate().await?;
        Ok(db)
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Offset for a 1-based page, or a validation error on overflow.
pub fn page_offset(page: u32, per_page: u32) -> Result<i64, AppError> {
    if page < 1 {
        return Err(AppError::Validation(
            "Page must be greater than 0".to_string(),
        ));
    }
    (i64::from(page) - 1)
        .checked_mul(i64::from(per_page))
        .ok_or_else(|| AppError::Validation("Page number causes overflow".to_string()))
}
