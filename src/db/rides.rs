// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ride persistence.
//!
//! Every lifecycle write is a single conditional `UPDATE ... WHERE status = ?`
//! so two racing callers cannot both observe success.

use super::Db;
use crate::error::AppError;
use crate::models::ride::round_to;
use crate::models::{Location, NewRide, Ride, RideStatus};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const RIDE_COLUMNS: &str = "id, rider_id, driver_id, pickup_lat, pickup_lng, pickup_address, \
     destination_lat, destination_lng, destination_address, distance_km, duration_minutes, \
     fare, status, rating, feedback, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct RideRow {
    id: i64,
    rider_id: i64,
    driver_id: Option<i64>,
    pickup_lat: f64,
    pickup_lng: f64,
    pickup_address: String,
    destination_lat: f64,
    destination_lng: f64,
    destination_address: String,
    distance_km: f64,
    duration_minutes: Option<i64>,
    fare: f64,
    status: String,
    rating: Option<i64>,
    feedback: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RideRow> for Ride {
    type Error = AppError;

    fn try_from(row: RideRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<RideStatus>()
            .map_err(|e| AppError::Database(e.to_string()))?;
        let rating = row
            .rating
            .map(u8::try_from)
            .transpose()
            .map_err(|_| AppError::Database(format!("Ride {} has corrupt rating", row.id)))?;

        Ok(Ride {
            id: row.id,
            rider_id: row.rider_id,
            driver_id: row.driver_id,
            pickup: Location {
                lat: row.pickup_lat,
                lng: row.pickup_lng,
                address: row.pickup_address,
            },
            destination: Location {
                lat: row.destination_lat,
                lng: row.destination_lng,
                address: row.destination_address,
            },
            distance_km: row.distance_km,
            duration_minutes: row.duration_minutes,
            fare: row.fare,
            status,
            rating,
            feedback: row.feedback,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Which side of a ride a listing is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideParty {
    Rider(i64),
    Driver(i64),
}

/// Listing filter with limit/offset pagination.
#[derive(Debug, Clone)]
pub struct RideFilter {
    /// None lists every ride (admin)
    pub party: Option<RideParty>,
    pub status: Option<RideStatus>,
    pub limit: i64,
    pub offset: i64,
}

/// Outcome of a conditional rating write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingWrite {
    /// Rating stored; carries the driver's recomputed average, if any.
    Applied { driver_rating: Option<f64> },
    /// The ride already had a rating (or stopped being rateable).
    AlreadyRated,
}

/// Aggregates for the admin dashboard.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DashboardStats {
    pub total_riders: i64,
    pub total_drivers: i64,
    pub total_rides: i64,
    /// Rides not yet completed or cancelled
    pub active_rides: i64,
    /// Sum of fares over completed rides
    pub total_revenue: f64,
    pub today_rides: i64,
}

/// Window covered by the admin analytics report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum AnalyticsPeriod {
    /// Since midnight UTC today
    #[serde(rename = "24hours")]
    Today,
    #[default]
    #[serde(rename = "7days")]
    Week,
    #[serde(rename = "30days")]
    Month,
    #[serde(rename = "90days")]
    Quarter,
}

impl AnalyticsPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalyticsPeriod::Today => "24hours",
            AnalyticsPeriod::Week => "7days",
            AnalyticsPeriod::Month => "30days",
            AnalyticsPeriod::Quarter => "90days",
        }
    }

    /// Start of the window: midnight UTC on the day `now` falls in, less the
    /// period's days.
    pub fn since(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let days = match self {
            AnalyticsPeriod::Today => 0,
            AnalyticsPeriod::Week => 7,
            AnalyticsPeriod::Month => 30,
            AnalyticsPeriod::Quarter => 90,
        };
        now.date_naive().and_time(NaiveTime::MIN).and_utc() - Duration::days(days)
    }
}

impl fmt::Display for AnalyticsPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalyticsPeriod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24hours" => Ok(AnalyticsPeriod::Today),
            "7days" => Ok(AnalyticsPeriod::Week),
            "30days" => Ok(AnalyticsPeriod::Month),
            "90days" => Ok(AnalyticsPeriod::Quarter),
            other => Err(AppError::Validation(format!(
                "Unknown period '{}'; expected 24hours, 7days, 30days or 90days",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, sqlx::FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, sqlx::FromRow)]
pub struct DailyRides {
    /// UTC date, YYYY-MM-DD
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, sqlx::FromRow)]
pub struct DailyRevenue {
    pub date: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, sqlx::FromRow)]
pub struct TopDriver {
    pub driver_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub ride_count: i64,
    /// None until one of the counted rides is rated
    pub avg_rating: Option<f64>,
}

/// Ride activity over an [`AnalyticsPeriod`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Analytics {
    pub rides_by_status: Vec<StatusCount>,
    pub daily_rides: Vec<DailyRides>,
    /// Completed rides only
    pub daily_revenue: Vec<DailyRevenue>,
    /// Most completed rides first, at most ten
    pub top_drivers: Vec<TopDriver>,
}

const TOP_DRIVERS_LIMIT: i64 = 10;

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &RideFilter) {
    qb.push(" WHERE 1 = 1");
    match filter.party {
        Some(RideParty::Rider(id)) => {
            qb.push(" AND rider_id = ").push_bind(id);
        }
        Some(RideParty::Driver(id)) => {
            qb.push(" AND driver_id = ").push_bind(id);
        }
        None => {}
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

impl Db {
    // ─── Ride Operations ─────────────────────────────────────────

    /// Insert a new ride in state `requested`.
    pub async fn insert_ride(
        &self,
        rider_id: i64,
        new_ride: &NewRide,
        fare: f64,
        now: DateTime<Utc>,
    ) -> Result<Ride, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO rides (rider_id, pickup_lat, pickup_lng, pickup_address,
                destination_lat, destination_lng, destination_address,
                distance_km, duration_minutes, fare, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(rider_id)
        .bind(new_ride.pickup_lat)
        .bind(new_ride.pickup_lng)
        .bind(new_ride.pickup_address.trim())
        .bind(new_ride.destination_lat)
        .bind(new_ride.destination_lng)
        .bind(new_ride.destination_address.trim())
        .bind(new_ride.distance)
        .bind(new_ride.duration)
        .bind(fare)
        .bind(RideStatus::Requested.as_str())
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        let ride_id = result.last_insert_rowid();
        self.get_ride(ride_id)
            .await?
            .ok_or_else(|| AppError::Database(format!("Ride {} vanished after insert", ride_id)))
    }

    /// Get a ride by ID.
    pub async fn get_ride(&self, ride_id: i64) -> Result<Option<Ride>, AppError> {
        let sql = format!("SELECT {} FROM rides WHERE id = ?", RIDE_COLUMNS);
        sqlx::query_as::<_, RideRow>(&sql)
            .bind(ride_id)
            .fetch_optional(self.pool())
            .await?
            .map(Ride::try_from)
            .transpose()
    }

    /// Assign `driver_id` if and only if the ride is still `requested`.
    ///
    /// Returns false when no row matched (ride missing or already taken).
    pub async fn claim_ride(
        &self,
        ride_id: i64,
        driver_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE rides
            SET driver_id = ?, status = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(driver_id)
        .bind(RideStatus::Accepted.as_str())
        .bind(now)
        .bind(ride_id)
        .bind(RideStatus::Requested.as_str())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Move a ride from `from` to `to` if it is still in `from`.
    ///
    /// Completing a ride bumps the rider's `total_rides` in the same
    /// transaction. Returns false if the status changed underneath us.
    pub async fn transition_ride(
        &self,
        ride_id: i64,
        rider_id: i64,
        from: RideStatus,
        to: RideStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query("UPDATE rides SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(to.as_str())
            .bind(now)
            .bind(ride_id)
            .bind(from.as_str())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if to == RideStatus::Completed {
            sqlx::query(
                "UPDATE users SET total_rides = total_rides + 1, updated_at = ? WHERE id = ?",
            )
            .bind(now)
            .bind(rider_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Store a rating on a completed, unrated ride and refresh the driver's average.
    pub async fn record_rating(
        &self,
        ride_id: i64,
        rider_id: i64,
        rating: u8,
        feedback: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RatingWrite, AppError> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE rides
            SET rating = ?, feedback = ?, updated_at = ?
            WHERE id = ? AND rider_id = ? AND status = ? AND rating IS NULL
            "#,
        )
        .bind(i64::from(rating))
        .bind(feedback)
        .bind(now)
        .bind(ride_id)
        .bind(rider_id)
        .bind(RideStatus::Completed.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(RatingWrite::AlreadyRated);
        }

        let driver_id: Option<i64> =
            sqlx::query_scalar("SELECT driver_id FROM rides WHERE id = ?")
                .bind(ride_id)
                .fetch_one(&mut *tx)
                .await?;

        let mut driver_rating = None;
        if let Some(driver_id) = driver_id {
            let average: Option<f64> = sqlx::query_scalar(
                r#"
                SELECT AVG(rating) FROM rides
                WHERE driver_id = ? AND status = ? AND rating IS NOT NULL
                "#,
            )
            .bind(driver_id)
            .bind(RideStatus::Completed.as_str())
            .fetch_one(&mut *tx)
            .await?;

            if let Some(average) = average {
                let rounded = round_to(average, 1);
                sqlx::query("UPDATE users SET rating = ?, updated_at = ? WHERE id = ?")
                    .bind(rounded)
                    .bind(now)
                    .bind(driver_id)
                    .execute(&mut *tx)
                    .await?;
                driver_rating = Some(rounded);
            }
        }

        tx.commit().await?;
        Ok(RatingWrite::Applied { driver_rating })
    }

    /// List rides newest first, returning the page and the total match count.
    pub async fn list_rides(&self, filter: &RideFilter) -> Result<(Vec<Ride>, i64), AppError> {
        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM rides");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(self.pool())
            .await?;

        let mut page_query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM rides", RIDE_COLUMNS));
        push_filters(&mut page_query, filter);
        page_query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rides = page_query
            .build_query_as::<RideRow>()
            .fetch_all(self.pool())
            .await?
            .into_iter()
            .map(Ride::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rides, total))
    }

    // ─── Dashboard ───────────────────────────────────────────────

    /// Compute dashboard aggregates. `today_start` bounds "rides created today".
    pub async fn dashboard_stats(
        &self,
        today_start: DateTime<Utc>,
    ) -> Result<DashboardStats, AppError> {
        let total_riders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'rider'")
            .fetch_one(self.pool())
            .await?;
        let total_drivers: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'driver'")
                .fetch_one(self.pool())
                .await?;
        let total_rides: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rides")
            .fetch_one(self.pool())
            .await?;
        let active_rides: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM rides WHERE status IN ('requested', 'accepted', 'arrived', 'started')",
        )
        .fetch_one(self.pool())
        .await?;
        let total_revenue: Option<f64> =
            sqlx::query_scalar("SELECT SUM(fare) FROM rides WHERE status = 'completed'")
                .fetch_one(self.pool())
                .await?;
        let today_rides: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rides WHERE created_at >= ?")
            .bind(today_start)
            .fetch_one(self.pool())
            .await?;

        Ok(DashboardStats {
            total_riders,
            total_drivers,
            total_rides,
            active_rides,
            total_revenue: round_to(total_revenue.unwrap_or(0.0), 2),
            today_rides,
        })
    }

    /// Ride activity for rides created at or after `since`.
    pub async fn analytics(&self, since: DateTime<Utc>) -> Result<Analytics, AppError> {
        let rides_by_status = sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT status, COUNT(*) AS count
            FROM rides
            WHERE created_at >= ?
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(since)
        .fetch_all(self.pool())
        .await?;

        let daily_rides = sqlx::query_as::<_, DailyRides>(
            r#"
            SELECT substr(created_at, 1, 10) AS date, COUNT(*) AS count
            FROM rides
            WHERE created_at >= ?
            GROUP BY date
            ORDER BY date
            "#,
        )
        .bind(since)
        .fetch_all(self.pool())
        .await?;

        let daily_revenue = sqlx::query_as::<_, DailyRevenue>(
            r#"
            SELECT substr(created_at, 1, 10) AS date, SUM(fare) AS revenue
            FROM rides
            WHERE created_at >= ? AND status = 'completed'
            GROUP BY date
            ORDER BY date
            "#,
        )
        .bind(since)
        .fetch_all(self.pool())
        .await?
        .into_iter()
        .map(|day| DailyRevenue {
            revenue: round_to(day.revenue, 2),
            ..day
        })
        .collect();

        let top_drivers = sqlx::query_as::<_, TopDriver>(
            r#"
            SELECT r.driver_id AS driver_id, u.first_name AS first_name, u.last_name AS last_name,
                   COUNT(*) AS ride_count, AVG(r.rating) AS avg_rating
            FROM rides r
            JOIN users u ON u.id = r.driver_id
            WHERE r.created_at >= ? AND r.status = 'completed'
            GROUP BY r.driver_id
            ORDER BY ride_count DESC, r.driver_id
            LIMIT ?
            "#,
        )
        .bind(since)
        .bind(TOP_DRIVERS_LIMIT)
        .fetch_all(self.pool())
        .await?
        .into_iter()
        .map(|driver| TopDriver {
            avg_rating: driver.avg_rating.map(|avg| round_to(avg, 1)),
            ..driver
        })
        .collect();

        Ok(Analytics {
            rides_by_status,
            daily_rides,
            daily_revenue,
            top_drivers,
        })
    }
}
