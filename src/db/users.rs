//! User, driver profile and admin log persistence.

use super::Db;
use crate::error::AppError;
use crate::models::{AdminLog, DriverProfile, NewUser, ProfileUpdate, Role, User, UserListing};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, phone, role, is_active, rating, total_rides, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    role: String,
    is_active: bool,
    rating: f64,
    total_rides: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            role: row.role.parse::<Role>().map_err(AppError::Database)?,
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            is_active: row.is_active,
            rating: row.rating,
            total_rides: row.total_rides,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const LISTING_COLUMNS: &str = "u.id, u.email, u.first_name, u.last_name, u.phone, u.role, \
     u.is_active, u.rating, u.total_rides, u.created_at, u.updated_at, \
     d.vehicle_model, d.vehicle_plate, d.documents_verified";

#[derive(sqlx::FromRow)]
struct UserListingRow {
    #[sqlx(flatten)]
    user: UserRow,
    vehicle_model: Option<String>,
    vehicle_plate: Option<String>,
    documents_verified: Option<bool>,
}

impl TryFrom<UserListingRow> for UserListing {
    type Error = AppError;

    fn try_from(row: UserListingRow) -> Result<Self, Self::Error> {
        Ok(UserListing {
            user: User::try_from(row.user)?,
            vehicle_model: row.vehicle_model,
            vehicle_plate: row.vehicle_plate,
            documents_verified: row.documents_verified,
        })
    }
}

/// Admin user listing filter with limit/offset pagination.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    /// Substring of first name, last name or email
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

fn push_user_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &UserFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(role) = filter.role {
        qb.push(" AND u.role = ").push_bind(role.as_str());
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (u.first_name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR u.last_name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR u.email LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

/// Make `%` and `_` match literally in a LIKE pattern.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(sqlx::FromRow)]
struct AdminLogRow {
    id: i64,
    admin_id: i64,
    action: String,
    details: Option<String>,
    target_user_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl From<AdminLogRow> for AdminLog {
    fn from(row: AdminLogRow) -> Self {
        AdminLog {
            id: row.id,
            admin_id: row.admin_id,
            action: row.action,
            details: row.details,
            target_user_id: row.target_user_id,
            created_at: row.created_at,
        }
    }
}

/// Admin actions recorded in the audit log.
pub mod actions {
    pub const USER_CREATED: &str = "USER_CREATED";
    pub const USER_STATUS_CHANGE: &str = "USER_STATUS_CHANGE";
    pub const DRIVER_VERIFICATION: &str = "DRIVER_VERIFICATION";
}

impl Db {
    // ─── User Operations ─────────────────────────────────────────

    /// Create a user, plus their driver profile when one is supplied.
    pub async fn create_user(&self, new_user: &NewUser, now: DateTime<Utc>) -> Result<User, AppError> {
        let mut tx = self.pool().begin().await?;
        let user_id = insert_user(&mut tx, new_user, now).await?;
        tx.commit().await?;

        tracing::info!(user_id, role = %new_user.role, "User created");
        self.load_user(user_id).await
    }

    /// Create a user on behalf of an admin, logging it in the same transaction.
    pub async fn create_user_as_admin(
        &self,
        admin_id: i64,
        new_user: &NewUser,
        now: DateTime<Utc>,
    ) -> Result<User, AppError> {
        let mut tx = self.pool().begin().await?;
        let user_id = insert_user(&mut tx, new_user, now).await?;
        log_admin_action(
            &mut tx,
            admin_id,
            actions::USER_CREATED,
            &format!(
                "Created {} {} {} ({})",
                new_user.role,
                new_user.first_name.trim(),
                new_user.last_name.trim(),
                normalize_email(&new_user.email)
            ),
            Some(user_id),
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(admin_id, user_id, role = %new_user.role, "User created by admin");
        self.load_user(user_id).await
    }

    async fn load_user(&self, user_id: i64) -> Result<User, AppError> {
        self.get_user(user_id)
            .await?
            .ok_or_else(|| AppError::Database(format!("User {} vanished after write", user_id)))
    }

    /// Get a user by ID.
    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?
            .map(User::try_from)
            .transpose()
    }

    /// Look a user up by (case-insensitive) email.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(self.pool())
            .await?
            .map(User::try_from)
            .transpose()
    }

    /// Update the caller's own name and phone. Absent fields are left as is.
    pub async fn update_profile(
        &self,
        user_id: i64,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                phone = COALESCE(?, phone),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.first_name.as_deref().map(str::trim))
        .bind(update.last_name.as_deref().map(str::trim))
        .bind(update.phone.as_deref().map(str::trim))
        .bind(now)
        .bind(user_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_user(user_id).await
    }

    /// Activate or deactivate an account and log it. Returns false if no such user.
    pub async fn set_user_active(
        &self,
        admin_id: i64,
        user_id: i64,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(now)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        log_admin_action(
            &mut tx,
            admin_id,
            actions::USER_STATUS_CHANGE,
            &format!(
                "Set user {} {}",
                user_id,
                if active { "active" } else { "inactive" }
            ),
            Some(user_id),
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(admin_id, user_id, active, "User status changed");
        Ok(true)
    }

    /// Page through users newest first, with driver vehicle details joined in.
    pub async fn list_users(&self, filter: &UserFilter) -> Result<(Vec<UserListing>, i64), AppError> {
        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users u");
        push_user_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(self.pool())
            .await?;

        let mut page_query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM users u LEFT JOIN drivers d ON d.user_id = u.id",
            LISTING_COLUMNS
        ));
        push_user_filters(&mut page_query, filter);
        page_query
            .push(" ORDER BY u.created_at DESC, u.id DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let users = page_query
            .build_query_as::<UserListingRow>()
            .fetch_all(self.pool())
            .await?
            .into_iter()
            .map(UserListing::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((users, total))
    }

    // ─── Driver Profiles ─────────────────────────────────────────

    /// Get the vehicle profile for a driver.
    pub async fn get_driver_profile(&self, user_id: i64) -> Result<Option<DriverProfile>, AppError> {
        let profile = sqlx::query_as::<_, (i64, String, String, String, String, i64, bool)>(
            r#"
            SELECT user_id, license_number, vehicle_model, vehicle_plate,
                   vehicle_color, vehicle_year, documents_verified
            FROM drivers WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?
        .map(
            |(user_id, license_number, vehicle_model, vehicle_plate, vehicle_color, vehicle_year, documents_verified)| {
                DriverProfile {
                    user_id,
                    license_number,
                    vehicle_model,
                    vehicle_plate,
                    vehicle_color,
                    vehicle_year,
                    documents_verified,
                }
            },
        );
        Ok(profile)
    }

    /// Mark a driver's documents as verified or not, and log it.
    /// Returns false if no profile.
    pub async fn set_driver_verified(
        &self,
        admin_id: i64,
        user_id: i64,
        verified: bool,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query("UPDATE drivers SET documents_verified = ? WHERE user_id = ?")
            .bind(verified)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        log_admin_action(
            &mut tx,
            admin_id,
            actions::DRIVER_VERIFICATION,
            &format!(
                "{} driver {}",
                if verified { "Verified" } else { "Unverified" },
                user_id
            ),
            Some(user_id),
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    // ─── Admin Log ───────────────────────────────────────────────

    /// Page through the audit log, newest first.
    pub async fn list_admin_logs(&self, limit: i64, offset: i64) -> Result<(Vec<AdminLog>, i64), AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_logs")
            .fetch_one(self.pool())
            .await?;

        let logs = sqlx::query_as::<_, AdminLogRow>(
            r#"
            SELECT id, admin_id, action, details, target_user_id, created_at
            FROM admin_logs
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?
        .into_iter()
        .map(AdminLog::from)
        .collect();

        Ok((logs, total))
    }

    /// Create the bootstrap admin account if no user with `email` exists.
    pub async fn ensure_admin(&self, email: &str, now: DateTime<Utc>) -> Result<User, AppError> {
        if let Some(existing) = self.find_user_by_email(email).await? {
            if existing.role != Role::Admin {
                tracing::warn!(user_id = existing.id, email, "Bootstrap admin email belongs to a non-admin account");
            }
            return Ok(existing);
        }

        let admin = NewUser {
            email: email.to_string(),
            first_name: "Admin".to_string(),
            last_name: "User".to_string(),
            phone: None,
            role: Role::Admin,
            driver: None,
        };
        self.create_user(&admin, now).await
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn insert_user(
    conn: &mut SqliteConnection,
    new_user: &NewUser,
    now: DateTime<Utc>,
) -> Result<i64, AppError> {
    let email = normalize_email(&new_user.email);

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, first_name, last_name, phone, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&email)
    .bind(new_user.first_name.trim())
    .bind(new_user.last_name.trim())
    .bind(new_user.phone.as_deref())
    .bind(new_user.role.as_str())
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Validation(format!("User {} already exists", email))
        }
        other => AppError::from(other),
    })?;
    let user_id = result.last_insert_rowid();

    if let Some(profile) = &new_user.driver {
        sqlx::query(
            r#"
            INSERT INTO drivers (user_id, license_number, vehicle_model, vehicle_plate,
                vehicle_color, vehicle_year, documents_verified)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(&profile.license_number)
        .bind(&profile.vehicle_model)
        .bind(&profile.vehicle_plate)
        .bind(&profile.vehicle_color)
        .bind(profile.vehicle_year)
        .bind(profile.documents_verified)
        .execute(&mut *conn)
        .await?;
    }

    Ok(user_id)
}

/// Append an audit log entry on the caller's transaction.
async fn log_admin_action(
    conn: &mut SqliteConnection,
    admin_id: i64,
    action: &str,
    details: &str,
    target_user_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO admin_logs (admin_id, action, details, target_user_id, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(admin_id)
    .bind(action)
    .bind(details)
    .bind(target_user_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
