//! User and driver profile models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use super::ride::non_blank;
use validator::Validate;

/// Account role, stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Rider,
    Driver,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Rider => "rider",
            Role::Driver => "driver",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rider" => Ok(Role::Rider),
            "driver" => Ok(Role::Driver),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// User account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub is_active: bool,
    /// Running average of ride ratings (drivers)
    pub rating: f64,
    /// Completed rides taken as a rider
    pub total_rides: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A user as listed for admins, with vehicle details for drivers.
#[derive(Debug, Clone, Serialize)]
pub struct UserListing {
    #[serde(flatten)]
    pub user: User,
    pub vehicle_model: Option<String>,
    pub vehicle_plate: Option<String>,
    /// None for accounts without a driver profile
    pub documents_verified: Option<bool>,
}

/// Fields a user may change on their own account.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(
        length(max = 100),
        custom(function = "non_blank", message = "First name cannot be empty")
    )]
    pub first_name: Option<String>,
    #[validate(
        length(max = 100),
        custom(function = "non_blank", message = "Last name cannot be empty")
    )]
    pub last_name: Option<String>,
    #[validate(length(max = 32), custom(function = "non_blank"))]
    pub phone: Option<String>,
}

/// Vehicle and licensing details for a driver account.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DriverProfile {
    #[serde(default)]
    pub user_id: i64,
    #[validate(length(min = 1, max = 64))]
    pub license_number: String,
    #[validate(length(min = 1, max = 64))]
    pub vehicle_model: String,
    #[validate(length(min = 1, max = 16))]
    pub vehicle_plate: String,
    #[validate(length(min = 1, max = 32))]
    pub vehicle_color: String,
    #[validate(range(min = 1900, max = 2100))]
    pub vehicle_year: i64,
    #[serde(default)]
    pub documents_verified: bool,
}

/// Input for provisioning a user account.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub role: Role,
    /// Required when `role` is `driver`
    #[validate(nested)]
    pub driver: Option<DriverProfile>,
}

/// Driver details sent to a rider when their ride is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverContact {
    pub name: String,
    pub phone: Option<String>,
    pub rating: f64,
    /// "<color> <model>", when the driver has a vehicle on file
    pub vehicle: Option<String>,
    pub plate: Option<String>,
}

impl DriverContact {
    pub fn new(user: &User, profile: Option<&DriverProfile>) -> Self {
        Self {
            name: user.full_name(),
            phone: user.phone.clone(),
            rating: user.rating,
            vehicle: profile.map(|p| format!("{} {}", p.vehicle_color, p.vehicle_model)),
            plate: profile.map(|p| p.vehicle_plate.clone()),
        }
    }
}

/// One entry in the admin audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct AdminLog {
    pub id: i64,
    pub admin_id: i64,
    pub action: String,
    pub details: Option<String>,
    pub target_user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}
