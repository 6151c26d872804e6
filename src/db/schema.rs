//! Table definitions, applied in order at startup.

pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    phone TEXT,
    role TEXT NOT NULL DEFAULT 'rider' CHECK (role IN ('rider', 'driver', 'admin')),
    is_active INTEGER NOT NULL DEFAULT 1,
    rating REAL NOT NULL DEFAULT 5.0,
    total_rides INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

pub const CREATE_DRIVERS: &str = r#"
CREATE TABLE IF NOT EXISTS drivers (
    user_id INTEGER PRIMARY KEY REFERENCES users (id) ON DELETE CASCADE,
    license_number TEXT NOT NULL,
    vehicle_model TEXT NOT NULL,
    vehicle_plate TEXT NOT NULL,
    vehicle_color TEXT NOT NULL,
    vehicle_year INTEGER NOT NULL,
    documents_verified INTEGER NOT NULL DEFAULT 0
);
"#;

pub const CREATE_RIDES: &str = r#"
CREATE TABLE IF NOT EXISTS rides (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    rider_id INTEGER NOT NULL REFERENCES users (id),
    driver_id INTEGER REFERENCES users (id),
    pickup_lat REAL NOT NULL,
    pickup_lng REAL NOT NULL,
    pickup_address TEXT NOT NULL,
    destination_lat REAL NOT NULL,
    destination_lng REAL NOT NULL,
    destination_address TEXT NOT NULL,
    distance_km REAL NOT NULL,
    duration_minutes INTEGER,
    fare REAL NOT NULL,
    status TEXT NOT NULL DEFAULT 'requested' CHECK (
        status IN ('requested', 'accepted', 'arrived', 'started', 'completed', 'cancelled')
    ),
    rating INTEGER CHECK (rating BETWEEN 1 AND 5),
    feedback TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

pub const CREATE_RIDES_RIDER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_rides_rider ON rides (rider_id, created_at);";

pub const CREATE_RIDES_DRIVER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_rides_driver ON rides (driver_id, created_at);";

pub const CREATE_ADMIN_LOGS: &str = r#"
CREATE TABLE IF NOT EXISTS admin_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    admin_id INTEGER NOT NULL REFERENCES users (id),
    action TEXT NOT NULL,
    details TEXT,
    target_user_id INTEGER REFERENCES users (id),
    created_at TEXT NOT NULL
);
"#;

pub const ALL: &[&str] = &[
    CREATE_USERS,
    CREATE_DRIVERS,
    CREATE_RIDES,
    CREATE_RIDES_RIDER_INDEX,
    CREATE_RIDES_DRIVER_INDEX,
    CREATE_ADMIN_LOGS,
];
