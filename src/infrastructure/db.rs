use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    if database_url.contains(":memory:") {
        // Every pooled connection would get its own empty in-memory database
        options.max_connections(1).min_connections(1);
    }
    let db = Database::connect(options).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;

    Ok(db)
}

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS facilities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        address TEXT,
        phone TEXT,
        email TEXT,
        billing_email TEXT,
        contact_name TEXT,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        phone TEXT,
        role TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        facility_id INTEGER REFERENCES facilities(id) ON DELETE SET NULL,
        address TEXT,
        vehicle TEXT,
        license_number TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_profiles_role ON profiles(role)",
    r#"
    CREATE TABLE IF NOT EXISTS managed_clients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        facility_id INTEGER NOT NULL REFERENCES facilities(id) ON DELETE CASCADE,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        phone TEXT,
        email TEXT,
        address TEXT,
        medical_notes TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS trips (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER REFERENCES profiles(id) ON DELETE SET NULL,
        managed_client_id INTEGER REFERENCES managed_clients(id) ON DELETE SET NULL,
        facility_id INTEGER REFERENCES facilities(id) ON DELETE SET NULL,
        driver_id INTEGER REFERENCES profiles(id) ON DELETE SET NULL,
        pickup_address TEXT NOT NULL,
        destination_address TEXT NOT NULL,
        pickup_time TEXT NOT NULL,
        return_pickup_time TEXT,
        is_round_trip BOOLEAN NOT NULL DEFAULT 0,
        wheelchair_type TEXT,
        additional_passengers INTEGER NOT NULL DEFAULT 0,
        distance_miles REAL,
        price REAL,
        status TEXT NOT NULL DEFAULT 'pending',
        payment_method_id TEXT,
        payment_status TEXT,
        payment_intent_id TEXT,
        payment_note TEXT,
        cancellation_reason TEXT,
        notes TEXT,
        approved_at TEXT,
        completed_at TEXT,
        cancelled_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_trips_status ON trips(status)",
    "CREATE INDEX IF NOT EXISTS idx_trips_pickup_time ON trips(pickup_time)",
    r#"
    CREATE TABLE IF NOT EXISTS invoices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        invoice_number TEXT NOT NULL UNIQUE,
        facility_id INTEGER REFERENCES facilities(id) ON DELETE SET NULL,
        user_id INTEGER REFERENCES profiles(id) ON DELETE SET NULL,
        amount REAL NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        period_start TEXT,
        period_end TEXT,
        due_date TEXT NOT NULL,
        trip_ids TEXT NOT NULL DEFAULT '[]',
        payment_reference TEXT,
        payment_claimed_at TEXT,
        payment_verified_at TEXT,
        verified_by INTEGER,
        verification_notes TEXT,
        notes TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        facility_id INTEGER NOT NULL REFERENCES facilities(id) ON DELETE CASCADE,
        subject TEXT NOT NULL,
        created_by INTEGER NOT NULL,
        last_message_at TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
        sender_id INTEGER NOT NULL,
        body TEXT NOT NULL,
        read_at TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        kind TEXT NOT NULL,
        related_trip_id INTEGER,
        read_at TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS push_tokens (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        token TEXT NOT NULL UNIQUE,
        platform TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
];

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    for sql in MIGRATIONS {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            sql.to_string(),
        ))
        .await?;
    }

    tracing::debug!("Applied {} schema statements", MIGRATIONS.len());
    Ok(())
}
