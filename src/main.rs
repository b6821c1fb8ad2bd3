use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dispatch_admin::{AppState, config, db, seed, server};

#[tokio::main]
async fn main() {
    // Load configuration
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dispatch_admin=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = config::Config::from_env();

    // Initialize database
    let db = match db::init_db(&config.database_url).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    if let Some((email, password)) = &config.bootstrap_dispatcher {
        match seed::ensure_dispatcher(&db, email, password).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!("Dispatcher account already present"),
            Err(e) => tracing::error!("Failed to create bootstrap dispatcher: {}", e),
        }
    }

    // Check for seed flag
    if std::env::var("SEED_DEMO").is_ok() {
        tracing::info!("Seeding demo data...");
        if let Err(e) = seed::seed_demo_data(&db).await {
            tracing::error!("Failed to seed data: {}", e);
        } else {
            tracing::info!("Demo data seeded successfully.");
        }
    }

    if config.payment_service_url.is_none() {
        tracing::warn!("PAYMENT_SERVICE_URL not set: approvals will fall back to payment pending");
    }
    if config.smtp.is_none() {
        tracing::info!("SMTP not configured: email notifications disabled");
    }

    let port = config.port;
    let state = AppState::new(db, config);

    if let Err(e) = server::serve(state, port).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
