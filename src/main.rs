use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vendor_bookings_api::config::Config;
use vendor_bookings_api::db::Database;
use vendor_bookings_api::handlers::AppState;
use vendor_bookings_api::payment_gateway::HttpPaymentGateway;
use vendor_bookings_api::request_guard::InFlightGuard;
use vendor_bookings_api::routes::{api_routes, build_router};
use vendor_bookings_api::services::BookingService;
use vendor_bookings_api::storage::Storage;

/// Main entry point for the application.
///
/// Initializes logging, configuration, storage (Postgres when a database URL
/// is configured, in-memory otherwise), the payment provider client and the
/// HTTP routes with rate limiting, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vendor_bookings_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let storage = match &config.database_url {
        Some(url) => {
            let db = Database::new(url).await?;
            tracing::info!("Database connection pool established, migrations applied");
            Storage::postgres(db.pool)
        }
        None => Storage::in_memory(),
    };

    let gateway = HttpPaymentGateway::new(
        config.payment_api_base_url.clone(),
        config.payment_api_key.clone(),
    )?;
    tracing::info!("Payment client initialized: {}", config.payment_api_base_url);

    let service = BookingService::new(&config, storage, Arc::new(gateway));

    let app_state = Arc::new(AppState {
        config: config.clone(),
        service,
        guard: InFlightGuard::default(),
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    // Rate limiting only wraps /api; health and docs bypass it
    let api = api_routes().layer(ServiceBuilder::new().layer(GovernorLayer {
        config: governor_conf,
    }));

    let app = build_router(app_state, api);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
