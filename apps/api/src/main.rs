use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::services::{
    AppointmentBookingService, InMemoryAppointmentStore, InMemoryPatientDirectory, SystemClock,
};
use shared_config::{AppConfig, StoreBackend};

async fn build_booking_service(config: &AppConfig) -> anyhow::Result<AppointmentBookingService> {
    match config.store_backend {
        StoreBackend::Supabase => {
            if !config.is_configured() {
                warn!("Supabase backend selected but configuration is incomplete");
            }
            info!("Using Supabase appointment store at {}", config.supabase_url);
            Ok(AppointmentBookingService::with_supabase(config))
        }
        StoreBackend::Memory => {
            let patients = match &config.patient_seed_file {
                Some(path) => InMemoryPatientDirectory::from_seed_file(path).await?,
                None => {
                    warn!("PATIENT_SEED_FILE not set; patient directory starts empty");
                    InMemoryPatientDirectory::new()
                }
            };
            info!("Using in-memory appointment store with {} patients", patients.len().await);

            Ok(AppointmentBookingService::new(
                Arc::new(InMemoryAppointmentStore::new()),
                Arc::new(patients),
                Arc::new(SystemClock),
            ))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting consultation booking API server");

    let config = Arc::new(AppConfig::from_env());
    let booking = Arc::new(build_booking_service(&config).await?);

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(Arc::clone(&config), booking)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    let addr = config.bind_address;
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
