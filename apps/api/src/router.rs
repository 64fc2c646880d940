use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use appointment_cell::services::AppointmentBookingService;
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>, booking: Arc<AppointmentBookingService>) -> Router {
    Router::new()
        .route("/", get(|| async { "Consultation booking API is running!" }))
        .nest("/appointments", appointment_routes(config, booking))
}
