// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::booking::AppointmentBookingService;

pub fn appointment_routes(config: Arc<AppConfig>, service: Arc<AppointmentBookingService>) -> Router {
    // Every appointment operation requires authentication
    Router::new()
        .route("/", get(handlers::list_all_appointments).post(handlers::book_appointment))
        .route("/me", get(handlers::list_my_appointments))
        .route("/me/upcoming", get(handlers::list_my_locked_appointments))
        .route("/slots/check", get(handlers::check_slot))
        .route("/{appointment_id}", delete(handlers::delete_appointment))
        .route("/{appointment_id}/cancel", delete(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(service)
}
