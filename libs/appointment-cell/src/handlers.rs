// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AppointmentListQuery, AppointmentView, BookAppointmentRequest, SlotAvailability, SlotCheckQuery};
use crate::services::booking::AppointmentBookingService;

type BookingState = State<Arc<AppointmentBookingService>>;

fn invalid_request(message: String) -> AppError {
    AppError::ValidationError {
        reason: "invalid_request",
        message,
    }
}

// ==============================================================================
// PATIENT HANDLERS
// ==============================================================================

pub async fn book_appointment(
    State(service): BookingState,
    Extension(user): Extension<User>,
    payload: Result<Json<BookAppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AppointmentView>), AppError> {
    let Json(request) = payload.map_err(|e| invalid_request(e.body_text()))?;

    let view = service.book_appointment(&user, user.id, request).await?;

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn list_my_appointments(
    State(service): BookingState,
    Extension(user): Extension<User>,
    query: Result<Query<AppointmentListQuery>, QueryRejection>,
) -> Result<Json<Vec<AppointmentView>>, AppError> {
    let Query(query) = query.map_err(|e| invalid_request(e.body_text()))?;

    let views = service.list_patient_appointments(&user, user.id, query.status).await?;

    Ok(Json(views))
}

pub async fn list_my_locked_appointments(
    State(service): BookingState,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<AppointmentView>>, AppError> {
    let views = service.list_locked_appointments(&user, user.id).await?;
    Ok(Json(views))
}

pub async fn check_slot(
    State(service): BookingState,
    Extension(user): Extension<User>,
    query: Result<Query<SlotCheckQuery>, QueryRejection>,
) -> Result<Json<SlotAvailability>, AppError> {
    let Query(query) = query.map_err(|e| invalid_request(e.body_text()))?;

    let availability = service.check_slot(&user, query.at).await?;

    Ok(Json(availability))
}

pub async fn cancel_appointment(
    State(service): BookingState,
    Extension(user): Extension<User>,
    appointment_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(appointment_id) = appointment_id.map_err(|e| invalid_request(e.body_text()))?;

    let view = service.cancel_appointment(&user, user.id, appointment_id).await?;

    Ok(Json(json!({
        "message": "Appointment cancelled",
        "appointment": view
    })))
}

// ==============================================================================
// ADMIN HANDLERS
// ==============================================================================

pub async fn list_all_appointments(
    State(service): BookingState,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<AppointmentView>>, AppError> {
    let views = service.list_all_appointments(&user).await?;
    Ok(Json(views))
}

pub async fn delete_appointment(
    State(service): BookingState,
    Extension(user): Extension<User>,
    appointment_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(appointment_id) = appointment_id.map_err(|e| invalid_request(e.body_text()))?;

    service.delete_appointment(&user, appointment_id).await?;

    Ok(Json(json!({
        "message": "Appointment deleted",
        "id": appointment_id
    })))
}
