// libs/appointment-cell/tests/handlers_test.rs
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::models::PatientProfile;
use appointment_cell::router::appointment_routes;
use appointment_cell::services::{
    AppointmentBookingService, InMemoryAppointmentStore, InMemoryPatientDirectory, ManualClock,
};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
    secret: String,
    alice: TestUser,
    bob: TestUser,
    admin: TestUser,
}

impl TestApp {
    fn new() -> Self {
        let config = TestConfig::default();
        let alice = TestUser::patient("alice@example.com");
        let bob = TestUser::patient("bob@example.com");
        let admin = TestUser::admin("admin@example.com");

        let directory = InMemoryPatientDirectory::from_profiles([
            PatientProfile { id: alice.id, last_name: "Durand".into(), first_name: "Alice".into() },
            PatientProfile { id: bob.id, last_name: "Martin".into(), first_name: "Bob".into() },
        ]);
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()));
        let service = AppointmentBookingService::new(
            Arc::new(InMemoryAppointmentStore::new()),
            Arc::new(directory),
            clock.clone(),
        );

        Self {
            router: appointment_routes(config.to_arc(), Arc::new(service)),
            clock,
            secret: config.jwt_secret,
            alice,
            bob,
            admin,
        }
    }

    fn token(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.secret, None)
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, value)
    }

    async fn book(&self, user: &TestUser, scheduled_at: &str) -> (StatusCode, Value) {
        let token = self.token(user);
        self.send(
            Method::POST,
            "/",
            Some(&token),
            Some(json!({ "scheduled_at": scheduled_at, "reason": "Consultation" })),
        )
        .await
    }
}

#[tokio::test]
async fn missing_or_bad_tokens_are_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "unauthenticated");

    let expired = JwtTestUtils::create_expired_token(&app.alice, &app.secret);
    let (status, _) = app.send(Method::GET, "/me", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = JwtTestUtils::create_invalid_signature_token(&app.alice);
    let (status, _) = app.send(Method::GET, "/me", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let malformed = JwtTestUtils::create_malformed_token();
    let (status, body) = app.send(Method::GET, "/me", Some(&malformed), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "unauthenticated");
}

#[tokio::test]
async fn book_returns_created_view() {
    let app = TestApp::new();

    let (status, body) = app.book(&app.alice, "2026-03-09T10:00:00Z").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "PLANNED");
    assert_eq!(body["scheduled_at"], "2026-03-09 10:00");
    assert_eq!(body["patient_name"], "Durand, Alice");
    assert_eq!(body["can_patient_cancel"], true);
    assert!(Uuid::parse_str(body["id"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn overlapping_booking_is_a_conflict() {
    let app = TestApp::new();

    app.book(&app.alice, "2026-03-09T10:00:00Z").await;
    let (status, body) = app.book(&app.bob, "2026-03-09T10:30").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["reason"], "slot_taken");
    assert!(body["error"].is_string());

    let (status, _) = app.book(&app.bob, "2026-03-09T11:05:00Z").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn malformed_bodies_are_rejected() {
    let app = TestApp::new();
    let token = app.token(&app.alice);

    let (status, body) = app
        .send(Method::POST, "/", Some(&token), Some(json!({ "scheduled_at": "soon", "reason": "x" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid_request");

    let (status, body) = app
        .send(
            Method::POST,
            "/",
            Some(&token),
            Some(json!({ "scheduled_at": "2026-03-09T10:00:00Z", "reason": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid_reason");

    let (status, body) = app.book(&app.alice, "2026-03-01T10:00:00Z").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "scheduled_in_past");
}

#[tokio::test]
async fn unknown_patient_is_not_found() {
    let app = TestApp::new();
    let stranger = TestUser::patient("stranger@example.com");

    let (status, body) = app.book(&stranger, "2026-03-09T10:00:00Z").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["reason"], "patient_not_found");
}

#[tokio::test]
async fn list_mine_returns_only_own_appointments() {
    let app = TestApp::new();

    app.book(&app.alice, "2026-03-09T09:00:00Z").await;
    app.book(&app.bob, "2026-03-09T12:00:00Z").await;
    app.book(&app.alice, "2026-03-09T15:00:00Z").await;

    let token = app.token(&app.alice);
    let (status, body) = app.send(Method::GET, "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let times: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["scheduled_at"].as_str().unwrap())
        .collect();
    assert_eq!(times, vec!["2026-03-09 15:00", "2026-03-09 09:00"]);

    let (status, body) = app.send(Method::GET, "/me?status=CANCELLED", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let (status, body) = app.send(Method::GET, "/me?status=whatever", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid_request");
}

#[tokio::test]
async fn cancel_follows_deadline_and_ownership() {
    let app = TestApp::new();

    let (_, far) = app.book(&app.alice, "2026-03-06T10:00:00Z").await;
    let (_, near) = app.book(&app.alice, "2026-03-03T08:00:00Z").await;
    let far_id = far["id"].as_str().unwrap().to_string();
    let near_id = near["id"].as_str().unwrap().to_string();

    let bob = app.token(&app.bob);
    let (status, body) = app.send(Method::DELETE, &format!("/{}/cancel", far_id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "not_owner");

    let alice = app.token(&app.alice);
    let (status, body) = app.send(Method::DELETE, &format!("/{}/cancel", near_id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["reason"], "cancellation_deadline_passed");

    let (status, body) = app.send(Method::DELETE, &format!("/{}/cancel", far_id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "CANCELLED");
    assert_eq!(body["appointment"]["can_patient_cancel"], false);

    let (status, body) = app
        .send(Method::DELETE, &format!("/{}/cancel", Uuid::new_v4()), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["reason"], "appointment_not_found");

    let (status, _) = app.send(Method::DELETE, "/not-a-uuid/cancel", Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deadline_tracks_the_clock() {
    let app = TestApp::new();
    let (_, booked) = app.book(&app.alice, "2026-03-06T08:00:00Z").await;
    let id = booked["id"].as_str().unwrap().to_string();

    app.clock.advance(Duration::hours(48) + Duration::minutes(1));

    let token = app.token(&app.alice);
    let (_, body) = app.send(Method::GET, "/me", Some(&token), None).await;
    assert_eq!(body[0]["can_patient_cancel"], false);

    let (status, _) = app.send(Method::DELETE, &format!("/{}/cancel", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn upcoming_lists_locked_appointments() {
    let app = TestApp::new();
    app.book(&app.alice, "2026-03-02T20:00:00Z").await;
    app.book(&app.alice, "2026-03-08T20:00:00Z").await;

    let token = app.token(&app.alice);
    let (status, body) = app.send(Method::GET, "/me/upcoming", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["scheduled_at"], "2026-03-02 20:00");
}

#[tokio::test]
async fn slot_check_endpoint() {
    let app = TestApp::new();
    app.book(&app.alice, "2026-03-09T10:00:00Z").await;

    let token = app.token(&app.bob);
    let (status, body) = app
        .send(Method::GET, "/slots/check?at=2026-03-09T10:30:00Z", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["taken"], true);

    let (_, body) = app
        .send(Method::GET, "/slots/check?at=2026-03-09T11:00:00Z", Some(&token), None)
        .await;
    assert_eq!(body["taken"], false);

    let (status, _) = app.send(Method::GET, "/slots/check", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_routes_require_admin() {
    let app = TestApp::new();
    let (_, booked) = app.book(&app.alice, "2026-03-09T10:00:00Z").await;
    app.book(&app.bob, "2026-03-09T14:00:00Z").await;
    let id = booked["id"].as_str().unwrap().to_string();

    let patient = app.token(&app.alice);
    let (status, body) = app.send(Method::GET, "/", Some(&patient), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "role_mismatch");

    let (status, _) = app.send(Method::DELETE, &format!("/{}", id), Some(&patient), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.token(&app.admin);
    let (status, body) = app.send(Method::GET, "/", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, _) = app.send(Method::DELETE, &format!("/{}", id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    // Unknown ids delete silently.
    let (status, _) = app.send(Method::DELETE, &format!("/{}", id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.send(Method::GET, "/", Some(&admin), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}
