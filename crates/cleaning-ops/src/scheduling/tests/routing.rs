use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::{fixture, read_json_body, token_for, Fixture, UnavailableStore};
use crate::config::SchedulingConfig;
use crate::scheduling::auth::{RoleSource, SessionClaims, StaticIdentityProvider};
use crate::scheduling::domain::{Profile, Role};
use crate::scheduling::feed::ChangeFeed;
use crate::scheduling::router::scheduling_router;
use crate::scheduling::service::SchedulingService;

fn request(method: Method, uri: &str, caller: Option<&Profile>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(profile) = caller {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(profile)));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

fn cleaning_body(fx: &Fixture) -> Value {
    json!({
        "client_id": fx.client_a.id,
        "address": "41 Harbor Lane",
        "total_steps": 5,
        "scheduled_date": "2025-11-04",
        "start_time": "09:00:00",
        "end_time": "12:00:00",
        "cleaner_ids": [fx.cleaner_x.id]
    })
}

#[tokio::test]
async fn admin_creates_cleaning() {
    let fx = fixture();
    let response = fx
        .router()
        .oneshot(request(
            Method::POST,
            "/api/v1/cleanings",
            Some(&fx.admin),
            Some(cleaning_body(&fx)),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["current_step"], 0);
    assert_eq!(body["total_steps"], 5);
    assert_eq!(body["version"], 1);
    assert_eq!(body["cleaners"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let fx = fixture();
    let response = fx
        .router()
        .oneshot(request(Method::GET, "/api/v1/cleanings", None, None))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "authentication required");
}

#[tokio::test]
async fn forbidden_hides_the_reason() {
    let fx = fixture();
    let response = fx
        .router()
        .oneshot(request(
            Method::POST,
            "/api/v1/cleanings",
            Some(&fx.cleaner_x),
            Some(cleaning_body(&fx)),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json_body(response).await;
    assert_eq!(body, json!({ "error": "not authorized" }));
}

#[tokio::test]
async fn out_of_range_step_is_bad_request() {
    let fx = fixture();
    let record = fx.schedule(&fx.client_a, 5, &[&fx.cleaner_x]);
    let response = fx
        .router()
        .oneshot(request(
            Method::PATCH,
            &format!("/api/v1/cleanings/{}", record.id()),
            Some(&fx.cleaner_x),
            Some(json!({ "current_step": 9 })),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    let message = body["error"].as_str().expect("error message");
    assert!(message.contains("current_step"), "message: {message}");
    assert!(message.contains("between 0 and 5"), "message: {message}");
}

#[tokio::test]
async fn cleaner_patch_reports_ignored_fields() {
    let fx = fixture();
    let record = fx.schedule(&fx.client_a, 5, &[&fx.cleaner_x]);
    let response = fx
        .router()
        .oneshot(request(
            Method::PATCH,
            &format!("/api/v1/cleanings/{}", record.id()),
            Some(&fx.cleaner_x),
            Some(json!({ "current_step": 2, "status": "pending", "notes": "done early" })),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "in_progress");
    assert_eq!(body["current_step"], 2);
    assert_eq!(body["ignored_fields"], json!(["notes", "status"]));
}

#[tokio::test]
async fn unknown_cleaning_is_not_found() {
    let fx = fixture();
    let response = fx
        .router()
        .oneshot(request(
            Method::GET,
            &format!("/api/v1/cleanings/{}", uuid::Uuid::new_v4()),
            Some(&fx.admin),
            None,
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_status_value_is_json_bad_request() {
    let fx = fixture();
    let record = fx.schedule(&fx.client_a, 5, &[&fx.cleaner_x]);
    let response = fx
        .router()
        .oneshot(request(
            Method::PATCH,
            &format!("/api/v1/cleanings/{}", record.id()),
            Some(&fx.cleaner_x),
            Some(json!({ "status": "finished" })),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    let message = body["error"].as_str().expect("error message");
    assert!(message.contains("finished"), "message: {message}");
    assert_eq!(fx.stored(record.id()).cleaning.version, 1);
}

#[tokio::test]
async fn malformed_body_is_json_bad_request() {
    let fx = fixture();
    let record = fx.schedule(&fx.client_a, 5, &[&fx.cleaner_x]);
    let malformed = Request::builder()
        .method(Method::PATCH)
        .uri(format!("/api/v1/cleanings/{}", record.id()))
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(&fx.cleaner_x)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"current_step\": "))
        .expect("request");

    let response = fx.router().oneshot(malformed).await.expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert!(body["error"].as_str().is_some_and(|message| message.starts_with("invalid body")));
}

#[tokio::test]
async fn malformed_id_is_json_bad_request() {
    let fx = fixture();
    let response = fx
        .router()
        .oneshot(request(
            Method::GET,
            "/api/v1/cleanings/not-a-uuid",
            Some(&fx.admin),
            None,
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    let message = body["error"].as_str().expect("error message");
    assert!(message.starts_with("invalid cleaning_id"), "message: {message}");
}

#[tokio::test]
async fn malformed_request_without_session_is_unauthorized() {
    let fx = fixture();
    let response = fx
        .router()
        .oneshot(request(
            Method::DELETE,
            "/api/v1/houses/not-a-uuid",
            None,
            None,
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "authentication required");
}

#[tokio::test]
async fn unknown_status_filter_is_bad_request() {
    let fx = fixture();
    let response = fx
        .router()
        .oneshot(request(
            Method::GET,
            "/api/v1/cleanings?status=sparkling",
            Some(&fx.admin),
            None,
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .is_some_and(|message| message.contains("sparkling")));
}

#[tokio::test]
async fn status_filter_narrows_the_list() {
    let fx = fixture();
    let started = fx.schedule(&fx.client_a, 5, &[&fx.cleaner_x]);
    fx.schedule(&fx.client_a, 5, &[&fx.cleaner_x]);
    fx.service
        .update_cleaning(
            &fx.session(&fx.cleaner_x),
            started.id(),
            super::common::step_patch(1),
        )
        .expect("start one");

    let response = fx
        .router()
        .oneshot(request(
            Method::GET,
            "/api/v1/cleanings?status=in_progress",
            Some(&fx.client_a),
            None,
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    let rows = body.as_array().expect("array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(started.id()));
}

#[tokio::test]
async fn self_role_change_is_bad_request() {
    let fx = fixture();
    let response = fx
        .router()
        .oneshot(request(
            Method::PATCH,
            &format!("/api/v1/users/{}/role", fx.admin.id),
            Some(&fx.admin),
            Some(json!({ "role": "client" })),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .is_some_and(|message| message.contains("your own role")));
}

#[tokio::test]
async fn stale_version_is_conflict() {
    let fx = fixture();
    let record = fx.schedule(&fx.client_a, 5, &[&fx.cleaner_x]);
    fx.service
        .update_cleaning(
            &fx.session(&fx.cleaner_x),
            record.id(),
            super::common::step_patch(1),
        )
        .expect("first write");

    let response = fx
        .router()
        .oneshot(request(
            Method::PATCH,
            &format!("/api/v1/cleanings/{}", record.id()),
            Some(&fx.admin),
            Some(json!({ "current_step": 2, "expected_version": 1 })),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn me_returns_the_profile() {
    let fx = fixture();
    let response = fx
        .router()
        .oneshot(request(Method::GET, "/api/v1/me", Some(&fx.client_b), None))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["email"], fx.client_b.email);
    assert_eq!(body["role"], "client");
}

#[tokio::test]
async fn store_failure_is_generic_server_error() {
    let identity = Arc::new(StaticIdentityProvider::default());
    let admin = super::common::profile(Role::Admin, "ops@sparkle.test");
    identity.issue(
        token_for(&admin),
        SessionClaims {
            user_id: admin.id,
            email: admin.email.clone(),
            role: Some(Role::Admin),
        },
    );
    let config = SchedulingConfig {
        role_source: RoleSource::Metadata,
        ..SchedulingConfig::default()
    };
    let service = Arc::new(SchedulingService::new(
        Arc::new(UnavailableStore),
        identity,
        ChangeFeed::default(),
        &config,
    ));

    let response = scheduling_router(service)
        .oneshot(request(Method::GET, "/api/v1/cleanings", Some(&admin), None))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json_body(response).await;
    assert_eq!(
        body,
        json!({ "error": "unexpected error, please retry later" })
    );
}
