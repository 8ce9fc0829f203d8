//! HTTP surface: routing, status codes, headers.

#![allow(clippy::unwrap_used)]

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::{Harness, KEY_SECRET, WEBHOOK_SECRET};
use eventhub::api::router;
use eventhub::mocks::signed_webhook;
use eventhub::reconciliation::signature;
use eventhub_web::ACCOUNT_HEADER;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn json_request(method: Method, uri: &str, account: Option<Uuid>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(account) = account {
        builder = builder.header(ACCOUNT_HEADER, account.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, account: Option<Uuid>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(account) = account {
        builder = builder.header(ACCOUNT_HEADER, account.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

/// An event and a customer profile created over HTTP.
async fn setup(app: &Router, capacity: u32) -> (Uuid, Uuid, Uuid) {
    let organizer = Uuid::new_v4();
    let customer = Uuid::new_v4();

    let (status, event) = send(
        app,
        json_request(
            Method::POST,
            "/api/events",
            Some(organizer),
            &json!({"title": "Launch night", "capacity": capacity, "price": 20_000}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let event_id = event["id"].as_str().unwrap().parse().unwrap();

    let (status, _) = send(
        app,
        json_request(
            Method::PUT,
            &format!("/api/accounts/{customer}"),
            Some(customer),
            &json!({"name": "Asha", "phone": "9876543210"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    (organizer, customer, event_id)
}

#[tokio::test]
async fn health_is_public() {
    let h = Harness::new();
    let app = router(h.hub.clone());
    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn api_requires_an_account() {
    let h = Harness::new();
    let app = router(h.hub.clone());
    let (status, _) = send(
        &app,
        json_request(Method::POST, "/api/events", None, &json!({"title": "x", "capacity": 1, "price": 100})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn book_pay_and_fetch_ticket() {
    let h = Harness::new();
    let app = router(h.hub.clone());
    let (organizer, customer, event_id) = setup(&app, 10).await;

    let (status, receipt) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/events/{event_id}/bookings"),
            Some(customer),
            &json!({"tickets": 2}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["booking"]["payment_status"], "pending");
    assert!(receipt["payment_url"].is_string());
    let booking_id = receipt["booking"]["id"].as_str().unwrap().to_string();
    let order_id = receipt["booking"]["order_id"].as_str().unwrap().to_string();
    let link = receipt["booking"]["payment_link_id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, get(&format!("/api/bookings/{booking_id}/ticket"), Some(customer))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (body, sig) = signed_webhook(WEBHOOK_SECRET, "payment.captured", &link, "pay_1");
    let webhook = Request::builder()
        .method(Method::POST)
        .uri("/payments/webhook")
        .header("X-Razorpay-Signature", sig)
        .body(Body::from(body))
        .unwrap();
    let (status, outcome) = send(&app, webhook).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["result"], "confirmed");

    let (status, ticket) = send(&app, get(&format!("/api/bookings/{booking_id}/ticket"), Some(customer))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ticket["seats"], json!([1, 2]));

    let (status, _) = send(&app, get(&format!("/api/bookings/{booking_id}/ticket"), Some(organizer))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let verify = |who| json_request(Method::POST, &format!("/tickets/{order_id}/verify"), Some(who), &Value::Null);
    let (status, _) = send(&app, verify(customer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, check_in) = send(&app, verify(organizer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check_in["outcome"], "admitted");
}

#[tokio::test]
async fn webhook_rejections_are_bad_requests() {
    let h = Harness::new();
    let app = router(h.hub.clone());

    let unsigned = Request::builder()
        .method(Method::POST)
        .uri("/payments/webhook")
        .body(Body::from(r#"{"event":"payment.captured"}"#))
        .unwrap();
    let (status, _) = send(&app, unsigned).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let forged = Request::builder()
        .method(Method::POST)
        .uri("/payments/webhook")
        .header("X-Razorpay-Signature", "00ff")
        .body(Body::from(r#"{"event":"payment.captured"}"#))
        .unwrap();
    let (status, _) = send(&app, forged).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get("/payments/webhook", None)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn domain_errors_map_to_statuses() {
    let h = Harness::new();
    let app = router(h.hub.clone());
    let (_, customer, event_id) = setup(&app, 1).await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/events/{event_id}/bookings"),
            Some(customer),
            &json!({"tickets": 2}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let missing = Uuid::new_v4();
    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/events/{missing}/bookings"),
            Some(customer),
            &json!({"tickets": 1}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get(&format!("/api/accounts/{missing}/tokens"), Some(customer))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, tokens) = send(&app, get(&format!("/api/accounts/{customer}/tokens"), Some(customer))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tokens["balance"], 0);

    let (status, _) = send(&app, json_request(Method::POST, "/tickets/not-an-order/verify", Some(customer), &Value::Null)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn callback_without_link_needs_an_account() {
    let h = Harness::new();
    let app = router(h.hub.clone());
    let (status, _) = send(&app, get("/payments/callback", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signed_paid_callback_confirms_the_booking() {
    let h = Harness::new();
    let app = router(h.hub.clone());
    let (_, customer, event_id) = setup(&app, 10).await;

    let (_, receipt) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/events/{event_id}/bookings"),
            Some(customer),
            &json!({"tickets": 2}),
        ),
    )
    .await;
    let order_id = receipt["booking"]["order_id"].as_str().unwrap().to_string();
    let link = receipt["booking"]["payment_link_id"].as_str().unwrap().to_string();

    let payload = signature::redirect_payload(&link, &order_id, "paid", "pay_7");
    let sig = signature::sign(KEY_SECRET.as_bytes(), payload.as_bytes());
    let uri = format!(
        "/payments/callback?payment_link_id={link}&payment_id=pay_7\
         &payment_link_reference_id={order_id}&payment_link_status=paid&signature={sig}"
    );
    let (status, outcome) = send(&app, get(&uri, Some(customer))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["confirmed_now"], true);
    assert_eq!(outcome["booking"]["payment_status"], "paid");
    assert_eq!(outcome["seats"], json!([1, 2]));

    // The same callback with a forged signature is refused.
    let forged = uri.replace(&sig, &"0".repeat(64));
    let (status, _) = send(&app, get(&forged, Some(customer))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
