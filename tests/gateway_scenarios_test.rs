//! End-to-end scenarios against the catch-all gateway handler: public
//! bypass, missing-token rejection, and the success envelope with identity
//! header propagation. Requires a local Redis instance (see
//! `common::redis_url`).

mod common;

use actix_web::{http::StatusCode, test, web, App};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kairos_rs::routes::route_table::gateway_handler;

#[actix_web::test]
async fn public_route_bypasses_auth_rate_limit_and_envelope() {
    let upstream = MockServer::start().await;
    // `strip_prefix_segments` defaults to 0, so the full incoming path is
    // forwarded unchanged.
    Mock::given(method("GET"))
        .and(path("/public/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&upstream)
        .await;

    let kv = common::fresh_kv().await;
    let route = common::public_route("public-status", "/public/status", &upstream.uri());
    let state = common::build_state(kv, vec![route]).await;

    let app = test::init_service(App::new().app_data(state.clone()).default_service(web::route().to(gateway_handler))).await;

    let req = test::TestRequest::get().uri("/public/status").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("x-request-id").is_some());
    assert!(resp.headers().get("x-ratelimit-limit").is_none());

    let body: serde_json::Value = test::read_body_json(resp).await;
    // Unwrapped: the upstream body appears directly, not nested under `data`.
    assert_eq!(body, serde_json::json!({"ok": true}));
}

#[actix_web::test]
async fn protected_route_without_token_returns_401_problem_details() {
    let kv = common::fresh_kv().await;
    let route = common::protected_route("users-profile", "/api/users/profile", "http://upstream.invalid");
    let state = common::build_state(kv, vec![route]).await;

    let app = test::init_service(App::new().app_data(state.clone()).default_service(web::route().to(gateway_handler))).await;

    let req = test::TestRequest::get().uri("/api/users/profile").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let request_id = resp
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["title"], "Authentication failed");
    assert_eq!(body["instance"], request_id);
}

#[actix_web::test]
async fn protected_route_with_valid_token_forwards_identity_and_wraps_response() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile"))
        .and(header("x-user-id", "user-42"))
        .and(header("x-gateway-verified", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::upstream_ok_body()))
        .mount(&upstream)
        .await;

    let kv = common::fresh_kv().await;
    let route = common::protected_route("users-profile", "/api/users/profile", &upstream.uri());
    let state = common::build_state(kv, vec![route]).await;

    let app = test::init_service(App::new().app_data(state.clone()).default_service(web::route().to(gateway_handler))).await;

    let token = common::mint_token("user-42", &[]);
    let req = test::TestRequest::get()
        .uri("/api/users/profile")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["code"], "SUCCESS");
    assert_eq!(body["data"], common::upstream_ok_body());
    assert_eq!(body["meta"]["gateway"], "API-Gateway");
    assert_eq!(body["meta"]["version"], "1.0");
    assert!(body["meta"]["request_id"].is_string());
}

#[actix_web::test]
async fn client_supplied_identity_headers_are_stripped_before_forwarding() {
    let upstream = MockServer::start().await;
    // The minted principal below carries no email, so `identity_propagation`
    // never re-inserts `X-User-Email` itself — if the strip step didn't run,
    // the client-supplied value below would reach the upstream unchanged.
    Mock::given(method("GET"))
        .and(path("/api/users/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::upstream_ok_body()))
        .mount(&upstream)
        .await;

    let kv = common::fresh_kv().await;
    let route = common::protected_route("users-profile", "/api/users/profile", &upstream.uri());
    let state = common::build_state(kv, vec![route]).await;

    let app = test::init_service(App::new().app_data(state.clone()).default_service(web::route().to(gateway_handler))).await;

    let token = common::mint_token("user-42", &[]);
    let req = test::TestRequest::get()
        .uri("/api/users/profile")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header(("X-User-Email", "attacker@evil.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let requests = upstream.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("x-user-email").is_none());
    assert_eq!(requests[0].headers.get("x-user-id").unwrap(), "user-42");
}
