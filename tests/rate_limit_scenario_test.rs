//! Rate-limit exhaustion (scenario 4, §8): the built-in "strict" policy is
//! `{replenish:5, burst:10, requested:2}` — exactly the literal policy the
//! spec scenario names. Requires a local Redis instance.

mod common;

use actix_web::{http::StatusCode, test, web, App};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use std::collections::HashMap;

use kairos_rs::models::route::{RateLimitPolicy, Route};
use kairos_rs::routes::route_table::gateway_handler;

fn strict_rate_limited_route(upstream: &str) -> Route {
    let mut route = common::public_route("rate-limited", "/public/limited", upstream);
    route.rate_limit_policy = Some("strict".to_string());
    route
}

#[actix_web::test]
async fn sixth_request_in_a_burst_of_ten_is_throttled() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&upstream)
        .await;

    let kv = common::fresh_kv().await;
    let route = strict_rate_limited_route(&upstream.uri());
    let state = common::build_state(kv, vec![route]).await;

    let app = test::init_service(App::new().app_data(state.clone()).default_service(web::route().to(gateway_handler))).await;

    // burst capacity 10, 2 tokens consumed per call: 5 calls succeed
    // (10 -> 8 -> 6 -> 4 -> 2 -> 0), the 6th is throttled.
    for i in 0..5 {
        let req = test::TestRequest::get().uri("/public/limited").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "request {i} should be allowed");
    }

    let req = test::TestRequest::get().uri("/public/limited").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers().get("retry-after").unwrap(), "1");
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "RATE_LIMIT");
}

#[actix_web::test]
async fn one_of_two_concurrent_requests_against_a_single_token_bucket_is_rejected() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&upstream)
        .await;

    let kv = common::fresh_kv().await;
    let mut route = common::public_route("single-token", "/public/single", &upstream.uri());
    route.rate_limit_policy = Some("single-token".to_string());
    let mut extra_policies = HashMap::new();
    extra_policies.insert(
        "single-token".to_string(),
        RateLimitPolicy {
            replenish_rate_per_sec: 0,
            burst_capacity: 1,
            requested_tokens_per_call: 1,
        },
    );
    let state = common::build_state_with_policies(kv, vec![route], extra_policies).await;

    let app = test::init_service(App::new().app_data(state.clone()).default_service(web::route().to(gateway_handler))).await;

    let req_a = test::TestRequest::get().uri("/public/single").to_request();
    let req_b = test::TestRequest::get().uri("/public/single").to_request();
    let (resp_a, resp_b) = tokio::join!(test::call_service(&app, req_a), test::call_service(&app, req_b));

    let statuses = [resp_a.status(), resp_b.status()];
    let allowed = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    let throttled = statuses.iter().filter(|s| **s == StatusCode::TOO_MANY_REQUESTS).count();
    assert_eq!(allowed, 1);
    assert_eq!(throttled, 1);
}
