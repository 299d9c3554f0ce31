//! Auto-block after repeated failed authentications (scenario 5, §8) plus
//! the block/unblock round-trip idempotence property. Requires a local
//! Redis instance.
//!
//! Thresholds are fixed by policy at `USER=5, IP=10` (§4.6); five failures
//! from one IP therefore blocks the *user* but not yet the IP (it needs
//! ten), so this test drives ten attempts to observe both escalations
//! rather than five as the scenario's prose loosely suggests.

mod common;

use actix_web::{http::StatusCode, test, web, App};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

use kairos_rs::routes::route_table::gateway_handler;
use kairos_rs::services::block_store::BlockScope;

#[derive(Serialize)]
struct Claims<'a> {
    sub: &'a str,
    exp: usize,
    iss: &'a str,
    aud: &'a str,
}

/// A token that decodes fine (so its `sub` is extractable) but fails
/// signature verification against [`common::HMAC_SECRET`] — this is the
/// "Authorization: Bearer invalid" case from the scenario.
fn token_with_bad_signature(subject: &str) -> String {
    let claims = Claims {
        sub: subject,
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        iss: common::ISSUER,
        aud: common::AUDIENCE,
    };
    encode(
        &Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(b"not-the-configured-secret"),
    )
    .unwrap()
}

#[actix_web::test]
async fn repeated_failed_auth_escalates_to_user_then_ip_block() {
    let kv = common::fresh_kv().await;
    let route = common::protected_route("users-profile", "/api/users/profile", "http://upstream.invalid");
    let state = common::build_state(kv.clone(), vec![route]).await;

    let app = test::init_service(App::new().app_data(state.clone()).default_service(web::route().to(gateway_handler))).await;

    let user_id = "victim-user";
    let client_ip = "203.0.113.7";
    let token = token_with_bad_signature(user_id);

    for attempt in 1..=10 {
        let req = test::TestRequest::get()
            .uri("/api/users/profile")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .insert_header(("X-Forwarded-For", client_ip))
            .to_request();
        let resp = test::call_service(&app, req).await;

        if attempt <= 5 {
            // Before the user threshold is crossed, still a plain 401.
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "attempt {attempt}");
        }
    }

    assert!(state.block_store.is_blocked(BlockScope::User, user_id).await.unwrap().blocked);
    assert!(state.block_store.is_blocked(BlockScope::Ip, client_ip).await.unwrap().blocked);

    let user_ttl = kv.ttl(&format!("blocked:user:{user_id}")).await.unwrap();
    let ip_ttl = kv.ttl(&format!("blocked:ip:{client_ip}")).await.unwrap();
    assert!((1..=1800).contains(&user_ttl), "user block TTL was {user_ttl}");
    assert!((1..=1800).contains(&ip_ttl), "ip block TTL was {ip_ttl}");

    // A subsequent request from the now-blocked IP is rejected at BlockCheck,
    // before auth ever runs.
    let req = test::TestRequest::get()
        .uri("/api/users/profile")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header(("X-Forwarded-For", client_ip))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn blocking_then_unblocking_returns_to_never_blocked_state() {
    let kv = common::fresh_kv().await;
    let store = kairos_rs::services::block_store::BlockStore::new(kv.clone());

    assert!(!store.is_blocked(BlockScope::User, "round-trip-user").await.unwrap().blocked);

    store
        .block(BlockScope::User, "round-trip-user", "manual test block", Some(60))
        .await
        .unwrap();
    assert!(store.is_blocked(BlockScope::User, "round-trip-user").await.unwrap().blocked);

    let removed = store.unblock(BlockScope::User, "round-trip-user").await.unwrap();
    assert!(removed);
    assert!(!store.is_blocked(BlockScope::User, "round-trip-user").await.unwrap().blocked);

    let ttl = kv.ttl("blocked:user:round-trip-user").await.unwrap();
    assert_eq!(ttl, -2, "unblocked key must not linger with a residual TTL");
}

#[actix_web::test]
async fn success_after_failures_below_threshold_resets_counters_to_absent() {
    let kv = common::fresh_kv().await;
    let block_store = kairos_rs::services::block_store::BlockStore::new(kv.clone());
    let tracker = kairos_rs::services::login_attempts::LoginAttemptTracker::new(kv.clone(), block_store);

    for _ in 0..3 {
        tracker.record_failure("flaky-user", "198.51.100.20").await.unwrap();
    }
    assert_eq!(tracker.user_attempt_count("flaky-user").await.unwrap(), 3);

    tracker.record_success("flaky-user", "198.51.100.20").await.unwrap();
    assert_eq!(tracker.user_attempt_count("flaky-user").await.unwrap(), 0);
}
