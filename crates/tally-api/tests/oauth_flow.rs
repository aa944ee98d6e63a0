mod common;

use std::collections::HashMap;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use httpmock::prelude::*;
use tower::ServiceExt;

use tally_api::rate_limit::RateLimiter;
use tally_api::validate;

const DISCORD_ID: &str = "123456789012345678";

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Drives the whole linking flow over the real router: start issues a
/// fresh state and redirects to the authorize URL, the callback links the
/// account, and a replay of the same callback is rejected.
#[tokio::test]
async fn full_link_flow_then_replay_rejected() {
    let server = MockServer::start_async().await;
    let tmp = common::TempDb::new("oauth-flow");
    let state = common::test_state(&server, &tmp.path);
    let app = tally_api::router(state.clone());

    let response = app
        .clone()
        .oneshot(get(&format!("/oauth/start?discord_id={DISCORD_ID}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response
        .headers()
        .get(header::LOCATION)
        .expect("redirect must carry a Location header")
        .to_str()
        .unwrap()
        .to_string();
    assert!(location.starts_with(&server.base_url()));

    let url = reqwest::Url::parse(&location).unwrap();
    let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
    assert_eq!(pairs.get("client_id").map(String::as_str), Some("test-client-id"));
    assert_eq!(pairs.get("scope").map(String::as_str), Some("read:user"));
    assert_eq!(
        pairs.get("redirect_uri").map(String::as_str),
        Some("http://localhost:8000/oauth/callback")
    );

    let state_param = pairs.get("state").expect("authorize URL must carry state").clone();
    assert!(state_param.len() >= 20);
    assert!(validate::oauth_state(&state_param));

    let token_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/login/oauth/access_token")
                .header("accept", "application/json");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"access_token":"gho_testtoken1234","token_type":"bearer"}"#);
        })
        .await;
    let user_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/user")
                .header("authorization", "token gho_testtoken1234");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"login":"octocat"}"#);
        })
        .await;

    let callback_uri = format!("/oauth/callback?code=abc&state={state_param}");
    let response = app.clone().oneshot(get(&callback_uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = common::body_text(response).await;
    assert!(text.contains("linked successfully"), "unexpected body: {text}");

    token_mock.assert_async().await;
    user_mock.assert_async().await;

    let row = state
        .db
        .get_linked_account(DISCORD_ID)
        .unwrap()
        .expect("account should be linked");
    assert_eq!(row.github_login, "octocat");

    // Same state again: consumed tokens are gone, so the replay fails with
    // the same generic message as an expired one.
    let response = app.clone().oneshot(get(&callback_uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(common::body_text(response).await, "Invalid or expired state");
}

#[tokio::test]
async fn callback_with_missing_params_is_rejected() {
    let server = MockServer::start_async().await;
    let tmp = common::TempDb::new("missing-params");
    let state = common::test_state(&server, &tmp.path);
    let app = tally_api::router(state);

    // Empty code counts as missing.
    let response = app
        .clone()
        .oneshot(get("/oauth/callback?code=&state=x"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(common::body_text(response).await, "Missing required parameters");

    let response = app.clone().oneshot(get("/oauth/callback")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn callback_with_malformed_state_is_rejected_before_lookup() {
    let server = MockServer::start_async().await;
    let tmp = common::TempDb::new("malformed-state");
    let state = common::test_state(&server, &tmp.path);
    let app = tally_api::router(state);

    let response = app
        .oneshot(get("/oauth/callback?code=abc&state=bad!state"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(common::body_text(response).await, "Invalid state parameter");
}

#[tokio::test]
async fn callback_with_unknown_state_is_rejected() {
    let server = MockServer::start_async().await;
    let tmp = common::TempDb::new("unknown-state");
    let state = common::test_state(&server, &tmp.path);
    let app = tally_api::router(state);

    let response = app
        .oneshot(get("/oauth/callback?code=abc&state=well-formed-but-never-issued-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(common::body_text(response).await, "Invalid or expired state");
}

#[tokio::test]
async fn start_rejects_bad_or_missing_identity() {
    let server = MockServer::start_async().await;
    let tmp = common::TempDb::new("bad-identity");
    let state = common::test_state(&server, &tmp.path);
    let app = tally_api::router(state);

    let response = app
        .clone()
        .oneshot(get("/oauth/start?discord_id=123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(common::body_text(response).await, "Invalid Discord ID");

    let response = app.clone().oneshot(get("/oauth/start")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn start_is_rate_limited_per_identity() {
    let server = MockServer::start_async().await;
    let tmp = common::TempDb::new("start-rate-limit");
    let state = common::test_state_with_limiters(
        &server,
        &tmp.path,
        RateLimiter::new(5, Duration::from_secs(300)),
        RateLimiter::new(100, Duration::from_secs(60)),
    );
    let app = tally_api::router(state);

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(get(&format!("/oauth/start?discord_id={DISCORD_ID}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    }

    let response = app
        .clone()
        .oneshot(get(&format!("/oauth/start?discord_id={DISCORD_ID}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get(header::RETRY_AFTER).is_some());
    let text = common::body_text(response).await;
    assert!(text.starts_with("Rate limit exceeded"), "unexpected body: {text}");

    // A different identity is unaffected.
    let response = app
        .clone()
        .oneshot(get("/oauth/start?discord_id=987654321098765432"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn upstream_auth_failure_surfaces_generically_and_links_nothing() {
    let server = MockServer::start_async().await;
    let tmp = common::TempDb::new("upstream-auth");
    let state = common::test_state(&server, &tmp.path);
    let app = tally_api::router(state.clone());

    let response = app
        .clone()
        .oneshot(get(&format!("/oauth/start?discord_id={DISCORD_ID}")))
        .await
        .unwrap();
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    let url = reqwest::Url::parse(&location).unwrap();
    let state_param = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    server
        .mock_async(|when, then| {
            when.method(POST).path("/login/oauth/access_token");
            then.status(500).body("upstream broke: secret detail");
        })
        .await;

    let response = app
        .clone()
        .oneshot(get(&format!("/oauth/callback?code=abc&state={state_param}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let text = common::body_text(response).await;
    assert_eq!(text, "Failed to authenticate with GitHub");
    assert!(!text.contains("secret detail"));

    assert!(state.db.get_linked_account(DISCORD_ID).unwrap().is_none());
}

#[tokio::test]
async fn upstream_profile_failure_surfaces_generically() {
    let server = MockServer::start_async().await;
    let tmp = common::TempDb::new("upstream-profile");
    let state = common::test_state(&server, &tmp.path);
    let app = tally_api::router(state.clone());

    let response = app
        .clone()
        .oneshot(get(&format!("/oauth/start?discord_id={DISCORD_ID}")))
        .await
        .unwrap();
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    let url = reqwest::Url::parse(&location).unwrap();
    let state_param = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    server
        .mock_async(|when, then| {
            when.method(POST).path("/login/oauth/access_token");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"access_token":"gho_testtoken1234"}"#);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/user");
            then.status(403).body("forbidden");
        })
        .await;

    let response = app
        .clone()
        .oneshot(get(&format!("/oauth/callback?code=abc&state={state_param}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(common::body_text(response).await, "Failed to get user information");

    assert!(state.db.get_linked_account(DISCORD_ID).unwrap().is_none());
}

#[tokio::test]
async fn health_and_root_respond() {
    let server = MockServer::start_async().await;
    let tmp = common::TempDb::new("health");
    let state = common::test_state(&server, &tmp.path);
    let app = tally_api::router(state);

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value =
        serde_json::from_str(&common::body_text(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");

    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
