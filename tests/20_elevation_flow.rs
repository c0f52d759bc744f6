mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{bearer, TestApp};

const CHALLENGE: &str = "/api/elevation/challenge";
const VERIFY: &str = "/api/elevation/verify";
const ACTIVATE: &str = "/api/elevation/activate";
const STATUS: &str = "/api/elevation/status";
const GRANT: &str = "/api/elevation/grant";
const DEACTIVATE: &str = "/api/elevation/deactivate";

async fn verify_session(app: &TestApp, auth: &str) {
    let (status, _) = app.call(Method::POST, CHALLENGE, Some(auth), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let code = app.ctx.channel.last_code().expect("code was sent");
    let (status, _) = app.call(Method::POST, VERIFY, Some(auth), Some(json!({ "code": code }))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() -> Result<()> {
    let app = TestApp::new()?;

    let (status, body) = app.call(Method::POST, CHALLENGE, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = app.call(Method::GET, STATUS, Some("Bearer not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn challenge_response_never_contains_the_code() -> Result<()> {
    let app = TestApp::new()?;
    let auth = bearer("user-7", "sess-1");

    let (status, body) = app
        .call(Method::POST, CHALLENGE, Some(&auth), Some(json!({ "action": "visudo" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["delivered"], true);

    let code = app.ctx.channel.last_code().expect("code was sent");
    assert!(!body.to_string().contains(&code));
    Ok(())
}

#[tokio::test]
async fn unknown_action_is_rejected() -> Result<()> {
    let app = TestApp::new()?;
    let auth = bearer("user-7", "sess-1");

    let (status, _) = app
        .call(Method::POST, CHALLENGE, Some(&auth), Some(json!({ "action": "rm-rf" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.ctx.channel.messages().is_empty());
    Ok(())
}

#[tokio::test]
async fn wrong_and_foreign_codes_fail_the_same_way() -> Result<()> {
    let app = TestApp::new()?;
    let owner = bearer("user-7", "sess-1");
    let other = bearer("user-7", "sess-2");

    app.call(Method::POST, CHALLENGE, Some(&owner), None).await;
    let code = app.ctx.channel.last_code().expect("code was sent");

    let (wrong_status, wrong) = app.call(Method::POST, VERIFY, Some(&owner), Some(json!({ "code": "ZZZZZZ" }))).await;
    let (foreign_status, foreign) = app.call(Method::POST, VERIFY, Some(&other), Some(json!({ "code": code }))).await;

    assert_eq!(wrong_status, StatusCode::BAD_REQUEST);
    assert_eq!(foreign_status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong, foreign);
    assert_eq!(wrong["error"], "Invalid or expired code");

    // Lower case with whitespace still matches after normalisation
    let padded = format!("  {}  ", code.to_lowercase());
    let (status, _) = app.call(Method::POST, VERIFY, Some(&owner), Some(json!({ "code": padded }))).await;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn expired_code_is_rejected() -> Result<()> {
    let app = TestApp::new()?;
    let auth = bearer("user-7", "sess-1");

    app.call(Method::POST, CHALLENGE, Some(&auth), None).await;
    let code = app.ctx.channel.last_code().expect("code was sent");
    app.ctx.clock.advance(301);

    let (status, _) = app.call(Method::POST, VERIFY, Some(&auth), Some(json!({ "code": code }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn malformed_verify_body_is_invalid_json() -> Result<()> {
    let app = TestApp::new()?;
    let auth = bearer("user-7", "sess-1");

    let (status, body) = app.call(Method::POST, VERIFY, Some(&auth), Some(json!({ "pin": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_JSON");
    Ok(())
}

#[tokio::test]
async fn activation_without_verification_is_forbidden() -> Result<()> {
    let app = TestApp::new()?;
    let auth = bearer("user-7", "sess-1");

    let (status, body) = app.call(Method::POST, ACTIVATE, Some(&auth), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    assert_eq!(app.ctx.toggle.enable_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn full_flow_then_conflict_then_deactivate() -> Result<()> {
    let app = TestApp::new()?;
    let auth = bearer("user-7", "sess-1");
    verify_session(&app, &auth).await;

    let (status, body) = app.call(Method::POST, ACTIVATE, Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Privileges enabled for 10 minutes");
    assert!(app.ctx.toggle.is_enabled());

    // A second operator who also verified cannot open a second window
    let second = bearer("user-9", "sess-9");
    verify_session(&app, &second).await;
    app.ctx.clock.advance(120);
    let (status, body) = app.call(Method::POST, ACTIVATE, Some(&second), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Privilege already active (480s remaining)");
    assert_eq!(app.ctx.toggle.enable_calls(), 1);

    let (status, body) = app.call(Method::GET, STATUS, Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["activation"]["remaining_secs"], 480);
    assert_eq!(body["data"]["grant"]["user_id"], "user-7");

    let (status, body) = app.call(Method::POST, DEACTIVATE, Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "rolled_back");
    assert!(!app.ctx.toggle.is_enabled());
    Ok(())
}

#[tokio::test]
async fn validator_rejection_is_unprocessable() -> Result<()> {
    let app = TestApp::new()?;
    let auth = bearer("user-7", "sess-1");
    verify_session(&app, &auth).await;
    app.ctx.toggle.fail_validation(Some("parse error in /etc/sudoers.d/nginx-dash near line 9"));

    let (status, body) = app.call(Method::POST, ACTIVATE, Some(&auth), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap_or_default().contains("near line 9"));
    assert!(!app.ctx.toggle.is_enabled());
    Ok(())
}

#[tokio::test]
async fn deactivate_requires_grant() -> Result<()> {
    let app = TestApp::new()?;
    let auth = bearer("user-7", "sess-1");

    let (status, body) = app.call(Method::POST, DEACTIVATE, Some(&auth), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Identity verification required");
    Ok(())
}

#[tokio::test]
async fn revoked_grant_closes_the_gate() -> Result<()> {
    let app = TestApp::new()?;
    let auth = bearer("user-7", "sess-1");
    verify_session(&app, &auth).await;
    app.call(Method::POST, ACTIVATE, Some(&auth), None).await;

    let (status, _) = app.call(Method::DELETE, GRANT, Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    // Idempotent
    let (status, _) = app.call(Method::DELETE, GRANT, Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call(Method::POST, DEACTIVATE, Some(&auth), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_json_404() -> Result<()> {
    let app = TestApp::new()?;
    let (status, body) = app.call(Method::GET, "/api/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    Ok(())
}
