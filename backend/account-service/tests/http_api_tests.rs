//! End-to-end HTTP scenarios against the full route table.

mod common;

use account_service::config::OtpSettings;
use account_service::db::CredentialStore;
use account_service::handlers;
use account_service::security::session::activity_marker_key;
use redis_utils::SessionCache;
use std::time::Duration;
use actix_web::{http::StatusCode, test, App};
use common::{TestContext, NEW_PASSWORD, STRONG_PASSWORD};
use serde_json::{json, Value};

macro_rules! app {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .app_data($ctx.state.clone())
                .configure(handlers::configure),
        )
        .await
    };
}

fn register_body(username: &str, email: &str) -> Value {
    json!({
        "username": username,
        "email": email,
        "password": STRONG_PASSWORD,
        "password_confirm": STRONG_PASSWORD,
        "first_name": "Test",
        "last_name": "User"
    })
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

#[actix_web::test]
async fn test_health() {
    let ctx = TestContext::new();
    let app = app!(ctx);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn test_register_verify_login_scenario() {
    let ctx = TestContext::new();
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(register_body("alice", "alice@example.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 201);
    assert_eq!(body["data"]["username"], "alice");
    assert!(body["data"].get("password_hash").is_none());

    let code = ctx.verification_code_for("alice@example.com", 0).await;
    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/auth/verify-email/{code}"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({ "identity": "alice", "password": STRONG_PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert!(body["data"]["access_token"].is_string());
    assert!(body["data"]["refresh_token"].is_string());

    let access = body["data"]["access_token"].as_str().unwrap();
    let req = test::TestRequest::get()
        .uri("/api/v1/account/me")
        .insert_header(bearer(access))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["email"], "alice@example.com");
    assert_eq!(body["data"]["is_verified"], true);
}

#[actix_web::test]
async fn test_logout_invalidates_access_token() {
    let ctx = TestContext::new();
    ctx.verified_user("bob").await;
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({ "identity": "bob@example.com", "password": STRONG_PASSWORD }))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let access = body["data"]["access_token"].as_str().unwrap().to_string();
    let refresh = body["data"]["refresh_token"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/logout")
        .insert_header(bearer(&access))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/v1/account/me")
        .insert_header(bearer(&access))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Token is invalid or session has expired");

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/refresh")
        .set_json(json!({ "refresh_token": refresh }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/logout")
        .insert_header(bearer(&access))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_forgot_password_scenario() {
    let ctx = TestContext::new();
    ctx.verified_user("carol").await;
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/forgot-password")
        .set_json(json!({ "email": "carol@example.com" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let otp = ctx.otp_for("carol@example.com", 1).await;
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/forgot-password/otp")
        .set_json(json!({ "otp": otp }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let reference_no = body["data"]["reference_no"].as_str().unwrap().to_string();
    assert_eq!(reference_no.len(), 20);

    let reset = json!({
        "reference_no": reference_no,
        "password": NEW_PASSWORD,
        "password_confirm": NEW_PASSWORD
    });
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/reset-password")
        .set_json(&reset)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/reset-password")
        .set_json(&reset)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Reference number not found");

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({ "identity": "carol", "password": NEW_PASSWORD }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_duplicate_registration_scenario() {
    let ctx = TestContext::new();
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(register_body("dave", "dave@example.com"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(register_body("dave2", "dave@example.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Email already exists");

    let users = ctx
        .state
        .accounts
        .list_users(&Default::default())
        .await
        .unwrap();
    assert_eq!(users.total, 1);
}

#[actix_web::test]
async fn test_validation_errors_carry_fields() {
    let ctx = TestContext::new();
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(register_body("x", "not-an-email"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"username"));

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_missing_token_is_unauthorized() {
    let ctx = TestContext::new();
    let app = app!(ctx);

    let req = test::TestRequest::get().uri("/api/v1/account/me").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "You are not logged in");

    let req = test::TestRequest::get()
        .uri("/api/v1/drive")
        .insert_header(bearer("garbage"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

async fn login_token(ctx: &TestContext, username: &str) -> String {
    let (_, pair) = ctx
        .state
        .accounts
        .login(username, STRONG_PASSWORD, None)
        .await
        .unwrap();
    pair.access_token
}

#[actix_web::test]
async fn test_products_respect_ownership() {
    let ctx = TestContext::new();
    ctx.verified_user("erin").await;
    ctx.verified_user("frank").await;
    let erin = login_token(&ctx, "erin").await;
    let frank = login_token(&ctx, "frank").await;
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/products")
        .insert_header(bearer(&erin))
        .set_json(json!({ "title": "Oak desk", "description": "Solid oak", "price": 12999 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["is_enable"], true);

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/products/{id}"))
        .insert_header(bearer(&frank))
        .set_json(json!({ "price": 1 }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/products/{id}"))
        .insert_header(bearer(&frank))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/products/{id}"))
        .insert_header(bearer(&erin))
        .set_json(json!({ "price": 9999 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["price"], 9999);

    let req = test::TestRequest::get().uri("/api/v1/products?search=oak").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["per_page"], 10);

    let req = test::TestRequest::get()
        .uri("/api/v1/products/mine")
        .insert_header(bearer(&frank))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["total"], 0);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/products/{id}"))
        .insert_header(bearer(&erin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/products/{id}"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_drive_files_respect_ownership() {
    let ctx = TestContext::new();
    ctx.verified_user("grace").await;
    ctx.verified_user("heidi").await;
    let grace = login_token(&ctx, "grace").await;
    let heidi = login_token(&ctx, "heidi").await;
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/drive")
        .insert_header(bearer(&grace))
        .set_json(json!({
            "name": "trip.mp4",
            "file_type": "V",
            "link": "https://files.example.com/trip.mp4"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["file_type"], "V");

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/drive/{id}"))
        .insert_header(bearer(&heidi))
        .set_json(json!({ "name": "mine now" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/api/v1/drive")
        .insert_header(bearer(&heidi))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["total"], 0);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/drive/{id}"))
        .insert_header(bearer(&grace))
        .set_json(json!({ "name": "holiday.mp4" }))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["name"], "holiday.mp4");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/drive/{id}"))
        .insert_header(bearer(&heidi))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_admin_routes_require_staff() {
    let ctx = TestContext::new();
    let ivan = ctx.verified_user("ivan").await;
    ctx.verified_user("admin").await;
    let user_token = login_token(&ctx, "ivan").await;
    let admin_token = login_token(&ctx, "admin").await;
    let app = app!(ctx);

    let req = test::TestRequest::get()
        .uri("/api/v1/admin/users")
        .insert_header(bearer(&user_token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/api/v1/admin/users?per_page=1")
        .insert_header(bearer(&admin_token))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/admin/users/{}", ivan.id))
        .insert_header(bearer(&admin_token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    // Ivan's session now points at a deleted user
    let req = test::TestRequest::get()
        .uri("/api/v1/account/me")
        .insert_header(bearer(&user_token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/v1/admin/users/restore")
        .insert_header(bearer(&admin_token))
        .set_json(json!({ "email": "ivan@example.com" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/v1/admin/users/restore")
        .insert_header(bearer(&admin_token))
        .set_json(json!({ "email": "ivan@example.com" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/admin/users/{}/permanent", ivan.id))
        .insert_header(bearer(&admin_token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_account_deletion_over_http() {
    let ctx = TestContext::new();
    ctx.verified_user("judy").await;
    let token = login_token(&ctx, "judy").await;
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/account/delete/request")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let otp = ctx.otp_for("judy@example.com", 1).await;
    let req = test::TestRequest::post()
        .uri("/api/v1/account/delete/verify")
        .insert_header(bearer(&token))
        .set_json(json!({ "otp": otp }))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let reference_no = body["data"]["reference_no"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/v1/account/delete/confirm")
        .insert_header(bearer(&token))
        .set_json(json!({ "reference_no": reference_no }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({ "identity": "judy", "password": STRONG_PASSWORD }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_expired_otp_is_unprocessable() {
    let ctx = TestContext::with_otp_settings(OtpSettings {
        expiry_secs: 0,
        ..OtpSettings::default()
    });
    ctx.verified_user("kim").await;
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/forgot-password")
        .set_json(json!({ "email": "kim@example.com" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let otp = ctx.otp_for("kim@example.com", 1).await;
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/forgot-password/otp")
        .set_json(json!({ "otp": otp }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "OTP code has expired");
}

#[actix_web::test]
async fn test_authenticated_requests_refresh_last_login() {
    let ctx = TestContext::new();
    let app = app!(ctx);
    let user = ctx.verified_user("rita").await;
    assert!(user.last_login_at.is_none());
    let pair = ctx.state.sessions.issue_pair(user.id).await.unwrap();

    let req = test::TestRequest::get()
        .uri("/api/v1/account/me")
        .insert_header(bearer(&pair.access_token))
        .insert_header(("X-Forwarded-For", "203.0.113.9"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let mut stored = None;
    for _ in 0..200 {
        let current = ctx.users.find_by_id(user.id).await.unwrap().unwrap();
        if current.last_login_at.is_some() {
            stored = Some(current);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let stored = stored.expect("last login recorded");
    assert_eq!(stored.last_login_ip.as_deref(), Some("203.0.113.9"));
    assert!(ctx.cache.get(&activity_marker_key(user.id)).await.unwrap().is_some());
    let first_seen = stored.last_login_at;

    // Once the marker lapses the next request writes again
    ctx.cache.delete(&activity_marker_key(user.id)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let req = test::TestRequest::get()
        .uri("/api/v1/account/me")
        .insert_header(bearer(&pair.access_token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let mut advanced = false;
    for _ in 0..200 {
        let current = ctx.users.find_by_id(user.id).await.unwrap().unwrap();
        if current.last_login_at > first_seen {
            advanced = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(advanced, "last login not refreshed after the marker expired");
}
