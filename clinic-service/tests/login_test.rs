//! Login, profile and account deactivation.

mod common;

use clinic_service::models::Role;
use common::{TestApp, ADMIN_EMAIL, ADMIN_PASSWORD, STAFF_PASSWORD};
use serde_json::{json, Value};

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn bootstrap_admin_can_log_in() {
    let app = TestApp::spawn().await;

    let response = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 30 * 60);
    assert_eq!(body["user"]["role"], "admin");
    assert!(body["user"].get("password_hash").is_none());

    let token = body["access_token"].as_str().unwrap();
    let me: Value = app.get(token, "/api/auth/me").await.json().await.unwrap();
    assert_eq!(me["email"], ADMIN_EMAIL);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn login_email_is_case_insensitive() {
    let app = TestApp::spawn().await;

    let response = app
        .login(&ADMIN_EMAIL.to_uppercase(), ADMIN_PASSWORD)
        .await;
    assert_eq!(response.status(), 200);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn bad_credentials_share_one_error() {
    let app = TestApp::spawn().await;

    let wrong_password = app.login(ADMIN_EMAIL, "not-the-password").await;
    assert_eq!(wrong_password.status(), 401);
    let wrong_password: Value = wrong_password.json().await.unwrap();

    let unknown = app.login("nobody@clinic.test", ADMIN_PASSWORD).await;
    assert_eq!(unknown.status(), 401);
    let unknown: Value = unknown.json().await.unwrap();

    assert_eq!(wrong_password["error"], "Invalid email or password");
    assert_eq!(wrong_password, unknown);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn deactivated_staff_are_locked_out() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let (token, staff_id) = app.staff_token(&admin, Role::Receptionist).await;

    let me: Value = app.get(&token, "/api/auth/me").await.json().await.unwrap();
    let email = me["email"].as_str().unwrap().to_string();

    let response = app.delete(&admin, &format!("/api/staff/{}", staff_id)).await;
    assert_eq!(response.status(), 204);

    assert_eq!(app.login(&email, STAFF_PASSWORD).await.status(), 401);
    assert_eq!(app.get(&token, "/api/auth/me").await.status(), 401);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn profile_update_changes_password() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let (token, _) = app.staff_token(&admin, Role::Dentist).await;

    let response = app
        .patch(
            &token,
            "/api/auth/me",
            json!({ "phone": "555-0100", "password": "a-brand-new-password" }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let me: Value = response.json().await.unwrap();
    assert_eq!(me["phone"], "555-0100");

    let email = me["email"].as_str().unwrap();
    assert_eq!(app.login(email, STAFF_PASSWORD).await.status(), 401);
    assert_eq!(app.login(email, "a-brand-new-password").await.status(), 200);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn duplicate_staff_email_conflicts() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let response = app
        .post(
            &admin,
            "/api/staff",
            json!({
                "name": "Second Admin",
                "email": ADMIN_EMAIL.to_uppercase(),
                "role": "admin",
                "password": "long-enough-password"
            }),
        )
        .await;
    assert_eq!(response.status(), 409);

    app.cleanup().await;
}
