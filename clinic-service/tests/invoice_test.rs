//! Invoice totals, payments and cancellation.

mod common;

use clinic_service::models::Role;
use common::TestApp;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

fn money(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

async fn issue_invoice(app: &TestApp, token: &str, last_name: &str) -> Value {
    let patient = app.create_patient(token, last_name).await;
    let response = app
        .post(
            token,
            "/api/invoices",
            json!({
                "patient_id": patient,
                "invoice_date": "2030-02-01",
                "due_date": "2030-03-01",
                "items": [
                    { "description": "Examination", "quantity": 1, "unit_price": "60.00" },
                    { "description": "X-ray", "quantity": 2, "unit_price": "45.50" }
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    response.json().await.unwrap()
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn invoice_totals_follow_items_and_payments() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let (desk, _) = app.staff_token(&admin, Role::Receptionist).await;

    let detail = issue_invoice(&app, &desk, "Billing").await;
    let invoice = &detail["invoice"];
    assert!(invoice["invoice_number"].as_str().unwrap().starts_with("INV-"));
    assert_eq!(money(&invoice["total_amount"]), Decimal::from_str("151.00").unwrap());
    assert_eq!(invoice["status"], "pending");
    assert_eq!(detail["items"].as_array().unwrap().len(), 2);
    assert_eq!(money(&detail["items"][1]["amount"]), Decimal::from_str("91.00").unwrap());

    let payments = format!("/api/invoices/{}/payments", invoice["invoice_id"].as_str().unwrap());

    let partial = app
        .post(&desk, &payments, json!({ "amount": "51.00", "method": "card" }))
        .await;
    assert_eq!(partial.status(), 201);
    let partial: Value = partial.json().await.unwrap();
    assert_eq!(partial["invoice"]["status"], "partial");
    assert_eq!(money(&partial["invoice"]["balance_amount"]), Decimal::from(100));

    let too_much = app
        .post(&desk, &payments, json!({ "amount": "100.01", "method": "cash" }))
        .await;
    assert_eq!(too_much.status(), 400);

    let settled = app
        .post(&desk, &payments, json!({ "amount": "100", "method": "cash" }))
        .await;
    assert_eq!(settled.status(), 201);
    let settled: Value = settled.json().await.unwrap();
    assert_eq!(settled["invoice"]["status"], "paid");
    assert_eq!(money(&settled["invoice"]["balance_amount"]), Decimal::ZERO);
    assert_eq!(settled["payments"].as_array().unwrap().len(), 2);

    // Removing a payment reopens the balance.
    let payment_id = settled["payments"][0]["payment_id"].as_str().unwrap();
    let reopened = app
        .delete(&desk, &format!("{}/{}", payments, payment_id))
        .await;
    assert_eq!(reopened.status(), 200);
    let reopened: Value = reopened.json().await.unwrap();
    assert_eq!(reopened["invoice"]["status"], "partial");
    assert_eq!(reopened["payments"].as_array().unwrap().len(), 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn invoice_cannot_drop_below_amount_paid() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let detail = issue_invoice(&app, &admin, "Shrink").await;
    let id = detail["invoice"]["invoice_id"].as_str().unwrap().to_string();

    let response = app
        .post(
            &admin,
            &format!("/api/invoices/{}/payments", id),
            json!({ "amount": "120.00", "method": "insurance" }),
        )
        .await;
    assert_eq!(response.status(), 201);

    let response = app
        .put(
            &admin,
            &format!("/api/invoices/{}", id),
            json!({
                "invoice_date": "2030-02-01",
                "items": [{ "description": "Examination", "quantity": 1, "unit_price": "60.00" }]
            }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .put(
            &admin,
            &format!("/api/invoices/{}", id),
            json!({
                "invoice_date": "2030-02-01",
                "items": [{ "description": "Crown", "quantity": 1, "unit_price": "300.00" }]
            }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["items"].as_array().unwrap().len(), 1);
    assert_eq!(money(&updated["invoice"]["balance_amount"]), Decimal::from(180));
    assert_eq!(updated["invoice"]["status"], "partial");

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn cancelled_invoice_is_frozen() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let detail = issue_invoice(&app, &admin, "Frozen").await;
    let id = detail["invoice"]["invoice_id"].as_str().unwrap().to_string();
    let items = json!([{ "description": "Examination", "quantity": 1, "unit_price": "60.00" }]);

    let response = app
        .put(
            &admin,
            &format!("/api/invoices/{}", id),
            json!({ "invoice_date": "2030-02-01", "status": "cancelled", "items": items }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let cancelled: Value = response.json().await.unwrap();
    assert_eq!(cancelled["invoice"]["status"], "cancelled");

    let response = app
        .put(
            &admin,
            &format!("/api/invoices/{}", id),
            json!({ "invoice_date": "2030-02-01", "items": items }),
        )
        .await;
    assert_eq!(response.status(), 409);

    let response = app
        .post(
            &admin,
            &format!("/api/invoices/{}/payments", id),
            json!({ "amount": "10.00", "method": "cash" }),
        )
        .await;
    assert_eq!(response.status(), 409);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn patients_with_invoices_cannot_be_deleted() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let detail = issue_invoice(&app, &admin, "Owing").await;
    let patient = detail["invoice"]["patient_id"].as_str().unwrap().to_string();
    let invoice = detail["invoice"]["invoice_id"].as_str().unwrap().to_string();

    let response = app.delete(&admin, &format!("/api/patients/{}", patient)).await;
    assert_eq!(response.status(), 409);

    assert_eq!(
        app.delete(&admin, &format!("/api/invoices/{}", invoice)).await.status(),
        204
    );
    assert_eq!(
        app.delete(&admin, &format!("/api/patients/{}", patient)).await.status(),
        204
    );
    assert_eq!(
        app.get(&admin, &format!("/api/patients/{}", patient)).await.status(),
        404
    );

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn deleting_a_paid_invoice_removes_it() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let detail = issue_invoice(&app, &admin, "Settled").await;
    let id = detail["invoice"]["invoice_id"].as_str().unwrap().to_string();

    let response = app
        .post(
            &admin,
            &format!("/api/invoices/{}/payments", id),
            json!({ "amount": "50.00", "method": "card" }),
        )
        .await;
    assert_eq!(response.status(), 201);

    assert_eq!(
        app.delete(&admin, &format!("/api/invoices/{}", id)).await.status(),
        204
    );
    assert_eq!(
        app.get(&admin, &format!("/api/invoices/{}", id)).await.status(),
        404
    );

    let response = app
        .post(
            &admin,
            &format!("/api/invoices/{}/payments", id),
            json!({ "amount": "10.00", "method": "cash" }),
        )
        .await;
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}
