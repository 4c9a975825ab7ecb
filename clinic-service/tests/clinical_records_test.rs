//! Treatments, patient history, stock and the dashboard.

mod common;

use clinic_service::models::Role;
use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn patient_history_collects_clinical_records() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let (dentist, dentist_id) = app.staff_token(&admin, Role::Dentist).await;
    let (desk, _) = app.staff_token(&admin, Role::Receptionist).await;
    let patient = app.create_patient(&desk, "History").await;
    let other_patient = app.create_patient(&desk, "Elsewhere").await;

    let appointment: Value = app
        .post(
            &desk,
            "/api/appointments",
            json!({
                "patient_id": patient,
                "dentist_id": dentist_id,
                "appointment_date": "2030-06-01",
                "start_time": "08:30:00",
                "duration_minutes": 30
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let appointment_id = appointment["appointment_id"].as_str().unwrap();

    // Linking another patient's appointment is refused.
    let response = app
        .post(
            &dentist,
            "/api/treatments",
            json!({
                "patient_id": other_patient,
                "appointment_id": appointment_id,
                "treatment_name": "Scaling"
            }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .post(
            &dentist,
            "/api/treatments",
            json!({
                "patient_id": patient,
                "appointment_id": appointment_id,
                "treatment_name": "Composite filling",
                "tooth_number": 36,
                "cost": "140.00",
                "treatment_date": "2030-06-01"
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let treatment: Value = response.json().await.unwrap();
    assert_eq!(treatment["status"], "planned");
    assert_eq!(treatment["dentist_id"], dentist_id.to_string());

    let history: Value = app
        .get(&desk, &format!("/api/patients/{}/history", patient))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(history["patient"]["last_name"], "History");
    assert_eq!(history["appointments"].as_array().unwrap().len(), 1);
    assert_eq!(history["treatments"].as_array().unwrap().len(), 1);
    assert!(history["invoices"].as_array().unwrap().is_empty());

    // Receptionists read treatments but cannot change them.
    let path = format!("/api/treatments/{}", treatment["treatment_id"].as_str().unwrap());
    assert_eq!(app.get(&desk, &path).await.status(), 200);
    assert_eq!(app.delete(&desk, &path).await.status(), 403);
    assert_eq!(app.delete(&dentist, &path).await.status(), 204);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn patient_search_is_paginated() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    for name in ["Pagetest-A", "Pagetest-B", "Pagetest-C"] {
        app.create_patient(&admin, name).await;
    }
    app.create_patient(&admin, "Unrelated").await;

    let page: Value = app
        .get(&admin, "/api/patients?search=pagetest&page=1&page_size=2")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(page["total"], 3);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);

    let page: Value = app
        .get(&admin, "/api/patients?search=pagetest&page=2&page_size=2")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(page["items"].as_array().unwrap().len(), 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn stock_never_goes_negative() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let response = app
        .post(
            &admin,
            "/api/inventory",
            json!({
                "name": "Nitrile gloves",
                "sku": "GLV-M",
                "quantity": 10,
                "unit": "box",
                "reorder_level": 4,
                "unit_cost": "7.25"
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let item: Value = response.json().await.unwrap();
    assert_eq!(item["low_stock"], false);
    let adjust = format!("/api/inventory/{}/adjust", item["item_id"].as_str().unwrap());

    let response = app
        .post(&admin, &adjust, json!({ "delta": -7, "reason": "used" }))
        .await;
    assert_eq!(response.status(), 200);
    let item: Value = response.json().await.unwrap();
    assert_eq!(item["quantity"], 3);
    assert_eq!(item["low_stock"], true);

    let response = app.post(&admin, &adjust, json!({ "delta": -4 })).await;
    assert_eq!(response.status(), 400);

    let low: Vec<Value> = app
        .get(&admin, "/api/inventory?low_stock=true")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(low.len(), 1);

    let duplicate = app
        .post(
            &admin,
            "/api/inventory",
            json!({ "name": "Gloves again", "sku": "GLV-M", "quantity": 1, "unit": "box" }),
        )
        .await;
    assert_eq!(duplicate.status(), 409);

    let summary: Value = app.get(&admin, "/api/dashboard").await.json().await.unwrap();
    assert_eq!(summary["low_stock_items"], 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn dentists_cannot_edit_or_reassign_other_treatments() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let (alice, alice_id) = app.staff_token(&admin, Role::Dentist).await;
    let (bob, bob_id) = app.staff_token(&admin, Role::Dentist).await;
    let patient = app.create_patient(&admin, "Crowned").await;

    let treatment: Value = app
        .post(
            &alice,
            "/api/treatments",
            json!({
                "patient_id": patient,
                "treatment_name": "Crown",
                "cost": "650.00",
                "treatment_date": "2030-06-02"
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let path = format!("/api/treatments/{}", treatment["treatment_id"].as_str().unwrap());

    let completed = json!({
        "patient_id": patient,
        "treatment_name": "Crown",
        "cost": "650.00",
        "status": "completed"
    });
    assert_eq!(app.put(&bob, &path, completed.clone()).await.status(), 404);

    let mut reassigned = completed.clone();
    reassigned["dentist_id"] = json!(bob_id);
    assert_eq!(app.put(&alice, &path, reassigned).await.status(), 403);

    let response = app.put(&alice, &path, completed).await;
    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["status"], "completed");
    assert_eq!(updated["dentist_id"], alice_id.to_string());
    assert_eq!(updated["treatment_date"], "2030-06-02");

    app.cleanup().await;
}
