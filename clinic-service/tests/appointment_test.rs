//! Booking, slot conflicts and dentist scoping.

mod common;

use clinic_service::models::Role;
use common::TestApp;
use serde_json::{json, Value};
use uuid::Uuid;

fn booking(patient_id: Uuid, dentist_id: Uuid, start: &str, minutes: i32) -> Value {
    json!({
        "patient_id": patient_id,
        "dentist_id": dentist_id,
        "appointment_date": "2030-05-14",
        "start_time": start,
        "duration_minutes": minutes
    })
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn overlapping_booking_is_rejected() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let (_, dentist_id) = app.staff_token(&admin, Role::Dentist).await;
    let (desk, _) = app.staff_token(&admin, Role::Receptionist).await;
    let patient = app.create_patient(&desk, "Overlap").await;

    let first = app
        .post(&desk, "/api/appointments", booking(patient, dentist_id, "09:00:00", 30))
        .await;
    assert_eq!(first.status(), 201);
    let first: Value = first.json().await.unwrap();
    assert_eq!(first["status"], "scheduled");
    assert_eq!(first["patient_name"], "Test Overlap");

    let clash = app
        .post(&desk, "/api/appointments", booking(patient, dentist_id, "09:15:00", 30))
        .await;
    assert_eq!(clash.status(), 409);
    let clash: Value = clash.json().await.unwrap();
    assert_eq!(clash["error"], "Dentist already has an appointment in that time slot");

    let back_to_back = app
        .post(&desk, "/api/appointments", booking(patient, dentist_id, "09:30:00", 30))
        .await;
    assert_eq!(back_to_back.status(), 201);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn cancelled_appointment_frees_the_slot() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let (_, dentist_id) = app.staff_token(&admin, Role::Dentist).await;
    let patient = app.create_patient(&admin, "Cancelled").await;

    let booked: Value = app
        .post(&admin, "/api/appointments", booking(patient, dentist_id, "14:00:00", 60))
        .await
        .json()
        .await
        .unwrap();
    let id = booked["appointment_id"].as_str().unwrap();

    let response = app
        .patch(
            &admin,
            &format!("/api/appointments/{}/status", id),
            json!({ "status": "cancelled" }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let rebooked = app
        .post(&admin, "/api/appointments", booking(patient, dentist_id, "14:30:00", 30))
        .await;
    assert_eq!(rebooked.status(), 201);

    // Reinstating the cancelled booking now collides with the new one.
    let response = app
        .patch(
            &admin,
            &format!("/api/appointments/{}/status", id),
            json!({ "status": "confirmed" }),
        )
        .await;
    assert_eq!(response.status(), 409);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn appointments_must_end_the_same_day() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let (_, dentist_id) = app.staff_token(&admin, Role::Dentist).await;
    let patient = app.create_patient(&admin, "Midnight").await;

    let response = app
        .post(&admin, "/api/appointments", booking(patient, dentist_id, "23:30:00", 60))
        .await;
    assert_eq!(response.status(), 400);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn booking_requires_an_active_dentist() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let (_, receptionist_id) = app.staff_token(&admin, Role::Receptionist).await;
    let patient = app.create_patient(&admin, "NotADentist").await;

    let response = app
        .post(
            &admin,
            "/api/appointments",
            booking(patient, receptionist_id, "10:00:00", 30),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "dentist_id must reference an active dentist");

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn dentists_only_see_their_own_schedule() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let (alice, alice_id) = app.staff_token(&admin, Role::Dentist).await;
    let (bob, _) = app.staff_token(&admin, Role::Dentist).await;
    let patient = app.create_patient(&admin, "Scoped").await;

    // A dentist may omit dentist_id and books for themselves.
    let response = app
        .post(
            &alice,
            "/api/appointments",
            json!({
                "patient_id": patient,
                "appointment_date": "2030-05-15",
                "start_time": "11:00:00",
                "duration_minutes": 45
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let booked: Value = response.json().await.unwrap();
    assert_eq!(booked["dentist_id"], alice_id.to_string());
    let path = format!("/api/appointments/{}", booked["appointment_id"].as_str().unwrap());

    assert_eq!(app.get(&alice, &path).await.status(), 200);
    assert_eq!(app.get(&bob, &path).await.status(), 404);
    assert_eq!(app.delete(&bob, &path).await.status(), 404);

    let listed: Vec<Value> = app
        .get(&bob, "/api/appointments?date=2030-05-15")
        .await
        .json()
        .await
        .unwrap();
    assert!(listed.is_empty());

    let listed: Vec<Value> = app
        .get(&admin, "/api/appointments?date=2030-05-15")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn dentists_cannot_edit_or_reassign_other_schedules() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let (alice, alice_id) = app.staff_token(&admin, Role::Dentist).await;
    let (bob, bob_id) = app.staff_token(&admin, Role::Dentist).await;
    let patient = app.create_patient(&admin, "Reassigned").await;

    let booked: Value = app
        .post(&admin, "/api/appointments", booking(patient, alice_id, "14:00:00", 30))
        .await
        .json()
        .await
        .unwrap();
    let path = format!("/api/appointments/{}", booked["appointment_id"].as_str().unwrap());

    let moved = json!({
        "patient_id": patient,
        "appointment_date": "2030-05-14",
        "start_time": "15:00:00",
        "duration_minutes": 30
    });
    assert_eq!(app.put(&bob, &path, moved.clone()).await.status(), 404);

    let response = app
        .put(&alice, &path, booking(patient, bob_id, "15:00:00", 30))
        .await;
    assert_eq!(response.status(), 403);

    let response = app.put(&alice, &path, moved).await;
    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["dentist_id"], alice_id.to_string());
    assert_eq!(updated["start_time"], "15:00:00");

    app.cleanup().await;
}
