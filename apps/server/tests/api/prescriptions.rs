use crate::support::*;
use axum::http::StatusCode;
use serde_json::{json, Value};

fn medications() -> Value {
    json!([
        { "name": "Atorvastatin", "dosage": "20mg", "frequency": "nightly", "duration": "90 days" },
        { "name": "Aspirin", "dosage": "75mg", "frequency": "daily" }
    ])
}

async fn issue(app: &TestApp, doctor: &Session, patient: &Session) -> anyhow::Result<Value> {
    let response = app
        .post(
            "/api/prescriptions",
            Some(&doctor.token),
            json!({
                "patient_id": patient.user_id(),
                "medications": medications(),
                "instructions": "Take with water"
            }),
        )
        .await?;
    anyhow::ensure!(
        response.status == StatusCode::CREATED,
        "issue failed: {} {}",
        response.status,
        String::from_utf8_lossy(&response.body)
    );
    Ok(response.json())
}

#[tokio::test]
async fn doctor_issues_and_patient_reads() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let doctor = app.register_doctor("Dr. Heart").await?;
            let patient = app.register_patient("Pat").await?;

            let prescription = issue(app, &doctor, &patient).await?;
            assert_eq!(prescription["status"], "active");
            assert_eq!(prescription["patient"], patient.user_id());
            assert_eq!(prescription["doctor"], doctor.profile_id("doctor"));
            assert_eq!(prescription["medications"], medications());
            assert!(prescription["pharmacist"].is_null());

            let id = prescription["id"].as_str().unwrap_or_default();
            let read = app
                .get(&format!("/api/prescriptions/{id}"), Some(&patient.token))
                .await?;
            assert_eq!(read.status, StatusCode::OK);
            let read = read.json();
            assert_eq!(read["patient"]["name"], "Pat");
            assert_eq!(read["doctor"]["user"]["name"], "Dr. Heart");
            assert_eq!(read["medications"][0]["name"], "Atorvastatin");

            let listed = app.get("/api/prescriptions", Some(&patient.token)).await?;
            assert_eq!(listed.total_count(), Some(1));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn issuing_rules() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let doctor = app.register_doctor("Dr. Heart").await?;
            let other_doctor = app.register_doctor("Dr. Other").await?;
            let patient = app.register_patient("Pat").await?;
            let pharmacist = app.register_pharmacist("Phil").await?;

            let by_patient = app
                .post(
                    "/api/prescriptions",
                    Some(&patient.token),
                    json!({ "patient_id": patient.user_id(), "medications": medications() }),
                )
                .await?;
            assert_eq!(by_patient.status, StatusCode::FORBIDDEN);

            let to_pharmacist = app
                .post(
                    "/api/prescriptions",
                    Some(&doctor.token),
                    json!({ "patient_id": pharmacist.user_id(), "medications": medications() }),
                )
                .await?;
            assert_eq!(to_pharmacist.status, StatusCode::BAD_REQUEST);

            let empty = app
                .post(
                    "/api/prescriptions",
                    Some(&doctor.token),
                    json!({ "patient_id": patient.user_id(), "medications": [] }),
                )
                .await?;
            assert_eq!(empty.status, StatusCode::BAD_REQUEST);

            // An appointment with another doctor cannot back this prescription.
            let appointment = app
                .post(
                    "/api/appointments",
                    Some(&patient.token),
                    json!({
                        "doctor_id": other_doctor.profile_id("doctor"),
                        "scheduled_at": hours_from_now(24)
                    }),
                )
                .await?
                .json();
            let mismatched = app
                .post(
                    "/api/prescriptions",
                    Some(&doctor.token),
                    json!({
                        "patient_id": patient.user_id(),
                        "appointment_id": appointment["id"],
                        "medications": medications()
                    }),
                )
                .await?;
            assert_eq!(mismatched.status, StatusCode::BAD_REQUEST);

            let matched = app
                .post(
                    "/api/prescriptions",
                    Some(&other_doctor.token),
                    json!({
                        "patient_id": patient.user_id(),
                        "appointment_id": appointment["id"],
                        "medications": medications()
                    }),
                )
                .await?;
            assert_eq!(matched.status, StatusCode::CREATED);
            assert_eq!(matched.json()["appointment"], appointment["id"]);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn pharmacist_dispenses_once() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let doctor = app.register_doctor("Dr. Heart").await?;
            let patient = app.register_patient("Pat").await?;
            let pharmacist = app.register_pharmacist("Phil").await?;
            let prescription = issue(app, &doctor, &patient).await?;
            let id = prescription["id"].as_str().unwrap_or_default().to_string();

            let all = app.get("/api/prescriptions", Some(&pharmacist.token)).await?;
            assert_eq!(all.total_count(), Some(1));

            let by_patient = app
                .patch(&format!("/api/prescriptions/{id}/dispense"), Some(&patient.token), json!({}))
                .await?;
            assert_eq!(by_patient.status, StatusCode::FORBIDDEN);

            let dispensed = app
                .patch(
                    &format!("/api/prescriptions/{id}/dispense"),
                    Some(&pharmacist.token),
                    json!({}),
                )
                .await?;
            assert_eq!(dispensed.status, StatusCode::OK);
            let dispensed = dispensed.json();
            assert_eq!(dispensed["status"], "dispensed");
            assert_eq!(dispensed["pharmacist"], pharmacist.profile_id("pharmacist"));
            assert!(dispensed["dispensedAt"].is_string());

            let again = app
                .patch(
                    &format!("/api/prescriptions/{id}/dispense"),
                    Some(&pharmacist.token),
                    json!({}),
                )
                .await?;
            assert_eq!(again.status, StatusCode::CONFLICT);

            let cancel = app
                .patch(&format!("/api/prescriptions/{id}/cancel"), Some(&doctor.token), json!({}))
                .await?;
            assert_eq!(cancel.status, StatusCode::CONFLICT);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn only_the_issuing_doctor_cancels() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let doctor = app.register_doctor("Dr. Heart").await?;
            let other_doctor = app.register_doctor("Dr. Other").await?;
            let patient = app.register_patient("Pat").await?;
            let prescription = issue(app, &doctor, &patient).await?;
            let id = prescription["id"].as_str().unwrap_or_default().to_string();
            let path = format!("/api/prescriptions/{id}/cancel");

            let stranger = app.patch(&path, Some(&other_doctor.token), json!({})).await?;
            assert_eq!(stranger.status, StatusCode::FORBIDDEN);

            let hidden = app
                .get(&format!("/api/prescriptions/{id}"), Some(&other_doctor.token))
                .await?;
            assert_eq!(hidden.status, StatusCode::FORBIDDEN);

            let cancelled = app.patch(&path, Some(&doctor.token), json!({})).await?;
            assert_eq!(cancelled.status, StatusCode::OK);
            assert_eq!(cancelled.json()["status"], "cancelled");
            Ok(())
        })
    })
    .await
}
