use crate::support::*;
use axum::http::StatusCode;
use carebook::models::BookingStatus;
use serde_json::{json, Value};
use uuid::Uuid;

async fn book(app: &TestApp, patient: &Session, doctor: &Session) -> anyhow::Result<Value> {
    let response = app
        .post(
            "/api/appointments",
            Some(&patient.token),
            json!({
                "doctor_id": doctor.profile_id("doctor"),
                "scheduled_at": hours_from_now(48),
                "reason": "Chest pain"
            }),
        )
        .await?;
    anyhow::ensure!(
        response.status == StatusCode::CREATED,
        "booking failed: {} {}",
        response.status,
        String::from_utf8_lossy(&response.body)
    );
    Ok(response.json())
}

#[tokio::test]
async fn patient_books_pending_appointment() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let doctor = app.register_doctor("Dr. Heart").await?;
            let patient = app.register_patient("Pat").await?;

            let appointment = book(app, &patient, &doctor).await?;
            assert_eq!(appointment["status"], "pending");
            assert_eq!(appointment["patient"], patient.user_id());
            assert_eq!(appointment["doctor"], doctor.profile_id("doctor"));
            assert_eq!(appointment["date"], appointment["scheduled_at"]);
            assert_eq!(appointment["_id"], appointment["id"]);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn booking_rules() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let doctor = app.register_doctor("Dr. Heart").await?;
            let patient = app.register_patient("Pat").await?;

            let past = app
                .post(
                    "/api/appointments",
                    Some(&patient.token),
                    json!({
                        "doctor_id": doctor.profile_id("doctor"),
                        "scheduled_at": hours_from_now(-2)
                    }),
                )
                .await?;
            assert_eq!(past.status, StatusCode::BAD_REQUEST);

            let as_doctor = app
                .post(
                    "/api/appointments",
                    Some(&doctor.token),
                    json!({
                        "doctor_id": doctor.profile_id("doctor"),
                        "scheduled_at": hours_from_now(2)
                    }),
                )
                .await?;
            assert_eq!(as_doctor.status, StatusCode::FORBIDDEN);

            app.patch("/api/doctors/me", Some(&doctor.token), json!({ "available": false }))
                .await?;
            let unavailable = app
                .post(
                    "/api/appointments",
                    Some(&patient.token),
                    json!({
                        "doctor_id": doctor.profile_id("doctor"),
                        "scheduled_at": hours_from_now(2)
                    }),
                )
                .await?;
            assert_eq!(unavailable.status, StatusCode::CONFLICT);

            let unknown = app
                .post(
                    "/api/appointments",
                    Some(&patient.token),
                    json!({
                        "doctor_id": uuid::Uuid::new_v4(),
                        "scheduled_at": hours_from_now(2)
                    }),
                )
                .await?;
            assert_eq!(unknown.status, StatusCode::NOT_FOUND);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn lists_are_scoped_and_populated() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let doctor = app.register_doctor("Dr. Heart").await?;
            let other_doctor = app.register_doctor("Dr. Other").await?;
            let alice = app.register_patient("Alice").await?;
            let bob = app.register_patient("Bob").await?;
            let admin = app.admin().await?;

            book(app, &alice, &doctor).await?;
            book(app, &bob, &doctor).await?;
            book(app, &bob, &other_doctor).await?;

            let mine = app.get("/api/appointments", Some(&alice.token)).await?;
            assert_eq!(mine.total_count(), Some(1));
            let first = mine.json()[0].clone();
            assert_eq!(first["patient"]["name"], "Alice");
            assert_eq!(first["doctor"]["specialization"], "Cardiology");
            assert_eq!(first["doctor"]["user"]["name"], "Dr. Heart");
            assert!(first["doctor"]["user"].get("role").is_none());

            let doctors_view = app.get("/api/appointments", Some(&doctor.token)).await?;
            assert_eq!(doctors_view.total_count(), Some(2));

            let all = app.get("/api/appointments", Some(&admin.token)).await?;
            assert_eq!(all.total_count(), Some(3));

            let filtered = app
                .get(
                    &format!("/api/appointments?patient={}", bob.user_id()),
                    Some(&admin.token),
                )
                .await?;
            assert_eq!(filtered.total_count(), Some(2));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn only_participants_see_an_appointment() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let doctor = app.register_doctor("Dr. Heart").await?;
            let other_doctor = app.register_doctor("Dr. Other").await?;
            let alice = app.register_patient("Alice").await?;
            let bob = app.register_patient("Bob").await?;

            let appointment = book(app, &alice, &doctor).await?;
            let path = format!("/api/appointments/{}", appointment["id"].as_str().unwrap_or_default());

            assert_eq!(app.get(&path, Some(&alice.token)).await?.status, StatusCode::OK);
            assert_eq!(app.get(&path, Some(&doctor.token)).await?.status, StatusCode::OK);
            assert_eq!(app.get(&path, Some(&bob.token)).await?.status, StatusCode::FORBIDDEN);
            assert_eq!(
                app.get(&path, Some(&other_doctor.token)).await?.status,
                StatusCode::FORBIDDEN
            );

            let missing = app
                .get(&format!("/api/appointments/{}", uuid::Uuid::new_v4()), Some(&alice.token))
                .await?;
            assert_eq!(missing.status, StatusCode::NOT_FOUND);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn status_transitions_follow_the_lifecycle() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let doctor = app.register_doctor("Dr. Heart").await?;
            let patient = app.register_patient("Pat").await?;
            let appointment = book(app, &patient, &doctor).await?;
            let path = format!(
                "/api/appointments/{}/status",
                appointment["id"].as_str().unwrap_or_default()
            );

            let patient_confirms = app
                .patch(&path, Some(&patient.token), json!({ "status": "confirmed" }))
                .await?;
            assert_eq!(patient_confirms.status, StatusCode::FORBIDDEN);

            let skip = app
                .patch(&path, Some(&doctor.token), json!({ "status": "completed" }))
                .await?;
            assert_eq!(skip.status, StatusCode::CONFLICT);
            assert_eq!(skip.json()["error"], "invalid_transition");

            let confirmed = app
                .patch(
                    &path,
                    Some(&doctor.token),
                    json!({ "status": "confirmed", "notes": "Bring previous ECG" }),
                )
                .await?;
            assert_eq!(confirmed.status, StatusCode::OK);
            assert_eq!(confirmed.json()["status"], "confirmed");
            assert_eq!(confirmed.json()["notes"], "Bring previous ECG");

            let completed = app
                .patch(&path, Some(&doctor.token), json!({ "status": "completed" }))
                .await?;
            assert_eq!(completed.json()["status"], "completed");

            let late_cancel = app
                .patch(&path, Some(&patient.token), json!({ "status": "cancelled" }))
                .await?;
            assert_eq!(late_cancel.status, StatusCode::CONFLICT);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn patient_can_cancel_and_admin_can_delete() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let doctor = app.register_doctor("Dr. Heart").await?;
            let patient = app.register_patient("Pat").await?;
            let admin = app.admin().await?;
            let appointment = book(app, &patient, &doctor).await?;
            let id = appointment["id"].as_str().unwrap_or_default().to_string();

            let cancelled = app
                .patch(
                    &format!("/api/appointments/{id}/status"),
                    Some(&patient.token),
                    json!({ "status": "cancelled" }),
                )
                .await?;
            assert_eq!(cancelled.json()["status"], "cancelled");

            let path = format!("/api/appointments/{id}");
            assert_eq!(
                app.delete(&path, Some(&patient.token)).await?.status,
                StatusCode::FORBIDDEN
            );
            assert_eq!(
                app.delete(&path, Some(&admin.token)).await?.status,
                StatusCode::NO_CONTENT
            );
            assert_eq!(
                app.delete(&path, Some(&admin.token)).await?.status,
                StatusCode::NOT_FOUND
            );
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn racing_cancel_and_confirm_never_revive_a_cancelled_appointment() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let doctor = app.register_doctor("Dr. Heart").await?;
            let patient = app.register_patient("Pat").await?;

            for _ in 0..10 {
                let appointment = book(app, &patient, &doctor).await?;
                let id = appointment["id"].as_str().unwrap_or_default().to_string();
                let path = format!("/api/appointments/{id}/status");

                let (cancel, confirm) = tokio::join!(
                    app.patch(&path, Some(&patient.token), json!({ "status": "cancelled" })),
                    app.patch(&path, Some(&doctor.token), json!({ "status": "confirmed" })),
                );
                let (cancel, confirm) = (cancel?, confirm?);

                for response in [&cancel, &confirm] {
                    assert!(
                        response.status == StatusCode::OK
                            || (response.status == StatusCode::CONFLICT
                                && response.json()["error"] == "invalid_transition"),
                        "unexpected {} {}",
                        response.status,
                        String::from_utf8_lossy(&response.body)
                    );
                }

                let stored = app
                    .get(&format!("/api/appointments/{id}"), Some(&patient.token))
                    .await?
                    .json();
                if cancel.status == StatusCode::OK {
                    assert_eq!(stored["status"], "cancelled");
                } else {
                    assert_eq!(stored["status"], "confirmed");
                }
            }
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn stale_status_update_is_refused() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let doctor = app.register_doctor("Dr. Heart").await?;
            let patient = app.register_patient("Pat").await?;
            let appointment = book(app, &patient, &doctor).await?;
            let id: Uuid = appointment["id"].as_str().unwrap_or_default().parse()?;

            let cancelled = app
                .patch(
                    &format!("/api/appointments/{id}/status"),
                    Some(&patient.token),
                    json!({ "status": "cancelled" }),
                )
                .await?;
            assert_eq!(cancelled.status, StatusCode::OK);

            // A writer that still believes the appointment is pending.
            let repo = &app.state.repos.appointments;
            let stale = repo
                .set_status(id, BookingStatus::Pending, BookingStatus::Confirmed, None)
                .await?;
            assert!(stale.is_none());

            let stored = repo.get(id).await?.expect("appointment exists");
            assert_eq!(stored.status, BookingStatus::Cancelled);
            Ok(())
        })
    })
    .await
}
