use crate::support::*;
use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn doctor_directory_is_public_and_populated() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let cardio = app.register_doctor("Dr. Heart").await?;
            app.register(doctor_registration("Dr. Skin", "Dermatology"))
                .await?;

            let list = app.get("/api/doctors", None).await?;
            assert_eq!(list.status, StatusCode::OK);
            assert_eq!(list.total_count(), Some(2));

            let doctors = list.json();
            let doctors = doctors.as_array().cloned().unwrap_or_default();
            // Default sort is by specialization.
            assert_eq!(doctors[0]["specialization"], "Cardiology");
            assert_eq!(doctors[1]["specialization"], "Dermatology");

            let first = &doctors[0];
            assert_eq!(first["_id"], first["id"]);
            assert_eq!(first["fees"], 8000);
            assert_eq!(first["experience"], 12);
            assert_eq!(first["user_id"], cardio.user_id());
            let user = first["user"].as_object().cloned().unwrap_or_default();
            assert_eq!(user["name"], "Dr. Heart");
            assert!(user.contains_key("email"));
            assert!(user.contains_key("phone"));
            assert!(!user.contains_key("role"));
            assert!(!user.contains_key("address"));

            let one = app
                .get(&format!("/api/doctors/{}", cardio.profile_id("doctor")), None)
                .await?;
            assert_eq!(one.status, StatusCode::OK);
            assert_eq!(one.json()["user"]["name"], "Dr. Heart");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn doctor_list_filters_sorts_and_selects() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            app.register(doctor_registration("Dr. A", "Cardiology")).await?;
            app.register(doctor_registration("Dr. B", "Dermatology")).await?;
            app.register(doctor_registration("Dr. C", "Oncology")).await?;

            let filtered = app.get("/api/doctors?specialization=Oncology", None).await?;
            assert_eq!(filtered.total_count(), Some(1));
            assert_eq!(filtered.json()[0]["specialization"], "Oncology");

            let by_in = app
                .get(
                    "/api/doctors?specialization%5B%24in%5D=Oncology%2CCardiology&sort=-specialization",
                    None,
                )
                .await?;
            let docs = by_in.json();
            assert_eq!(docs.as_array().map(Vec::len), Some(2));
            assert_eq!(docs[0]["specialization"], "Oncology");

            let paged = app.get("/api/doctors?limit=1&skip=1", None).await?;
            assert_eq!(paged.total_count(), Some(3));
            assert_eq!(paged.json()[0]["specialization"], "Dermatology");

            let selected = app.get("/api/doctors?select=specialization", None).await?;
            let first = selected.json()[0].clone();
            assert!(first.get("specialization").is_some());
            assert!(first.get("bio").is_none());
            assert!(first.get("id").is_some());

            let bad = app.get("/api/doctors?sort=shoe_size", None).await?;
            assert_eq!(bad.status, StatusCode::BAD_REQUEST);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn doctors_update_their_own_profile() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let doctor = app.register_doctor("Dr. Busy").await?;
            let patient = app.register_patient("Pat").await?;

            let updated = app
                .patch(
                    "/api/doctors/me",
                    Some(&doctor.token),
                    json!({ "available": false, "consultation_fee": 9500 }),
                )
                .await?;
            assert_eq!(updated.status, StatusCode::OK);
            assert_eq!(updated.json()["available"], false);
            assert_eq!(updated.json()["fees"], 9500);

            let denied = app
                .patch("/api/doctors/me", Some(&patient.token), json!({ "bio": "hi" }))
                .await?;
            assert_eq!(denied.status, StatusCode::FORBIDDEN);

            let available = app.get("/api/doctors?available=true", None).await?;
            assert_eq!(available.total_count(), Some(0));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn pharmacist_directory_requires_login() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let pharmacist = app.register_pharmacist("Phil").await?;
            let patient = app.register_patient("Pat").await?;

            let anonymous = app.get("/api/pharmacists", None).await?;
            assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

            let list = app.get("/api/pharmacists", Some(&patient.token)).await?;
            assert_eq!(list.status, StatusCode::OK);
            let first = list.json()[0].clone();
            assert_eq!(first["pharmacyName"], "Corner Pharmacy");
            assert_eq!(first["user"]["name"], "Phil");

            let updated = app
                .patch(
                    "/api/pharmacists/me",
                    Some(&pharmacist.token),
                    json!({ "pharmacy_name": "Night Pharmacy" }),
                )
                .await?;
            assert_eq!(updated.status, StatusCode::OK);
            assert_eq!(updated.json()["pharmacyName"], "Night Pharmacy");
            Ok(())
        })
    })
    .await
}
