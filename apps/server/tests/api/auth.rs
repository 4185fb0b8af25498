use crate::support::*;
use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn register_returns_token_and_aliased_user() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let response = app
                .post("/api/auth/register", None, patient_registration("Pat Patient"))
                .await?;
            assert_eq!(response.status, StatusCode::CREATED);

            let body = response.json();
            assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
            let user = &body["user"];
            assert_eq!(user["role"], "patient");
            assert_eq!(user["_id"], user["id"]);
            assert_eq!(user["createdAt"], user["created_at"]);
            assert!(user.get("password_hash").is_none());
            assert!(user.get("password").is_none());
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn login_and_me_round_trip() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let payload = doctor_registration("Dr. Who", "Neurology");
            let email = payload["email"].as_str().unwrap_or_default().to_string();
            app.register(payload).await?;

            let login = app
                .post(
                    "/api/auth/login",
                    None,
                    json!({ "email": email.to_uppercase(), "password": PASSWORD }),
                )
                .await?;
            assert_eq!(login.status, StatusCode::OK);
            let token = login.json()["token"].as_str().unwrap_or_default().to_string();

            let me = app.get("/api/auth/me", Some(&token)).await?;
            assert_eq!(me.status, StatusCode::OK);
            let me = me.json();
            assert_eq!(me["email"], email);
            assert_eq!(me["doctor"]["specialization"], "Neurology");
            assert_eq!(me["doctor"]["user"], me["id"]);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn bad_credentials_are_401() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let payload = patient_registration("Pat");
            let email = payload["email"].clone();
            app.register(payload).await?;

            let wrong = app
                .post(
                    "/api/auth/login",
                    None,
                    json!({ "email": email, "password": "not-the-password" }),
                )
                .await?;
            assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

            let unknown = app
                .post(
                    "/api/auth/login",
                    None,
                    json!({ "email": "nobody@example.org", "password": PASSWORD }),
                )
                .await?;
            assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
            assert_eq!(wrong.json()["message"], unknown.json()["message"]);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn registration_rules() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let payload = patient_registration("Pat");
            app.register(payload.clone()).await?;
            let duplicate = app.post("/api/auth/register", None, payload).await?;
            assert_eq!(duplicate.status, StatusCode::CONFLICT);

            let mut admin = patient_registration("Mallory");
            admin["role"] = json!("admin");
            let admin = app.post("/api/auth/register", None, admin).await?;
            assert_eq!(admin.status, StatusCode::FORBIDDEN);

            let mut doctor = doctor_registration("Dr. Missing", "Surgery");
            if let Some(fields) = doctor.as_object_mut() {
                fields.remove("doctor");
            }
            let doctor = app.post("/api/auth/register", None, doctor).await?;
            assert_eq!(doctor.status, StatusCode::BAD_REQUEST);

            let mut short = patient_registration("Shorty");
            short["password"] = json!("short");
            let short = app.post("/api/auth/register", None, short).await?;
            assert_eq!(short.status, StatusCode::BAD_REQUEST);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn users_are_visible_to_admin_and_self_only() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let admin = app.admin().await?;
            let alice = app.register_patient("Alice").await?;
            let bob = app.register_patient("Bob").await?;

            let own = app
                .get(&format!("/api/users/{}", alice.user_id()), Some(&alice.token))
                .await?;
            assert_eq!(own.status, StatusCode::OK);

            let other = app
                .get(&format!("/api/users/{}", bob.user_id()), Some(&alice.token))
                .await?;
            assert_eq!(other.status, StatusCode::FORBIDDEN);

            let list = app.get("/api/users?role=patient", Some(&admin.token)).await?;
            assert_eq!(list.status, StatusCode::OK);
            assert_eq!(list.total_count(), Some(2));

            let updated = app
                .patch("/api/users/me", Some(&bob.token), json!({ "phone": "+15559999" }))
                .await?;
            assert_eq!(updated.status, StatusCode::OK);
            assert_eq!(updated.json()["phone"], "+15559999");

            let deleted = app
                .delete(&format!("/api/users/{}", bob.user_id()), Some(&admin.token))
                .await?;
            assert_eq!(deleted.status, StatusCode::NO_CONTENT);
            let gone = app
                .get(&format!("/api/users/{}", bob.user_id()), Some(&admin.token))
                .await?;
            assert_eq!(gone.status, StatusCode::NOT_FOUND);
            Ok(())
        })
    })
    .await
}
