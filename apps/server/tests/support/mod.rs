#![allow(dead_code)]

pub mod fixtures;
pub mod shared;

use anyhow::Context as _;
use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use carebook::{
    api::create_router,
    auth::hash_password,
    models::NewUser,
    state::AppStateOptions,
    AppState, Config,
};
use futures::FutureExt as _;
use serde_json::{json, Value};
use sqlx::Connection as _;
use tower::ServiceExt as _;
use url::Url;
use uuid::Uuid;

pub use fixtures::*;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    schema: String,
    admin_database_url: String,
}

/// A logged-in user: bearer token plus the returned user document.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: Value,
}

impl Session {
    pub fn user_id(&self) -> &str {
        self.user["id"].as_str().unwrap_or_default()
    }

    /// Profile id of a doctor or pharmacist session.
    pub fn profile_id(&self, role: &str) -> &str {
        self.user[role]["id"].as_str().unwrap_or_default()
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn total_count(&self) -> Option<i64> {
        self.headers
            .get("x-total-count")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }
}

impl TestApp {
    /// `None` when no test database is configured.
    pub async fn new() -> anyhow::Result<Option<Self>> {
        Self::new_with_config(|_| {}).await
    }

    pub async fn new_with_config(
        configure: impl FnOnce(&mut Config),
    ) -> anyhow::Result<Option<Self>> {
        let Some(shared) = shared::shared().await? else {
            return Ok(None);
        };
        let mut config = shared.base_config.clone();
        configure(&mut config);

        // Per-test schema and DB pool.
        let admin_database_url = config.database.url.clone();

        let schema = format!("test_{}", Uuid::new_v4().simple());
        let mut admin_conn = sqlx::PgConnection::connect(&admin_database_url)
            .await
            .context("connect admin db for schema create")?;
        sqlx::query(&format!(r#"CREATE SCHEMA "{}""#, schema))
            .execute(&mut admin_conn)
            .await
            .context("create test schema")?;

        config.database.url = with_search_path(&admin_database_url, &schema)?;
        config.database.pool_min_size = 0;
        // Each test owns a pool and a schema; keep pools small for parallel runs.
        config.database.pool_max_size = 2;
        config.database.pool_timeout_seconds = 30;
        config.database.statement_timeout_seconds = 30;

        let state = AppState::new_with_options(
            config,
            AppStateOptions {
                run_migrations: true,
                lazy_pool: false,
            },
        )
        .await
        .context("initialize AppState")?;

        let router = create_router(state.clone());

        Ok(Some(Self {
            router,
            state,
            schema,
            admin_database_url,
        }))
    }

    pub async fn cleanup(self) -> anyhow::Result<()> {
        self.state.db_pool.close().await;

        let mut admin_conn = sqlx::PgConnection::connect(&self.admin_database_url)
            .await
            .context("connect admin db for schema drop")?;
        sqlx::query(&format!(r#"DROP SCHEMA "{}" CASCADE"#, self.schema))
            .execute(&mut admin_conn)
            .await
            .context("drop test schema")?;

        Ok(())
    }

    pub async fn request(
        &self,
        method: Method,
        path_and_query: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> anyhow::Result<TestResponse> {
        let mut builder = Request::builder()
            .method(method)
            .uri(path_and_query)
            .header(header::HOST, "example.org")
            .header(header::ACCEPT, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?)),
            None => builder.body(Body::empty()),
        }
        .context("build request")?;

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .context("dispatch request")?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .context("read response body")?;

        Ok(TestResponse {
            status,
            headers,
            body,
        })
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> anyhow::Result<TestResponse> {
        self.request(Method::GET, path, token, None).await
    }

    pub async fn post(
        &self,
        path: &str,
        token: Option<&str>,
        body: Value,
    ) -> anyhow::Result<TestResponse> {
        self.request(Method::POST, path, token, Some(body)).await
    }

    pub async fn patch(
        &self,
        path: &str,
        token: Option<&str>,
        body: Value,
    ) -> anyhow::Result<TestResponse> {
        self.request(Method::PATCH, path, token, Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> anyhow::Result<TestResponse> {
        self.request(Method::DELETE, path, token, None).await
    }

    /// Register through the API and return the session it hands back.
    pub async fn register(&self, payload: Value) -> anyhow::Result<Session> {
        let response = self.post("/api/auth/register", None, payload).await?;
        anyhow::ensure!(
            response.status == StatusCode::CREATED,
            "register failed: {} {}",
            response.status,
            String::from_utf8_lossy(&response.body)
        );
        session_from(response.json())
    }

    pub async fn register_patient(&self, name: &str) -> anyhow::Result<Session> {
        self.register(patient_registration(name)).await
    }

    pub async fn register_doctor(&self, name: &str) -> anyhow::Result<Session> {
        self.register(doctor_registration(name, "Cardiology")).await
    }

    pub async fn register_pharmacist(&self, name: &str) -> anyhow::Result<Session> {
        self.register(pharmacist_registration(name)).await
    }

    /// Admins cannot self-register; create one through the repository.
    pub async fn admin(&self) -> anyhow::Result<Session> {
        let new: NewUser = serde_json::from_value(json!({
            "name": "Ada Admin",
            "email": unique_email("admin"),
            "password": PASSWORD,
            "role": "admin"
        }))?;
        let hash = hash_password(PASSWORD.to_string()).await?;
        let registration = self.state.repos.users.register(&new, &hash).await?;
        let token = self.state.auth.issue_token(&registration.user)?;
        let user = carebook::db::to_document(&carebook::db::users::USERS, &registration.user)?;
        Ok(Session { token, user })
    }
}

fn session_from(body: Value) -> anyhow::Result<Session> {
    let token = body["token"]
        .as_str()
        .context("response has no token")?
        .to_string();
    Ok(Session {
        token,
        user: body["user"].clone(),
    })
}

pub async fn with_test_app<F>(f: F) -> anyhow::Result<()>
where
    F: for<'a> FnOnce(
        &'a TestApp,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + 'a>,
    >,
{
    with_test_app_with_config(|_| {}, f).await
}

pub async fn with_test_app_with_config<C, F>(configure: C, f: F) -> anyhow::Result<()>
where
    C: FnOnce(&mut Config),
    F: for<'a> FnOnce(
        &'a TestApp,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + 'a>,
    >,
{
    let Some(app) = TestApp::new_with_config(configure).await? else {
        eprintln!("skipping: no test database configured (set TEST_DATABASE_URL)");
        return Ok(());
    };

    let result = std::panic::AssertUnwindSafe(f(&app)).catch_unwind().await;
    let cleanup_result = app.cleanup().await;

    if let Err(e) = cleanup_result {
        eprintln!("test schema cleanup failed: {e:?}");
    }

    match result {
        Ok(r) => r,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

fn with_search_path(database_url: &str, schema: &str) -> anyhow::Result<String> {
    let mut url = Url::parse(database_url).context("parse database URL")?;
    url.query_pairs_mut()
        .append_pair("options", &format!("-c search_path={}", schema));
    Ok(url.to_string())
}
