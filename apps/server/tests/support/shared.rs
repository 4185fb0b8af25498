use anyhow::Context as _;
use carebook::Config;
use std::sync::Arc;
use tokio::sync::OnceCell;

static SHARED: OnceCell<Option<Arc<SharedTestResources>>> = OnceCell::const_new();

pub struct SharedTestResources {
    pub base_config: Config,
}

/// Shared test configuration, or `None` when no test database is configured
/// (`CAREBOOK__DATABASE__TEST_DATABASE_URL` or `TEST_DATABASE_URL`).
pub async fn shared() -> anyhow::Result<Option<Arc<SharedTestResources>>> {
    SHARED
        .get_or_try_init(|| async {
            init_tracing();

            let mut config = Config::load().context("load Config for tests")?;
            let url = config
                .database
                .test_database_url
                .clone()
                .or_else(|| std::env::var("TEST_DATABASE_URL").ok());
            let Some(url) = url else {
                return Ok(None);
            };
            config.database.url = url;

            // DB pool sizing for per-test pools (TestApp overrides per schema).
            config.database.pool_min_size = 0;
            config.database.pool_max_size = 5;
            config.database.pool_timeout_seconds = 30;
            config.auth.jwt_secret = "integration-test-secret-with-at-least-32-bytes".to_string();

            Ok(Some(Arc::new(SharedTestResources {
                base_config: config,
            })))
        })
        .await
        .cloned()
}

fn init_tracing() {
    use std::sync::OnceLock;
    use tracing_subscriber::prelude::*;
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "carebook=info,sqlx=warn".into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    });
}
