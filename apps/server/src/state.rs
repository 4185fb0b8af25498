//! Shared application state

use anyhow::Context;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use std::{str::FromStr, sync::Arc, time::Duration};

use crate::{auth::AuthManager, config::DatabaseConfig, db::Repositories, Config};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: PgPool,
    pub auth: Arc<AuthManager>,
    pub repos: Repositories,
}

#[derive(Debug, Clone, Copy)]
pub struct AppStateOptions {
    pub run_migrations: bool,
    /// Create the pool without connecting. Requests that need the database
    /// fail at first use instead of at startup.
    pub lazy_pool: bool,
}

impl AppStateOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            run_migrations: config.database.run_migrations,
            lazy_pool: false,
        }
    }
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let options = AppStateOptions::from_config(&config);
        Self::new_with_options(config, options).await
    }

    pub async fn new_with_options(config: Config, options: AppStateOptions) -> anyhow::Result<Self> {
        let connect = connect_options(&config.database)?;
        let pool_options = pool_options(&config.database);

        let db_pool = if options.lazy_pool {
            pool_options.connect_lazy_with(connect)
        } else {
            pool_options
                .connect_with(connect)
                .await
                .context("Failed to connect to database")?
        };
        tracing::info!(
            max_connections = config.database.pool_max_size,
            lazy = options.lazy_pool,
            "Database pool created"
        );

        if options.run_migrations && !options.lazy_pool {
            run_migrations(&db_pool).await?;
        }

        Ok(Self::from_pool(config, db_pool))
    }

    pub fn from_pool(config: Config, db_pool: PgPool) -> Self {
        let auth = Arc::new(AuthManager::new(&config.auth));
        Self {
            repos: Repositories::new(db_pool.clone()),
            config: Arc::new(config),
            db_pool,
            auth,
        }
    }

    /// `SELECT 1` against the pool.
    pub async fn ping_database(&self) -> crate::Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.db_pool)
            .await?;
        Ok(())
    }
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");
    Ok(())
}

fn connect_options(config: &DatabaseConfig) -> anyhow::Result<PgConnectOptions> {
    let options = PgConnectOptions::from_str(&config.url).context("Invalid database URL")?;
    if config.statement_timeout_seconds == 0 {
        return Ok(options);
    }
    let timeout_ms = (config.statement_timeout_seconds * 1000).to_string();
    Ok(options.options([("statement_timeout", timeout_ms.as_str())]))
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .min_connections(config.pool_min_size)
        .max_connections(config.pool_max_size)
        .acquire_timeout(Duration::from_secs(config.pool_timeout_seconds))
}
