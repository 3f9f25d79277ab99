use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

use crate::config::DatabaseSettings;

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout())
            .after_connect(|_conn, _meta| {
                Box::pin(async move {
                    tracing::info!("Successfully connected to PostgreSQL database.");
                    Ok(())
                })
            })
            .connect_with(connect_options(settings)?)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Closes the pool, waiting for checked-out connections to come back.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database pool has been closed.");
    }
}

fn connect_options(settings: &DatabaseSettings) -> anyhow::Result<PgConnectOptions> {
    if let Some(ref url) = settings.url {
        return Ok(url.parse::<PgConnectOptions>()?);
    }

    let mut options = PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port);
    if let Some(ref user) = settings.user {
        options = options.username(user);
    }
    if let Some(ref password) = settings.password {
        options = options.password(password);
    }
    if let Some(ref database) = settings.database {
        options = options.database(database);
    }

    Ok(options)
}
