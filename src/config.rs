use std::time::Duration;

use crate::db_storage::TableName;

pub const DEFAULT_API_BASE_URL: &str = "https://opendata.moph.go.th";
pub const DEFAULT_REPORT_TABLE: &str = "report_data";

/// Connection parameters for the PostgreSQL pool.
///
/// Either a complete `DATABASE_URL` or the individual `DB_*` parts; the URL
/// wins when both are present.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub user: Option<String>,
    pub host: String,
    pub database: Option<String>,
    pub password: Option<String>,
    pub port: u16,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DatabaseSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseSettings,
    pub port: u16,
    pub api_base_url: String,
    pub report_table: TableName,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Blank values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = DatabaseSettings {
            url: var("DATABASE_URL")
                .or_else(|| var("DB_URL"))
                .map(|url| {
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })
                .transpose()?,
            user: var("DB_USER"),
            host: var("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            database: var("DB_DATABASE"),
            password: var("DB_PASSWORD"),
            port: var("DB_PORT")
                .unwrap_or_else(|| "5432".to_string())
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_PORT must be a valid number between 1-65535"))?,
            max_connections: var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "10".to_string())
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a positive number"))?,
            acquire_timeout_secs: var("DB_ACQUIRE_TIMEOUT_SECS")
                .unwrap_or_else(|| "30".to_string())
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_ACQUIRE_TIMEOUT_SECS must be a number of seconds"))?,
        };

        let config = Self {
            database,
            port: var("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            api_base_url: {
                let url = var("API_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
                    .trim()
                    .to_string();
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    anyhow::bail!("API_BASE_URL must start with http:// or https://");
                }
                url
            },
            report_table: TableName::parse(
                &var("REPORT_TABLE").unwrap_or_else(|| DEFAULT_REPORT_TABLE.to_string()),
            )
            .map_err(|e| anyhow::anyhow!("REPORT_TABLE is invalid: {}", e))?,
        };

        // Never log the password
        tracing::debug!(
            "Database: {}",
            match config.database.url {
                Some(ref url) => format!("{}...", url.chars().take(20).collect::<String>()),
                None => format!(
                    "{}:{}/{}",
                    config.database.host,
                    config.database.port,
                    config.database.database.as_deref().unwrap_or("")
                ),
            }
        );
        tracing::debug!("Report API base URL: {}", config.api_base_url);
        tracing::debug!("Report table: {}", config.report_table);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
