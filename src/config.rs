use crate::models::FormVariant;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::path::PathBuf;
use uuid::Uuid;

/// Where survey responses are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { database_url: String },
    /// Append-only local store; journaled when a path is given. Survey
    /// definitions come from a JSON file when `surveys_path` is set.
    Local {
        path: Option<PathBuf>,
        surveys_path: Option<PathBuf>,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub storage: StorageBackend,
    /// GoTrue-compatible auth server. Admin routes reject every request
    /// when unset.
    pub auth_base_url: Option<String>,
    pub auth_api_key: Option<String>,
    /// Admin grants for the local store.
    pub admin_user_ids: Vec<Uuid>,
    pub form_variant: FormVariant,
    /// Offset used to decide what "today" is for transaction dates.
    pub utc_offset_hours: i32,
    pub session_cache_ttl_secs: u64,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

/// First 20 characters of a connection URL, for logs.
fn url_prefix(url: &str) -> String {
    url.chars().take(20).collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let storage = match non_empty("STORAGE_BACKEND")
            .unwrap_or_else(|| "postgres".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => StorageBackend::Postgres {
                database_url: non_empty("DATABASE_URL")
                    .or_else(|| non_empty("DB_URL"))
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "DATABASE_URL or DB_URL environment variable required for postgres storage"
                        )
                    })
                    .and_then(|url| {
                        if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                            anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                        }
                        Ok(url)
                    })?,
            },
            "local" => StorageBackend::Local {
                path: non_empty("LOCAL_STORE_PATH").map(PathBuf::from),
                surveys_path: non_empty("LOCAL_SURVEYS_PATH").map(PathBuf::from),
            },
            other => anyhow::bail!("STORAGE_BACKEND must be 'postgres' or 'local', got '{}'", other),
        };

        let config = Self {
            port: non_empty("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            storage,
            auth_base_url: non_empty("AUTH_BASE_URL")
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("AUTH_BASE_URL must start with http:// or https://");
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })
                .transpose()?,
            auth_api_key: non_empty("AUTH_API_KEY"),
            admin_user_ids: non_empty("ADMIN_USER_IDS")
                .map(|ids| {
                    ids.split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(|id| {
                            Uuid::parse_str(id).map_err(|_| {
                                anyhow::anyhow!("ADMIN_USER_IDS contains an invalid UUID: {}", id)
                            })
                        })
                        .collect::<anyhow::Result<Vec<_>>>()
                })
                .transpose()?
                .unwrap_or_default(),
            form_variant: non_empty("FORM_VARIANT")
                .map(|v| v.parse::<FormVariant>())
                .transpose()
                .map_err(|_| anyhow::anyhow!("FORM_VARIANT must be 'strict' or 'lenient'"))?
                .unwrap_or_default(),
            utc_offset_hours: non_empty("SERVICE_UTC_OFFSET_HOURS")
                .unwrap_or_else(|| "8".to_string())
                .parse()
                .ok()
                .filter(|h: &i32| (-12..=14).contains(h))
                .ok_or_else(|| {
                    anyhow::anyhow!("SERVICE_UTC_OFFSET_HOURS must be a whole number between -12 and 14")
                })?,
            session_cache_ttl_secs: non_empty("SESSION_CACHE_TTL_SECS")
                .unwrap_or_else(|| "60".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SESSION_CACHE_TTL_SECS must be a number of seconds"))?,
            rate_limit_per_second: non_empty("RATE_LIMIT_PER_SECOND")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .ok()
                .filter(|n: &u64| *n > 0)
                .ok_or_else(|| anyhow::anyhow!("RATE_LIMIT_PER_SECOND must be a positive number"))?,
            rate_limit_burst: non_empty("RATE_LIMIT_BURST")
                .unwrap_or_else(|| "20".to_string())
                .parse()
                .ok()
                .filter(|n: &u32| *n > 0)
                .ok_or_else(|| anyhow::anyhow!("RATE_LIMIT_BURST must be a positive number"))?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        match &config.storage {
            StorageBackend::Postgres { database_url } => tracing::debug!(
                "Database URL: {}...",
                url_prefix(database_url)
            ),
            StorageBackend::Local { path, surveys_path } => tracing::debug!(
                "Local store path: {:?}, surveys: {:?}",
                path,
                surveys_path
            ),
        }
        match &config.auth_base_url {
            Some(url) => tracing::debug!("Auth server: {}", url),
            None => tracing::warn!("AUTH_BASE_URL not set; admin routes will reject all requests"),
        }
        tracing::debug!("Form variant: {:?}", config.form_variant);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Today's date in the service time zone.
    pub fn today(&self) -> NaiveDate {
        self.today_at(Utc::now())
    }

    /// The service-zone calendar date of the instant `now`.
    pub fn today_at(&self, now: DateTime<Utc>) -> NaiveDate {
        let offset = FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or(Utc.fix());
        now.with_timezone(&offset).date_naive()
    }

    /// A memory-backed configuration with no auth server, for tests and
    /// local runs.
    pub fn local() -> Self {
        Self {
            port: 3000,
            storage: StorageBackend::Local {
                path: None,
                surveys_path: None,
            },
            auth_base_url: None,
            auth_api_key: None,
            admin_user_ids: Vec::new(),
            form_variant: FormVariant::Strict,
            utc_offset_hours: 8,
            session_cache_ttl_secs: 60,
            rate_limit_per_second: 5,
            rate_limit_burst: 20,
        }
    }
}
