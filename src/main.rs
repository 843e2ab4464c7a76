use csm_survey_api::auth_client::{RemoteSessionVerifier, SessionVerifier};
use csm_survey_api::config::{Config, StorageBackend};
use csm_survey_api::db::Database;
use csm_survey_api::db_storage::PgResponseStore;
use csm_survey_api::handlers::AppState;
use csm_survey_api::obs;
use csm_survey_api::routes::{self, MAX_BODY_BYTES};
use csm_survey_api::store::{LocalResponseStore, ResponseStore};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::limit::RequestBodyLimitLayer;

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn ResponseStore>> {
    let store: Arc<dyn ResponseStore> = match &config.storage {
        StorageBackend::Postgres { database_url } => {
            let db = Database::new(database_url).await?;
            tracing::info!("Database connection pool established");
            Arc::new(PgResponseStore::new(db.pool))
        }
        StorageBackend::Local { path, surveys_path } => {
            let local = match path {
                Some(path) => LocalResponseStore::open(path)
                    .await
                    .map_err(|e| anyhow::anyhow!("{}", e))?,
                None => {
                    tracing::warn!("LOCAL_STORE_PATH not set; responses are kept in memory only");
                    LocalResponseStore::in_memory()
                }
            };
            let surveys = match surveys_path {
                Some(surveys_path) => LocalResponseStore::load_surveys(surveys_path)
                    .await
                    .map_err(|e| anyhow::anyhow!("{}", e))?,
                None => {
                    tracing::warn!(
                        "LOCAL_SURVEYS_PATH not set; submissions naming a survey will be rejected"
                    );
                    Vec::new()
                }
            };
            Arc::new(
                local
                    .with_surveys(surveys)
                    .with_admins(config.admin_user_ids.iter().copied()),
            )
        }
    };
    Ok(store)
}

/// Main entry point for the application.
///
/// Loads configuration, opens the configured response store, connects the
/// auth client and serves the public form and admin dashboard.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing();

    let config = Config::from_env()?;

    let store = open_store(&config).await?;
    tracing::info!("Response store ready: {}", store.backend_name());

    let session_verifier: Option<Arc<dyn SessionVerifier>> = match &config.auth_base_url {
        Some(base_url) => {
            match RemoteSessionVerifier::new(base_url.clone(), config.auth_api_key.clone()) {
                Ok(client) => {
                    tracing::info!("✓ Auth client initialized: {}", base_url);
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::error!("Failed to initialize auth client: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    let app_state = Arc::new(AppState::new(store, config.clone(), session_verifier));
    tracing::info!(
        "Session cache initialized ({}s TTL)",
        config.session_cache_ttl_secs
    );

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let api = routes::api_routes().layer(
        ServiceBuilder::new()
            // Request size limit: a submission is a few KiB at most
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
            // Rate limiting per client IP
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    // Health and docs bypass the rate limiter
    let app = routes::build_app(api, app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
