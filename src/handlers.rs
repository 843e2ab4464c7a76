use crate::auth::require_admin;
use crate::auth_client::SessionVerifier;
use crate::catalog::{self, FormOptions};
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::filters::{ResponseFilter, ResponseFilterParams};
use crate::form::{FormFields, SurveyForm};
use crate::models::*;
use crate::stats::{self, SatisfactionSummary};
use crate::store::ResponseStore;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Where responses, surveys and role grants live.
    pub store: Arc<dyn ResponseStore>,
    /// Application configuration.
    pub config: Config,
    /// Auth server client. Admin routes reject every request when absent.
    pub session_verifier: Option<Arc<dyn SessionVerifier>>,
    /// Token fingerprint -> verified user.
    pub session_cache: Cache<String, AuthUser>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ResponseStore>,
        config: Config,
        session_verifier: Option<Arc<dyn SessionVerifier>>,
    ) -> Self {
        let session_cache = Cache::builder()
            .time_to_live(Duration::from_secs(config.session_cache_ttl_secs))
            .max_capacity(10_000)
            .build();

        Self {
            store,
            config,
            session_verifier,
            session_cache,
        }
    }
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "csm-survey-api",
            "version": env!("CARGO_PKG_VERSION"),
            "storage": state.store.backend_name(),
        })),
    )
}

/// GET /api/v1/form/options
pub async fn form_options(State(state): State<Arc<AppState>>) -> Json<FormOptions> {
    Json(catalog::form_options(state.config.form_variant))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub id: Uuid,
    pub status: &'static str,
    pub submitted_at: DateTime<Utc>,
}

/// POST /api/v1/responses
///
/// Accepts the flat form record, runs it through the submit transition and
/// answers 201 with the stored id. Validation failures come back as 422
/// naming the first offending field; nothing is stored in that case. A body
/// that is not a form record at all is a 400.
pub async fn submit_response(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FormFields>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmissionReceipt>), AppError> {
    let Json(mut fields) = payload.map_err(|rejection| {
        AppError::BadRequest(format!("Invalid survey submission: {}", rejection.body_text()))
    })?;
    tracing::info!(
        "POST /responses - service: {:?}, client type: {:?}",
        fields.service_availed,
        fields.client_type
    );

    // Same pre-fill the form applies
    let today = state.config.today();
    if fields.date.trim().is_empty() {
        fields.date = FormFields::starting_on(today).date;
    }

    let mut form = SurveyForm::with_fields(state.config.form_variant, fields);
    let saved = form.submit(state.store.as_ref(), today).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmissionReceipt {
            id: saved.id,
            status: "submitted",
            submitted_at: saved.created_at,
        }),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseListing {
    /// Number of responses before filtering.
    pub total: usize,
    /// Number of responses that matched.
    pub showing: usize,
    pub responses: Vec<ResponseWithSurvey>,
}

/// Fetches everything and applies the filter. Both counts are returned so
/// the dashboard can render "showing X of Y".
async fn filtered_responses(
    state: &AppState,
    params: ResponseFilterParams,
) -> Result<(usize, Vec<ResponseWithSurvey>), AppError> {
    let filter = ResponseFilter::try_from(params)?;
    let all = state
        .store
        .list_responses()
        .await
        .context("Failed to load responses for the dashboard")?;

    let total = all.len();
    let matched = if filter.is_empty() {
        all
    } else {
        filter.apply(&all).into_iter().cloned().collect()
    };

    Ok((total, matched))
}

/// GET /api/v1/admin/responses
pub async fn list_responses(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ResponseFilterParams>,
) -> Result<Json<ResponseListing>, AppError> {
    let session = require_admin(&state, &headers).await?;
    tracing::info!("GET /admin/responses by {} - {:?}", session.user.id, params);

    let (total, responses) = filtered_responses(&state, params).await?;
    tracing::info!("Showing {} of {} responses", responses.len(), total);

    Ok(Json(ResponseListing {
        total,
        showing: responses.len(),
        responses,
    }))
}

/// GET /api/v1/admin/responses/:id
pub async fn get_response(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ResponseWithSurvey>, AppError> {
    require_admin(&state, &headers).await?;
    tracing::info!("GET /admin/responses/{}", id);

    let response = state
        .store
        .find_response(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Response {} not found", id)))?;

    Ok(Json(response))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub total: usize,
    pub showing: usize,
    pub summary: SatisfactionSummary,
}

/// GET /api/v1/admin/stats
///
/// Aggregates over the same filtered set the listing shows.
pub async fn response_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ResponseFilterParams>,
) -> Result<Json<StatsReport>, AppError> {
    require_admin(&state, &headers).await?;
    tracing::info!("GET /admin/stats - {:?}", params);

    let (total, responses) = filtered_responses(&state, params).await?;
    let summary = stats::summarize(&responses);

    tracing::debug!(
        "Stats over {} responses: average {}, satisfaction {}%",
        summary.total_responses,
        summary.average_rating,
        summary.satisfaction_rate
    );

    Ok(Json(StatsReport {
        total,
        showing: responses.len(),
        summary,
    }))
}

/// GET /api/v1/admin/surveys
pub async fn list_surveys(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Survey>>, AppError> {
    require_admin(&state, &headers).await?;
    let surveys = state.store.list_surveys().await?;
    Ok(Json(surveys))
}
