/// Public routes driven through the router with `oneshot`
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use async_trait::async_trait;
use axum::Router;
use csm_survey_api::config::Config;
use csm_survey_api::errors::AppError;
use csm_survey_api::handlers::AppState;
use csm_survey_api::models::*;
use csm_survey_api::routes::{api_routes, build_app};
use csm_survey_api::store::{LocalResponseStore, ResponseStore};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

/// Store whose database is unreachable: every write fails.
#[derive(Default)]
struct UnreachableStore {
    insert_attempts: AtomicUsize,
}

#[async_trait]
impl ResponseStore for UnreachableStore {
    async fn insert_response(
        &self,
        _response: NewSurveyResponse,
    ) -> Result<SurveyResponse, AppError> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::Persistence(
            "database circuit open, failing fast".to_string(),
        ))
    }

    async fn list_responses(&self) -> Result<Vec<ResponseWithSurvey>, AppError> {
        Ok(Vec::new())
    }

    async fn find_response(&self, _id: Uuid) -> Result<Option<ResponseWithSurvey>, AppError> {
        Ok(None)
    }

    async fn list_surveys(&self) -> Result<Vec<Survey>, AppError> {
        Ok(Vec::new())
    }

    async fn has_role(&self, _user_id: Uuid, _role: AppRole) -> Result<bool, AppError> {
        Ok(false)
    }

    fn backend_name(&self) -> &'static str {
        "unreachable"
    }
}

fn app_with(store: Arc<dyn ResponseStore>, variant: FormVariant) -> Router {
    let config = Config {
        form_variant: variant,
        ..Config::local()
    };
    build_app(api_routes(), Arc::new(AppState::new(store, config, None)))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn all_sqd(code: &str) -> serde_json::Map<String, Value> {
    (0..9)
        .map(|i| (format!("sqd{}", i), Value::from(code)))
        .collect()
}

#[tokio::test]
async fn test_health_reports_backend() {
    let app = app_with(Arc::new(LocalResponseStore::in_memory()), FormVariant::Strict);
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn test_form_options_reflect_variant() {
    let app = app_with(Arc::new(LocalResponseStore::in_memory()), FormVariant::Lenient);
    let request = Request::builder()
        .uri("/api/v1/form/options")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["variant"], "lenient");
    assert_eq!(body["sqdQuestions"].as_array().unwrap().len(), 9);
    assert_eq!(body["cc1"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_submit_unaware_citizen() {
    let store = Arc::new(LocalResponseStore::in_memory());
    let app = app_with(store.clone(), FormVariant::Strict);

    let mut payload = all_sqd("4");
    payload.insert("clientType".into(), json!("citizen"));
    payload.insert("sex".into(), json!("male"));
    payload.insert("serviceAvailed".into(), json!("Business Permit"));
    payload.insert("cc1".into(), json!("4"));
    payload.insert("cc2".into(), json!("3"));

    let (status, body) = send(app, post_json("/api/v1/responses", Value::Object(payload))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "submitted");

    let stored = store.list_responses().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(body["id"], stored[0].response.id.to_string());

    let record = serde_json::to_value(&stored[0]).unwrap();
    assert_eq!(record["cc1"], "No");
    assert!(record.get("cc2").is_none());
    assert!(record.get("cc3").is_none());
    assert_eq!(record["sqd0"], 4);
}

#[tokio::test]
async fn test_submit_rejects_invalid_record() {
    let store = Arc::new(LocalResponseStore::in_memory());
    let app = app_with(store.clone(), FormVariant::Strict);

    let mut payload = all_sqd("5");
    payload.insert("clientType".into(), json!("citizen"));
    payload.insert("sex".into(), json!("female"));
    payload.insert("serviceAvailed".into(), json!("Cedula"));
    payload.insert("cc1".into(), json!("2"));
    payload.insert("email".into(), json!("not-an-email"));
    payload.insert("age".into(), json!("130"));

    let (status, body) = send(app, post_json("/api/v1/responses", Value::Object(payload))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "age");
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["field"].as_str())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(store.list_responses().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_submit_rejects_oversized_service_text() {
    let store = Arc::new(LocalResponseStore::in_memory());
    let app = app_with(store, FormVariant::Lenient);

    let payload = json!({
        "clientType": "business",
        "sex": "male",
        "serviceAvailed": "x".repeat(201),
    });

    let (status, body) = send(app, post_json("/api/v1/responses", payload)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "serviceAvailed");
}

fn unaware_citizen() -> serde_json::Map<String, Value> {
    let mut payload = all_sqd("4");
    payload.insert("clientType".into(), json!("citizen"));
    payload.insert("sex".into(), json!("male"));
    payload.insert("serviceAvailed".into(), json!("Business Permit"));
    payload.insert("cc1".into(), json!("4"));
    payload
}

#[tokio::test]
async fn test_store_outage_is_503_and_nothing_saved() {
    let store = Arc::new(UnreachableStore::default());
    let app = app_with(store.clone(), FormVariant::Strict);

    let (status, body) = send(
        app,
        post_json("/api/v1/responses", Value::Object(unaware_citizen())),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Unable to save your response. Please try again.");
    assert_eq!(store.insert_attempts.load(Ordering::SeqCst), 1);
    assert!(store.list_responses().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_survey_is_422_and_repeatable() {
    let survey = Survey {
        id: Uuid::new_v4(),
        title: "Permits Desk".to_string(),
        status: "active".to_string(),
    };
    let store = Arc::new(LocalResponseStore::in_memory().with_surveys(vec![survey.clone()]));

    let mut payload = unaware_citizen();
    payload.insert("surveyId".into(), json!(Uuid::new_v4().to_string()));

    // Repeated bad references keep getting 422, never a 503
    for _ in 0..6 {
        let app = app_with(store.clone(), FormVariant::Strict);
        let (status, body) =
            send(app, post_json("/api/v1/responses", Value::Object(payload.clone()))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["field"], "surveyId");
    }
    assert!(store.list_responses().await.unwrap().is_empty());

    payload.insert("surveyId".into(), json!(survey.id.to_string()));
    let app = app_with(store.clone(), FormVariant::Strict);
    let (status, _) = send(app, post_json("/api/v1/responses", Value::Object(payload))).await;
    assert_eq!(status, StatusCode::CREATED);

    let stored = store.list_responses().await.unwrap();
    assert_eq!(stored[0].survey.as_ref().unwrap().title, "Permits Desk");
}

#[tokio::test]
async fn test_numeric_json_codes_accepted() {
    let store = Arc::new(LocalResponseStore::in_memory());
    let app = app_with(store.clone(), FormVariant::Strict);

    let mut payload = unaware_citizen();
    payload.insert("age".into(), json!(30));
    payload.insert("cc1".into(), json!(4));
    for i in 0..9 {
        payload.insert(format!("sqd{}", i), json!(5));
    }

    let (status, _) = send(app, post_json("/api/v1/responses", Value::Object(payload))).await;
    assert_eq!(status, StatusCode::CREATED);

    let stored = store.list_responses().await.unwrap();
    assert_eq!(stored[0].response.age, Some(30));
    assert_eq!(stored[0].response.sqd8.map(|r| r.value()), Some(5));
}

#[tokio::test]
async fn test_malformed_body_is_json_400() {
    let store = Arc::new(LocalResponseStore::in_memory());
    let app = app_with(store.clone(), FormVariant::Strict);

    let mut payload = unaware_citizen();
    payload.insert("age".into(), json!(true));

    let (status, body) = send(app, post_json("/api/v1/responses", Value::Object(payload))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid survey submission"));
    assert!(store.list_responses().await.unwrap().is_empty());
}
