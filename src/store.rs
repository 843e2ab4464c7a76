//! Persistence collaborator for survey responses.
//!
//! The core only talks to [`ResponseStore`]. The Postgres implementation
//! lives in `db_storage`; [`LocalResponseStore`] is the append-only local
//! alternative, selected with `STORAGE_BACKEND=local`.

use crate::errors::{AppError, ValidationError};
use crate::models::*;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Persists one validated response. The store assigns `id` and
    /// `created_at`.
    async fn insert_response(&self, response: NewSurveyResponse)
        -> Result<SurveyResponse, AppError>;

    /// Every response joined with its survey, newest first.
    async fn list_responses(&self) -> Result<Vec<ResponseWithSurvey>, AppError>;

    async fn find_response(&self, id: Uuid) -> Result<Option<ResponseWithSurvey>, AppError>;

    /// Survey definitions ordered by title.
    async fn list_surveys(&self) -> Result<Vec<Survey>, AppError>;

    /// Whether `user_id` holds a grant for `role`.
    async fn has_role(&self, user_id: Uuid, role: AppRole) -> Result<bool, AppError>;

    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}

/// The 422 both stores answer when `surveyId` names no known survey.
pub fn unknown_survey(survey_id: Uuid) -> AppError {
    AppError::Validation(
        ValidationError::new(
            "surveyId",
            format!("Survey {} does not exist", survey_id),
        )
        .into(),
    )
}

/// Append-only response list kept in memory, optionally journaled to a
/// JSON-lines file so it survives restarts.
pub struct LocalResponseStore {
    records: RwLock<Vec<SurveyResponse>>,
    surveys: Vec<Survey>,
    admin_user_ids: HashSet<Uuid>,
    journal: Option<PathBuf>,
}

impl LocalResponseStore {
    pub fn in_memory() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            surveys: Vec::new(),
            admin_user_ids: HashSet::new(),
            journal: None,
        }
    }

    /// Opens (or starts) a journal at `path`, replaying existing records.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        let mut records = Vec::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                for (line_no, line) in content.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let record: SurveyResponse = serde_json::from_str(line).map_err(|e| {
                        AppError::Persistence(format!(
                            "Corrupt journal entry at {}:{}: {}",
                            path.display(),
                            line_no + 1,
                            e
                        ))
                    })?;
                    records.push(record);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(AppError::Persistence(format!(
                    "Failed to read journal {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        tracing::info!(
            "Local response journal {} loaded ({} records)",
            path.display(),
            records.len()
        );

        Ok(Self {
            records: RwLock::new(records),
            journal: Some(path),
            ..Self::in_memory()
        })
    }

    pub fn with_surveys(mut self, surveys: Vec<Survey>) -> Self {
        self.surveys = surveys;
        self
    }

    /// Reads survey definitions from a JSON array of `{id, title, status}`.
    pub async fn load_surveys(path: impl AsRef<Path>) -> Result<Vec<Survey>, AppError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::InternalError(format!("Failed to read surveys {}: {}", path.display(), e))
        })?;
        let surveys: Vec<Survey> = serde_json::from_str(&content).map_err(|e| {
            AppError::InternalError(format!("Invalid surveys file {}: {}", path.display(), e))
        })?;

        tracing::info!("Loaded {} surveys from {}", surveys.len(), path.display());
        Ok(surveys)
    }

    pub fn with_admins(mut self, user_ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.admin_user_ids.extend(user_ids);
        self
    }

    async fn append_to_journal(path: &Path, record: &SurveyResponse) -> Result<(), AppError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| AppError::InternalError(format!("Failed to encode record: {}", e)))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| {
                AppError::Persistence(format!("Failed to open journal {}: {}", path.display(), e))
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to append record: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to flush journal: {}", e)))?;
        Ok(())
    }

    fn join(&self, response: &SurveyResponse, surveys: &HashMap<Uuid, &Survey>) -> ResponseWithSurvey {
        let survey = response
            .survey_id
            .and_then(|id| surveys.get(&id))
            .map(|s| SurveySummary {
                title: s.title.clone(),
                status: s.status.clone(),
            });
        ResponseWithSurvey {
            response: response.clone(),
            survey,
        }
    }

    fn survey_index(&self) -> HashMap<Uuid, &Survey> {
        self.surveys.iter().map(|s| (s.id, s)).collect()
    }
}

#[async_trait]
impl ResponseStore for LocalResponseStore {
    async fn insert_response(
        &self,
        response: NewSurveyResponse,
    ) -> Result<SurveyResponse, AppError> {
        if let Some(survey_id) = response.survey_id {
            if !self.surveys.iter().any(|s| s.id == survey_id) {
                return Err(unknown_survey(survey_id));
            }
        }

        let record = SurveyResponse::from_new(Uuid::new_v4(), Utc::now(), response);

        // Held across the journal write so lines land in insertion order
        let mut records = self.records.write().await;
        if let Some(path) = &self.journal {
            Self::append_to_journal(path, &record).await?;
        }
        records.push(record.clone());

        tracing::debug!("Stored response {} ({} total)", record.id, records.len());
        Ok(record)
    }

    async fn list_responses(&self) -> Result<Vec<ResponseWithSurvey>, AppError> {
        let records = self.records.read().await;
        let surveys = self.survey_index();

        // Newest first; equal timestamps keep reverse insertion order
        let mut listed: Vec<ResponseWithSurvey> = records
            .iter()
            .rev()
            .map(|r| self.join(r, &surveys))
            .collect();
        listed.sort_by(|a, b| b.response.created_at.cmp(&a.response.created_at));
        Ok(listed)
    }

    async fn find_response(&self, id: Uuid) -> Result<Option<ResponseWithSurvey>, AppError> {
        let records = self.records.read().await;
        let surveys = self.survey_index();
        Ok(records
            .iter()
            .find(|r| r.id == id)
            .map(|r| self.join(r, &surveys)))
    }

    async fn list_surveys(&self) -> Result<Vec<Survey>, AppError> {
        let mut surveys = self.surveys.clone();
        surveys.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(surveys)
    }

    async fn has_role(&self, user_id: Uuid, role: AppRole) -> Result<bool, AppError> {
        Ok(role == AppRole::Admin && self.admin_user_ids.contains(&user_id))
    }

    fn backend_name(&self) -> &'static str {
        if self.journal.is_some() {
            "local-journal"
        } else {
            "memory"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn new_response(service: &str, survey_id: Option<Uuid>) -> NewSurveyResponse {
        NewSurveyResponse {
            client_type: ClientType::Business,
            date_of_transaction: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            sex: Sex::Male,
            age: Some(40),
            region: Some("NCR".to_string()),
            service_availed: service.to_string(),
            cc1: Some(CharterAwareness::Unaware),
            cc2: None,
            cc3: None,
            ratings: [Rating::new(3); SQD_COUNT],
            suggestions: None,
            email: None,
            survey_id,
        }
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_joined() {
        let survey = Survey {
            id: Uuid::new_v4(),
            title: "CSM 2024".to_string(),
            status: "active".to_string(),
        };
        let store = LocalResponseStore::in_memory().with_surveys(vec![survey.clone()]);

        store
            .insert_response(new_response("Cedula", Some(survey.id)))
            .await
            .unwrap();
        store
            .insert_response(new_response("Building Permit", None))
            .await
            .unwrap();

        let listed = store.list_responses().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].response.service_availed, "Building Permit");
        assert!(listed[0].survey.is_none());
        assert_eq!(listed[1].survey.as_ref().unwrap().title, "CSM 2024");
    }

    #[tokio::test]
    async fn test_dangling_survey_reference_is_rejected() {
        let store = LocalResponseStore::in_memory();
        let dangling = Uuid::new_v4();

        let err = store
            .insert_response(new_response("Cedula", Some(dangling)))
            .await
            .unwrap_err();
        match err {
            AppError::Validation(errors) => {
                assert_eq!(errors.first().field, "surveyId");
                assert!(errors.first().reason.contains(&dangling.to_string()));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(store.list_responses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_surveys_loaded_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surveys.json");
        let permits = Uuid::new_v4();
        let annual = Uuid::new_v4();
        tokio::fs::write(
            &path,
            serde_json::json!([
                {"id": permits, "title": "Permits Desk", "status": "active"},
                {"id": annual, "title": "Annual CSM 2024", "status": "closed"}
            ])
            .to_string(),
        )
        .await
        .unwrap();

        let surveys = LocalResponseStore::load_surveys(&path).await.unwrap();
        let store = LocalResponseStore::in_memory().with_surveys(surveys);

        let titles: Vec<String> = store
            .list_surveys()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["Annual CSM 2024", "Permits Desk"]);

        let saved = store
            .insert_response(new_response("Building Permit", Some(permits)))
            .await
            .unwrap();
        let found = store.find_response(saved.id).await.unwrap().unwrap();
        assert_eq!(found.survey.unwrap().title, "Permits Desk");
    }

    #[tokio::test]
    async fn test_unreadable_surveys_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalResponseStore::load_surveys(dir.path().join("missing.json"))
            .await
            .is_err());

        let path = dir.path().join("surveys.json");
        tokio::fs::write(&path, "{\"title\": \"not a list\"}").await.unwrap();
        assert!(LocalResponseStore::load_surveys(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_journal_replays_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responses.jsonl");

        let saved = {
            let store = LocalResponseStore::open(&path).await.unwrap();
            store
                .insert_response(new_response("Cedula", None))
                .await
                .unwrap()
        };

        let reopened = LocalResponseStore::open(&path).await.unwrap();
        let found = reopened.find_response(saved.id).await.unwrap().unwrap();
        assert_eq!(found.response, saved);
        assert_eq!(reopened.backend_name(), "local-journal");
    }

    #[tokio::test]
    async fn test_corrupt_journal_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responses.jsonl");
        tokio::fs::write(&path, "{not json}\n").await.unwrap();

        let err = LocalResponseStore::open(&path).await.err().unwrap();
        assert!(matches!(err, AppError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_admin_grants() {
        let admin = Uuid::new_v4();
        let store = LocalResponseStore::in_memory().with_admins([admin]);

        assert!(store.has_role(admin, AppRole::Admin).await.unwrap());
        assert!(!store.has_role(admin, AppRole::User).await.unwrap());
        assert!(!store.has_role(Uuid::new_v4(), AppRole::Admin).await.unwrap());
    }
}
