use crate::circuit_breaker::{create_db_circuit_breaker, StoreCircuitBreaker};
use crate::errors::{AppError, ResultExt, ValidationError};
use crate::models::*;
use crate::store::{unknown_survey, ResponseStore};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use failsafe::futures::CircuitBreaker;
use sqlx::{FromRow, PgPool};
use std::future::Future;
use std::str::FromStr;
use uuid::Uuid;

const SELECT_RESPONSES: &str = r#"
    SELECT r.id, r.client_type, r.date_of_transaction, r.sex, r.age, r.region,
           r.service_availed, r.cc1, r.cc2, r.cc3,
           r.sqd0, r.sqd1, r.sqd2, r.sqd3, r.sqd4, r.sqd5, r.sqd6, r.sqd7, r.sqd8,
           r.suggestions, r.email, r.survey_id, r.created_at,
           s.title AS survey_title, s.status AS survey_status
    FROM survey_responses r
    LEFT JOIN surveys s ON s.id = r.survey_id
"#;

/// Raw `survey_responses` row joined with its survey.
#[derive(Debug, FromRow)]
struct ResponseRow {
    id: Uuid,
    client_type: String,
    date_of_transaction: NaiveDate,
    sex: String,
    age: Option<i16>,
    region: Option<String>,
    service_availed: String,
    cc1: Option<String>,
    cc2: Option<String>,
    cc3: Option<String>,
    sqd0: Option<i16>,
    sqd1: Option<i16>,
    sqd2: Option<i16>,
    sqd3: Option<i16>,
    sqd4: Option<i16>,
    sqd5: Option<i16>,
    sqd6: Option<i16>,
    sqd7: Option<i16>,
    sqd8: Option<i16>,
    suggestions: Option<String>,
    email: Option<String>,
    survey_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    survey_title: Option<String>,
    survey_status: Option<String>,
}

fn parse_label<T: FromStr<Err = UnknownLabel>>(id: Uuid, label: &str) -> Result<T, AppError> {
    label
        .parse()
        .map_err(|e: UnknownLabel| AppError::InternalError(format!("Response {}: {}", id, e)))
}

fn parse_optional<T: FromStr<Err = UnknownLabel>>(
    id: Uuid,
    label: Option<&str>,
) -> Result<Option<T>, AppError> {
    label.map(|l| parse_label(id, l)).transpose()
}

fn parse_rating(id: Uuid, value: Option<i16>) -> Result<Option<Rating>, AppError> {
    value
        .map(|v| {
            Rating::try_from(v)
                .map_err(|e| AppError::InternalError(format!("Response {}: {}", id, e)))
        })
        .transpose()
}

impl TryFrom<ResponseRow> for ResponseWithSurvey {
    type Error = AppError;

    fn try_from(row: ResponseRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let survey = match (row.survey_title, row.survey_status) {
            (Some(title), Some(status)) => Some(SurveySummary { title, status }),
            _ => None,
        };

        Ok(ResponseWithSurvey {
            response: SurveyResponse {
                id,
                client_type: parse_label(id, &row.client_type)?,
                date_of_transaction: row.date_of_transaction,
                sex: parse_label(id, &row.sex)?,
                age: row.age,
                region: row.region,
                service_availed: row.service_availed,
                cc1: parse_optional(id, row.cc1.as_deref())?,
                cc2: parse_optional(id, row.cc2.as_deref())?,
                cc3: parse_optional(id, row.cc3.as_deref())?,
                sqd0: parse_rating(id, row.sqd0)?,
                sqd1: parse_rating(id, row.sqd1)?,
                sqd2: parse_rating(id, row.sqd2)?,
                sqd3: parse_rating(id, row.sqd3)?,
                sqd4: parse_rating(id, row.sqd4)?,
                sqd5: parse_rating(id, row.sqd5)?,
                sqd6: parse_rating(id, row.sqd6)?,
                sqd7: parse_rating(id, row.sqd7)?,
                sqd8: parse_rating(id, row.sqd8)?,
                suggestions: row.suggestions,
                email: row.email,
                survey_id: row.survey_id,
                created_at: row.created_at,
            },
            survey,
        })
    }
}

/// Whether a query error says the database is unhealthy. Constraint
/// violations come from the submitted data and leave the breaker alone.
fn is_outage(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => !(db.is_foreign_key_violation() || db.is_check_violation()),
        _ => true,
    }
}

/// `survey_responses_service_availed_check` -> `serviceAvailed`.
fn constraint_field(constraint: &str) -> String {
    let Some(column) = constraint
        .strip_prefix("survey_responses_")
        .and_then(|c| c.strip_suffix("_check"))
    else {
        return "response".to_string();
    };

    let mut parts = column.split('_');
    let mut field = parts.next().unwrap_or_default().to_string();
    for part in parts {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            field.extend(first.to_uppercase());
            field.push_str(chars.as_str());
        }
    }
    field
}

/// Turns a constraint the insert tripped into a 422 the client can act on.
fn rejected_insert(err: &sqlx::Error, survey_id: Option<Uuid>) -> Option<AppError> {
    let sqlx::Error::Database(db) = err else {
        return None;
    };

    if db.is_foreign_key_violation() {
        return Some(match survey_id {
            Some(id) => unknown_survey(id),
            None => AppError::Validation(
                ValidationError::new("surveyId", "Survey reference does not exist").into(),
            ),
        });
    }
    if db.is_check_violation() {
        let field = db
            .constraint()
            .map(constraint_field)
            .unwrap_or_else(|| "response".to_string());
        return Some(AppError::Validation(
            ValidationError::new(field, "Value rejected by the database").into(),
        ));
    }
    None
}

/// Failed writes are 503s: the respondent can resubmit once the database
/// is back.
fn write_failure(operation: &str, err: failsafe::Error<sqlx::Error>) -> AppError {
    match err {
        failsafe::Error::Rejected => {
            AppError::Persistence("database circuit open, failing fast".to_string())
        }
        failsafe::Error::Inner(e) => AppError::Persistence(format!("{} failed: {}", operation, e)),
    }
}

/// Runs `query` through the breaker, counting only outages as failures.
async fn through_breaker<T, F>(
    breaker: &StoreCircuitBreaker,
    query: F,
) -> Result<T, failsafe::Error<sqlx::Error>>
where
    F: Future<Output = Result<T, sqlx::Error>> + Send,
{
    breaker.call_with(is_outage, query).await
}

/// Postgres-backed response store.
///
/// Every query runs through a circuit breaker so an unreachable database
/// fails fast instead of queueing submissions behind pool timeouts.
/// Submissions that break a constraint are answered with 422 and do not
/// count towards opening it.
pub struct PgResponseStore {
    pool: PgPool,
    breaker: StoreCircuitBreaker,
}

impl PgResponseStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            breaker: create_db_circuit_breaker(),
        }
    }

    async fn guarded<T, F>(&self, operation: &str, query: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match through_breaker(&self.breaker, query).await {
            Ok(value) => Ok(value),
            Err(failsafe::Error::Rejected) => Err(AppError::Persistence(format!(
                "{}: database circuit open, failing fast",
                operation
            ))),
            Err(failsafe::Error::Inner(e)) => Err(e).context(operation),
        }
    }
}

#[async_trait]
impl ResponseStore for PgResponseStore {
    async fn insert_response(
        &self,
        response: NewSurveyResponse,
    ) -> Result<SurveyResponse, AppError> {
        if let Some(survey_id) = response.survey_id {
            let lookup = sqlx::query_as::<_, (Uuid,)>("SELECT id FROM surveys WHERE id = $1")
                .bind(survey_id)
                .fetch_optional(&self.pool);
            let known = through_breaker(&self.breaker, lookup)
                .await
                .map_err(|e| write_failure("survey lookup", e))?;
            if known.is_none() {
                return Err(unknown_survey(survey_id));
            }
        }

        let [sqd0, sqd1, sqd2, sqd3, sqd4, sqd5, sqd6, sqd7, sqd8] =
            response.ratings.map(|r| r.map(i16::from));

        let query = sqlx::query_as::<_, (Uuid, DateTime<Utc>)>(
            r#"
            INSERT INTO survey_responses (
                client_type, date_of_transaction, sex, age, region, service_availed,
                cc1, cc2, cc3,
                sqd0, sqd1, sqd2, sqd3, sqd4, sqd5, sqd6, sqd7, sqd8,
                suggestions, email, survey_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21)
            RETURNING id, created_at
            "#,
        )
        .bind(response.client_type.as_str())
        .bind(response.date_of_transaction)
        .bind(response.sex.as_str())
        .bind(response.age)
        .bind(response.region.as_deref())
        .bind(&response.service_availed)
        .bind(response.cc1.map(|c| c.as_str()))
        .bind(response.cc2.map(|c| c.as_str()))
        .bind(response.cc3.map(|c| c.as_str()))
        .bind(sqd0)
        .bind(sqd1)
        .bind(sqd2)
        .bind(sqd3)
        .bind(sqd4)
        .bind(sqd5)
        .bind(sqd6)
        .bind(sqd7)
        .bind(sqd8)
        .bind(response.suggestions.as_deref())
        .bind(response.email.as_deref())
        .bind(response.survey_id)
        .fetch_one(&self.pool);

        let (id, created_at) = through_breaker(&self.breaker, query)
            .await
            .map_err(|e| match e {
                failsafe::Error::Inner(e) => match rejected_insert(&e, response.survey_id) {
                    Some(rejected) => {
                        tracing::warn!("Submission rejected by constraint: {}", e);
                        rejected
                    }
                    None => write_failure("insert into survey_responses", failsafe::Error::Inner(e)),
                },
                rejected => write_failure("insert into survey_responses", rejected),
            })?;

        tracing::info!("Stored survey response {}", id);
        Ok(SurveyResponse::from_new(id, created_at, response))
    }

    async fn list_responses(&self) -> Result<Vec<ResponseWithSurvey>, AppError> {
        let sql = format!("{} ORDER BY r.created_at DESC", SELECT_RESPONSES);
        let rows = self
            .guarded(
                "listing survey responses",
                sqlx::query_as::<_, ResponseRow>(&sql).fetch_all(&self.pool),
            )
            .await?;

        rows.into_iter().map(ResponseWithSurvey::try_from).collect()
    }

    async fn find_response(&self, id: Uuid) -> Result<Option<ResponseWithSurvey>, AppError> {
        let sql = format!("{} WHERE r.id = $1", SELECT_RESPONSES);
        let row = self
            .guarded(
                "loading survey response",
                sqlx::query_as::<_, ResponseRow>(&sql)
                    .bind(id)
                    .fetch_optional(&self.pool),
            )
            .await?;

        row.map(ResponseWithSurvey::try_from).transpose()
    }

    async fn list_surveys(&self) -> Result<Vec<Survey>, AppError> {
        let rows = self
            .guarded(
                "listing surveys",
                sqlx::query_as::<_, (Uuid, String, String)>(
                    "SELECT id, title, status FROM surveys ORDER BY title",
                )
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, title, status)| Survey { id, title, status })
            .collect())
    }

    async fn has_role(&self, user_id: Uuid, role: AppRole) -> Result<bool, AppError> {
        let grant = self
            .guarded(
                "checking role grant",
                sqlx::query_as::<_, (Uuid,)>(
                    "SELECT user_id FROM user_roles WHERE user_id = $1 AND role = $2 LIMIT 1",
                )
                .bind(user_id)
                .bind(role.as_str())
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(grant.is_some())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
