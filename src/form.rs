//! In-progress survey submission and its state machine.
//!
//! A `SurveyForm` holds every answer as a string, exactly as the form
//! controls produce them. Nothing is typed until submit, where the record
//! runs through the encoder and the validator before it reaches the store.

use crate::encoding::{self, CC1_UNAWARE_CODE};
use crate::errors::{AppError, ValidationErrors};
use crate::models::{CandidateResponse, FormVariant, NewSurveyResponse, SurveyResponse, SQD_COUNT};
use crate::store::ResponseStore;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Accepts a numeric code sent as a JSON number as well as a string.
fn code_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Whole(i64),
        Fraction(f64),
    }

    Ok(match Option::<Code>::deserialize(deserializer)? {
        Some(Code::Text(text)) => text,
        Some(Code::Whole(n)) => n.to_string(),
        Some(Code::Fraction(x)) => x.to_string(),
        None => String::new(),
    })
}

/// The flat record behind the form. Unanswered fields are empty strings.
/// Ages, CC codes and ratings may also arrive as JSON numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormFields {
    pub client_type: String,
    #[serde(alias = "dateOfTransaction")]
    pub date: String,
    pub sex: String,
    #[serde(deserialize_with = "code_or_number")]
    pub age: String,
    pub region: String,
    pub service_availed: String,
    #[serde(deserialize_with = "code_or_number")]
    pub cc1: String,
    #[serde(deserialize_with = "code_or_number")]
    pub cc2: String,
    #[serde(deserialize_with = "code_or_number")]
    pub cc3: String,
    #[serde(deserialize_with = "code_or_number")]
    pub sqd0: String,
    #[serde(deserialize_with = "code_or_number")]
    pub sqd1: String,
    #[serde(deserialize_with = "code_or_number")]
    pub sqd2: String,
    #[serde(deserialize_with = "code_or_number")]
    pub sqd3: String,
    #[serde(deserialize_with = "code_or_number")]
    pub sqd4: String,
    #[serde(deserialize_with = "code_or_number")]
    pub sqd5: String,
    #[serde(deserialize_with = "code_or_number")]
    pub sqd6: String,
    #[serde(deserialize_with = "code_or_number")]
    pub sqd7: String,
    #[serde(deserialize_with = "code_or_number")]
    pub sqd8: String,
    pub suggestions: String,
    pub email: String,
    pub survey_id: String,
}

impl FormFields {
    /// A blank record with the transaction date pre-filled.
    pub fn starting_on(today: NaiveDate) -> Self {
        Self {
            date: today.format(encoding::DATE_FORMAT).to_string(),
            ..Self::default()
        }
    }

    pub fn sqd_codes(&self) -> [&str; SQD_COUNT] {
        [
            &self.sqd0, &self.sqd1, &self.sqd2, &self.sqd3, &self.sqd4, &self.sqd5, &self.sqd6,
            &self.sqd7, &self.sqd8,
        ]
    }

    fn slot_mut(&mut self, field: &str) -> Option<&mut String> {
        let slot = match field {
            "clientType" => &mut self.client_type,
            "date" | "dateOfTransaction" => &mut self.date,
            "sex" => &mut self.sex,
            "age" => &mut self.age,
            "region" => &mut self.region,
            "serviceAvailed" => &mut self.service_availed,
            "cc1" => &mut self.cc1,
            "cc2" => &mut self.cc2,
            "cc3" => &mut self.cc3,
            "sqd0" => &mut self.sqd0,
            "sqd1" => &mut self.sqd1,
            "sqd2" => &mut self.sqd2,
            "sqd3" => &mut self.sqd3,
            "sqd4" => &mut self.sqd4,
            "sqd5" => &mut self.sqd5,
            "sqd6" => &mut self.sqd6,
            "sqd7" => &mut self.sqd7,
            "sqd8" => &mut self.sqd8,
            "suggestions" => &mut self.suggestions,
            "email" => &mut self.email,
            "surveyId" => &mut self.survey_id,
            _ => return None,
        };
        Some(slot)
    }
}

/// Whether the CC2/CC3 questions are shown for a given CC1 code.
pub fn charter_followups_visible(cc1_code: &str) -> bool {
    cc1_code.trim() != CC1_UNAWARE_CODE
}

/// Whether CC2/CC3 answers are carried into the submitted payload.
///
/// They are only meaningful once CC1 has been answered with an aware code.
pub fn charter_followups_submitted(cc1_code: &str) -> bool {
    !cc1_code.trim().is_empty() && charter_followups_visible(cc1_code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum FormState {
    Editing,
    Submitting,
    Submitted { id: Uuid },
}

/// One respondent's form. Owned by a single request; never shared.
#[derive(Debug, Clone)]
pub struct SurveyForm {
    fields: FormFields,
    variant: FormVariant,
    state: FormState,
    last_error: Option<ValidationErrors>,
}

impl SurveyForm {
    pub fn new(variant: FormVariant, today: NaiveDate) -> Self {
        Self::with_fields(variant, FormFields::starting_on(today))
    }

    pub fn with_fields(variant: FormVariant, fields: FormFields) -> Self {
        Self {
            fields,
            variant,
            state: FormState::Editing,
            last_error: None,
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn fields(&self) -> &FormFields {
        &self.fields
    }

    pub fn variant(&self) -> FormVariant {
        self.variant
    }

    /// The validation failure from the most recent submit, if any.
    pub fn last_error(&self) -> Option<&ValidationErrors> {
        self.last_error.as_ref()
    }

    /// Updates one answer. Only allowed while editing.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> Result<(), AppError> {
        if self.state != FormState::Editing {
            return Err(AppError::BadRequest(
                "This survey has already been submitted".to_string(),
            ));
        }
        let slot = self
            .fields
            .slot_mut(field)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown form field '{}'", field)))?;
        *slot = value.into();
        Ok(())
    }

    pub fn charter_followups_visible(&self) -> bool {
        charter_followups_visible(&self.fields.cc1)
    }

    /// The record as it will be encoded, with inapplicable CC answers dropped.
    pub fn payload(&self) -> FormFields {
        let mut payload = self.fields.clone();
        if !charter_followups_submitted(&payload.cc1) {
            payload.cc2.clear();
            payload.cc3.clear();
        }
        payload
    }

    /// Encodes and validates the current answers without changing state.
    pub fn prepare(&self, today: NaiveDate) -> Result<NewSurveyResponse, ValidationErrors> {
        let candidate: CandidateResponse = encoding::encode(&self.payload())?;
        crate::validation::validate(candidate, self.variant, today)
    }

    /// Runs the submit transition against `store`.
    ///
    /// On success the form is `Submitted` and refuses further submits. On
    /// any failure it returns to `Editing` with nothing persisted.
    pub async fn submit(
        &mut self,
        store: &dyn ResponseStore,
        today: NaiveDate,
    ) -> Result<SurveyResponse, AppError> {
        if let FormState::Submitted { .. } = self.state {
            return Err(AppError::BadRequest(
                "This survey has already been submitted".to_string(),
            ));
        }

        self.state = FormState::Submitting;

        let validated = match self.prepare(today) {
            Ok(validated) => validated,
            Err(errors) => {
                tracing::debug!("Form rejected: {}", errors);
                self.state = FormState::Editing;
                self.last_error = Some(errors.clone());
                return Err(AppError::Validation(errors));
            }
        };
        self.last_error = None;

        match store.insert_response(validated).await {
            Ok(saved) => {
                tracing::info!(response_id = %saved.id, "Survey response submitted");
                self.state = FormState::Submitted { id: saved.id };
                Ok(saved)
            }
            Err(e) => {
                tracing::warn!("Survey response not saved: {}", e);
                self.state = FormState::Editing;
                Err(e)
            }
        }
    }
}
