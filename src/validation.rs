//! Field constraints for a survey submission.
//!
//! `validate` is pure: it takes an encoded candidate, the form variant and
//! the service-local date, and either returns a record ready to persist or
//! every violated constraint in form order.
use crate::errors::{ValidationError, ValidationErrors};
use crate::models::*;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

pub const MIN_AGE: i32 = 1;
pub const MAX_AGE: i32 = 120;
pub const MAX_SERVICE_LEN: usize = 200;
pub const MAX_SUGGESTIONS_LEN: usize = 2000;
pub const MAX_EMAIL_LEN: usize = 255;

/// Validate email address format.
///
/// RFC 5322 simplified: `local@domain.tld` with at least one dot in the
/// domain.
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    let email_regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
        )
        .expect("email pattern is a valid regex")
    });

    email_regex.is_match(email)
}

fn required<T>(
    errors: &mut Vec<ValidationError>,
    value: Option<T>,
    field: &str,
    label: &str,
) -> Option<T> {
    if value.is_none() {
        errors.push(ValidationError::new(field, format!("{} is required", label)));
    }
    value
}

/// Checks a candidate against the variant's contract.
pub fn validate(
    candidate: CandidateResponse,
    variant: FormVariant,
    today: NaiveDate,
) -> Result<NewSurveyResponse, ValidationErrors> {
    let mut errors = Vec::new();
    let strict = variant == FormVariant::Strict;

    let client_type = required(&mut errors, candidate.client_type, "clientType", "Client type");

    let date_of_transaction = required(
        &mut errors,
        candidate.date_of_transaction,
        "dateOfTransaction",
        "Date of transaction",
    );
    if let Some(date) = date_of_transaction {
        if date > today {
            errors.push(ValidationError::new(
                "dateOfTransaction",
                "Date of transaction cannot be in the future",
            ));
        }
    }

    let sex = required(&mut errors, candidate.sex, "sex", "Sex");

    let age = match candidate.age {
        Some(age) if !(MIN_AGE..=MAX_AGE).contains(&age) => {
            errors.push(ValidationError::new(
                "age",
                format!("Age must be between {} and {}", MIN_AGE, MAX_AGE),
            ));
            None
        }
        // in range, so it fits
        Some(age) => i16::try_from(age).ok(),
        None => None,
    };

    let service_availed = required(
        &mut errors,
        candidate.service_availed,
        "serviceAvailed",
        "Service availed",
    );
    if let Some(service) = &service_availed {
        if service.chars().count() > MAX_SERVICE_LEN {
            errors.push(ValidationError::new(
                "serviceAvailed",
                format!("Service availed must be at most {} characters", MAX_SERVICE_LEN),
            ));
        }
    }

    if strict {
        required(&mut errors, candidate.cc1, "cc1", "Citizen's Charter awareness (CC1)");
    }
    let aware = candidate.cc1.is_some_and(|cc1| cc1.is_aware());
    if !aware {
        if candidate.cc2.is_some() {
            errors.push(ValidationError::new(
                "cc2",
                "CC2 only applies when aware of the Citizen's Charter",
            ));
        }
        if candidate.cc3.is_some() {
            errors.push(ValidationError::new(
                "cc3",
                "CC3 only applies when aware of the Citizen's Charter",
            ));
        }
    }

    let mut ratings = [None; SQD_COUNT];
    for (index, answer) in candidate.sqd.iter().enumerate() {
        match answer {
            Some(answer) => ratings[index] = answer.score(),
            None if strict => errors.push(ValidationError::new(
                SQD_FIELDS[index],
                format!("SQD{} is required", index),
            )),
            None => {}
        }
    }

    if let Some(suggestions) = &candidate.suggestions {
        if suggestions.chars().count() > MAX_SUGGESTIONS_LEN {
            errors.push(ValidationError::new(
                "suggestions",
                format!("Suggestions must be at most {} characters", MAX_SUGGESTIONS_LEN),
            ));
        }
    }

    if let Some(email) = &candidate.email {
        if email.len() > MAX_EMAIL_LEN {
            errors.push(ValidationError::new(
                "email",
                format!("Email must be at most {} characters", MAX_EMAIL_LEN),
            ));
        } else if !is_valid_email(email) {
            errors.push(ValidationError::new("email", "Invalid email address"));
        }
    }

    ValidationErrors::check(errors)?;

    match (client_type, date_of_transaction, sex, service_availed) {
        (Some(client_type), Some(date_of_transaction), Some(sex), Some(service_availed)) => {
            Ok(NewSurveyResponse {
                client_type,
                date_of_transaction,
                sex,
                age,
                region: candidate.region,
                service_availed,
                cc1: candidate.cc1,
                cc2: candidate.cc2,
                cc3: candidate.cc3,
                ratings,
                suggestions: candidate.suggestions,
                email: candidate.email,
                survey_id: candidate.survey_id,
            })
        }
        // every None above already pushed a required-field error
        _ => Err(ValidationError::new("form", "Required fields are missing").into()),
    }
}
