//! Maps raw form codes to stored domain values.
//!
//! Every function here is total over its defined code set: an empty code
//! means "unanswered" (`Ok(None)`), a known code maps to exactly one value,
//! and anything else is a [`ValidationError`] for that field. Nothing is
//! coerced to a default.

use crate::errors::{ValidationError, ValidationErrors};
use crate::form::FormFields;
use crate::models::*;
use chrono::NaiveDate;
use uuid::Uuid;

/// Rating code for "not applicable".
pub const NOT_APPLICABLE_CODE: &str = "na";

/// CC1 code for "I do not know what a CC is and did not see one".
pub const CC1_UNAWARE_CODE: &str = "4";

/// Wire format of `dateOfTransaction`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn unmapped(field: &str, code: &str) -> ValidationError {
    ValidationError::new(field, format!("'{}' is not a valid answer", code))
}

/// `"1".."5"` to a score, `"na"` to [`RatingAnswer::NotApplicable`].
pub fn encode_rating(field: &str, code: &str) -> Result<Option<RatingAnswer>, ValidationError> {
    let code = code.trim();
    if code.is_empty() {
        return Ok(None);
    }
    if code.eq_ignore_ascii_case(NOT_APPLICABLE_CODE) {
        return Ok(Some(RatingAnswer::NotApplicable));
    }
    // Only the five single-digit codes are valid; "04" or "+4" are not
    match code {
        "1" | "2" | "3" | "4" | "5" => code
            .parse::<u8>()
            .ok()
            .and_then(Rating::new)
            .map(|rating| Some(RatingAnswer::Score(rating)))
            .ok_or_else(|| unmapped(field, code)),
        _ => Err(unmapped(field, code)),
    }
}

pub fn encode_cc1(code: &str) -> Result<Option<CharterAwareness>, ValidationError> {
    match code.trim() {
        "" => Ok(None),
        "1" => Ok(Some(CharterAwareness::KnowsAndSaw)),
        "2" => Ok(Some(CharterAwareness::KnowsButNotSeen)),
        "3" => Ok(Some(CharterAwareness::LearnedOnSight)),
        CC1_UNAWARE_CODE => Ok(Some(CharterAwareness::Unaware)),
        other => Err(unmapped("cc1", other)),
    }
}

pub fn encode_cc2(code: &str) -> Result<Option<CharterVisibility>, ValidationError> {
    match code.trim() {
        "" => Ok(None),
        "1" => Ok(Some(CharterVisibility::EasyToSee)),
        "2" => Ok(Some(CharterVisibility::SomewhatEasy)),
        "3" => Ok(Some(CharterVisibility::Difficult)),
        "4" => Ok(Some(CharterVisibility::NotVisible)),
        "5" => Ok(Some(CharterVisibility::NotApplicable)),
        other => Err(unmapped("cc2", other)),
    }
}

/// "Helped very much" and "Somewhat helped" both store as "Yes".
pub fn encode_cc3(code: &str) -> Result<Option<CharterHelpfulness>, ValidationError> {
    match code.trim() {
        "" => Ok(None),
        "1" | "2" => Ok(Some(CharterHelpfulness::Yes)),
        "3" => Ok(Some(CharterHelpfulness::No)),
        "4" => Ok(Some(CharterHelpfulness::NotApplicable)),
        other => Err(unmapped("cc3", other)),
    }
}

pub fn encode_sex(code: &str) -> Result<Option<Sex>, ValidationError> {
    let code = code.trim();
    if code.is_empty() {
        Ok(None)
    } else if code.eq_ignore_ascii_case("male") {
        Ok(Some(Sex::Male))
    } else if code.eq_ignore_ascii_case("female") {
        Ok(Some(Sex::Female))
    } else {
        Err(unmapped("sex", code))
    }
}

pub fn encode_client_type(code: &str) -> Result<Option<ClientType>, ValidationError> {
    let code = code.trim();
    if code.is_empty() {
        return Ok(None);
    }
    code.to_ascii_lowercase()
        .parse::<ClientType>()
        .map(Some)
        .map_err(|_| unmapped("clientType", code))
}

pub fn encode_age(raw: &str) -> Result<Option<i32>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i32>()
        .map(Some)
        .map_err(|_| ValidationError::new("age", "Age must be a whole number"))
}

pub fn encode_date(raw: &str) -> Result<Option<NaiveDate>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map(Some).map_err(|_| {
        ValidationError::new(
            "dateOfTransaction",
            "Date of transaction must be a date in YYYY-MM-DD format",
        )
    })
}

pub fn encode_survey_id(raw: &str) -> Result<Option<Uuid>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(raw)
        .map(Some)
        .map_err(|_| ValidationError::new("surveyId", "Survey reference is not a valid id"))
}

/// Trims free text; blank text is absent.
pub fn normalize_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn collect<T>(errors: &mut Vec<ValidationError>, result: Result<Option<T>, ValidationError>) -> Option<T> {
    result.unwrap_or_else(|err| {
        errors.push(err);
        None
    })
}

/// Encodes a whole form record, collecting every unmapped code.
pub fn encode(fields: &FormFields) -> Result<CandidateResponse, ValidationErrors> {
    let mut errors = Vec::new();

    let client_type = collect(&mut errors, encode_client_type(&fields.client_type));
    let date_of_transaction = collect(&mut errors, encode_date(&fields.date));
    let sex = collect(&mut errors, encode_sex(&fields.sex));
    let age = collect(&mut errors, encode_age(&fields.age));
    let cc1 = collect(&mut errors, encode_cc1(&fields.cc1));
    let cc2 = collect(&mut errors, encode_cc2(&fields.cc2));
    let cc3 = collect(&mut errors, encode_cc3(&fields.cc3));

    let mut sqd = [None; SQD_COUNT];
    for (slot, (field, code)) in sqd.iter_mut().zip(SQD_FIELDS.iter().zip(fields.sqd_codes())) {
        *slot = collect(&mut errors, encode_rating(field, code));
    }

    let survey_id = collect(&mut errors, encode_survey_id(&fields.survey_id));

    ValidationErrors::check(errors)?;

    Ok(CandidateResponse {
        client_type,
        date_of_transaction,
        sex,
        age,
        region: normalize_text(&fields.region),
        service_availed: normalize_text(&fields.service_availed),
        cc1,
        cc2,
        cc3,
        sqd,
        suggestions: normalize_text(&fields.suggestions),
        email: normalize_text(&fields.email),
        survey_id,
    })
}
