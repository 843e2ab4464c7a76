use crate::encoding::DATE_FORMAT;
use crate::errors::AppError;
use crate::models::SurveyResponse;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

/// Sentinel accepted for "every survey".
pub const ALL_SURVEYS: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurveySelector {
    #[default]
    All,
    Id(Uuid),
}

/// Admin dashboard filter. Every provided predicate must hold.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseFilter {
    pub survey: SurveySelector,
    /// Case-insensitive substring of `serviceAvailed`.
    pub service: Option<String>,
    /// Inclusive lower bound on `dateOfTransaction`.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on `dateOfTransaction`.
    pub date_to: Option<NaiveDate>,
}

/// Raw query-string form of [`ResponseFilter`]. Blank values mean "any".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseFilterParams {
    pub survey: Option<String>,
    pub service: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(name: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        AppError::BadRequest(format!("'{}' must be a date in YYYY-MM-DD format", name))
    })
}

impl TryFrom<ResponseFilterParams> for ResponseFilter {
    type Error = AppError;

    fn try_from(params: ResponseFilterParams) -> Result<Self, Self::Error> {
        let survey = match non_blank(&params.survey) {
            None => SurveySelector::All,
            Some(value) if value.eq_ignore_ascii_case(ALL_SURVEYS) => SurveySelector::All,
            Some(value) => SurveySelector::Id(Uuid::parse_str(value).map_err(|_| {
                AppError::BadRequest(format!("'survey' must be '{}' or a survey id", ALL_SURVEYS))
            })?),
        };

        let date_from = non_blank(&params.date_from)
            .map(|v| parse_date("date_from", v))
            .transpose()?;
        let date_to = non_blank(&params.date_to)
            .map(|v| parse_date("date_to", v))
            .transpose()?;

        Ok(ResponseFilter {
            survey,
            service: non_blank(&params.service).map(str::to_string),
            date_from,
            date_to,
        })
    }
}

impl ResponseFilter {
    pub fn is_empty(&self) -> bool {
        *self == ResponseFilter::default()
    }

    pub fn matches(&self, response: &SurveyResponse) -> bool {
        if let SurveySelector::Id(id) = self.survey {
            if response.survey_id != Some(id) {
                return false;
            }
        }

        if let Some(needle) = &self.service {
            if !response
                .service_availed
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }

        if self
            .date_from
            .is_some_and(|from| response.date_of_transaction < from)
        {
            return false;
        }

        if self
            .date_to
            .is_some_and(|to| response.date_of_transaction > to)
        {
            return false;
        }

        true
    }

    /// Matching responses in their original order. The input is untouched.
    pub fn apply<'a, T: AsRef<SurveyResponse>>(&self, responses: &'a [T]) -> Vec<&'a T> {
        responses
            .iter()
            .filter(|r| self.matches(r.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use chrono::Utc;

    fn response(service: &str, date: (i32, u32, u32), survey_id: Option<Uuid>) -> SurveyResponse {
        SurveyResponse::from_new(
            Uuid::new_v4(),
            Utc::now(),
            NewSurveyResponse {
                client_type: ClientType::Citizen,
                date_of_transaction: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
                sex: Sex::Female,
                age: None,
                region: None,
                service_availed: service.to_string(),
                cc1: None,
                cc2: None,
                cc3: None,
                ratings: [None; SQD_COUNT],
                suggestions: None,
                email: None,
                survey_id,
            },
        )
    }

    #[test]
    fn test_params_blank_means_any() {
        let filter = ResponseFilter::try_from(ResponseFilterParams {
            survey: Some("all".to_string()),
            service: Some("  ".to_string()),
            date_from: Some(String::new()),
            date_to: None,
        })
        .unwrap();
        assert!(filter.is_empty());
    }

    #[test]
    fn test_params_rejects_garbage() {
        let bad_survey = ResponseFilterParams {
            survey: Some("csm-2024".to_string()),
            ..Default::default()
        };
        assert!(ResponseFilter::try_from(bad_survey).is_err());

        let bad_date = ResponseFilterParams {
            date_to: Some("06/15/2024".to_string()),
            ..Default::default()
        };
        assert!(ResponseFilter::try_from(bad_date).is_err());
    }

    #[test]
    fn test_survey_and_service_predicates() {
        let survey = Uuid::new_v4();
        let responses = vec![
            response("Mayor's Permit", (2024, 1, 5), Some(survey)),
            response("Real Property Tax", (2024, 1, 6), Some(survey)),
            response("BUSINESS PERMIT renewal", (2024, 1, 7), None),
        ];

        let by_service = ResponseFilter {
            service: Some("permit".to_string()),
            ..Default::default()
        };
        assert_eq!(by_service.apply(&responses).len(), 2);

        let both = ResponseFilter {
            survey: SurveySelector::Id(survey),
            service: Some("permit".to_string()),
            ..Default::default()
        };
        let matched = both.apply(&responses);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].service_availed, "Mayor's Permit");
    }

    #[test]
    fn test_date_bounds_are_inclusive_and_order_preserved() {
        let responses = vec![
            response("A", (2024, 2, 1), None),
            response("B", (2024, 2, 10), None),
            response("C", (2024, 2, 20), None),
            response("D", (2024, 2, 10), None),
        ];

        let filter = ResponseFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 2, 10),
            date_to: NaiveDate::from_ymd_opt(2024, 2, 20),
            ..Default::default()
        };
        let names: Vec<&str> = filter
            .apply(&responses)
            .iter()
            .map(|r| r.service_availed.as_str())
            .collect();
        assert_eq!(names, vec!["B", "C", "D"]);
    }
}
