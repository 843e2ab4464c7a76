//! Satisfaction statistics for the admin dashboard.
//!
//! Overall satisfaction is read from SQD0 ("I am satisfied with the service
//! that I availed"). The satisfaction rate divides by every response,
//! including those that left SQD0 unanswered.

use crate::models::{Rating, SurveyResponse, SQD_COUNT};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionBucket {
    pub count: usize,
    /// Share of all responses, one decimal place.
    pub percent_of_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SatisfactionSummary {
    pub total_responses: usize,
    /// Mean SQD0 over responses that rated it, two decimal places.
    pub average_rating: f64,
    /// SQD0 counts keyed 1..=5; every key is present.
    pub distribution: BTreeMap<u8, DistributionBucket>,
    /// Whole percent of all responses rating SQD0 4 or 5.
    pub satisfaction_rate: u32,
    /// Mean of each dimension SQD0..SQD8; `None` when nobody rated it.
    pub dimension_averages: Vec<Option<f64>>,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn mean(ratings: impl Iterator<Item = Rating>) -> Option<f64> {
    let (sum, count) = ratings.fold((0u64, 0u64), |(sum, count), r| {
        (sum + u64::from(r.value()), count + 1)
    });
    (count > 0).then(|| round_to(sum as f64 / count as f64, 2))
}

/// Summarizes a response set. Pure; the same input yields the same output.
pub fn summarize<T: AsRef<SurveyResponse>>(responses: &[T]) -> SatisfactionSummary {
    let total = responses.len();

    let overall: Vec<Rating> = responses
        .iter()
        .filter_map(|r| r.as_ref().sqd0)
        .collect();

    let mut counts = [0usize; Rating::MAX as usize];
    for rating in &overall {
        counts[usize::from(rating.value() - 1)] += 1;
    }

    let distribution = (Rating::MIN..=Rating::MAX)
        .map(|rating| {
            let count = counts[usize::from(rating - 1)];
            let percent_of_total = if total > 0 {
                round_to(count as f64 / total as f64 * 100.0, 1)
            } else {
                0.0
            };
            (
                rating,
                DistributionBucket {
                    count,
                    percent_of_total,
                },
            )
        })
        .collect();

    let satisfied = overall.iter().filter(|r| r.is_satisfied()).count();
    let satisfaction_rate = if total > 0 {
        (satisfied as f64 / total as f64 * 100.0).round() as u32
    } else {
        0
    };

    let dimension_averages = (0..SQD_COUNT)
        .map(|index| mean(responses.iter().filter_map(|r| r.as_ref().ratings()[index])))
        .collect();

    SatisfactionSummary {
        total_responses: total,
        average_rating: mean(overall.iter().copied()).unwrap_or(0.0),
        distribution,
        satisfaction_rate,
        dimension_averages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn with_sqd0(score: Option<u8>) -> SurveyResponse {
        let mut ratings = [None; SQD_COUNT];
        ratings[0] = score.and_then(Rating::new);
        SurveyResponse::from_new(
            Uuid::new_v4(),
            Utc::now(),
            NewSurveyResponse {
                client_type: ClientType::Citizen,
                date_of_transaction: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
                sex: Sex::Male,
                age: None,
                region: None,
                service_availed: "Cedula".to_string(),
                cc1: None,
                cc2: None,
                cc3: None,
                ratings,
                suggestions: None,
                email: None,
                survey_id: None,
            },
        )
    }

    #[test]
    fn test_empty_set() {
        let summary = summarize::<SurveyResponse>(&[]);
        assert_eq!(summary.total_responses, 0);
        assert_eq!(summary.average_rating, 0.0);
        assert_eq!(summary.satisfaction_rate, 0);
        assert_eq!(summary.distribution.len(), 5);
        assert!(summary.distribution.values().all(|b| b.count == 0));
        assert!(summary.dimension_averages.iter().all(Option::is_none));
    }

    #[test]
    fn test_rate_counts_unrated_in_denominator() {
        let responses = vec![with_sqd0(Some(5)), with_sqd0(Some(4)), with_sqd0(None)];
        let summary = summarize(&responses);

        assert_eq!(summary.average_rating, 4.5);
        assert_eq!(summary.satisfaction_rate, 67);
        assert_eq!(summary.distribution[&4].count, 1);
        assert_eq!(summary.distribution[&5].count, 1);
        assert_eq!(summary.distribution[&1].count, 0);
        assert_eq!(summary.distribution[&5].percent_of_total, 33.3);
    }

    #[test]
    fn test_average_rounds_to_two_places() {
        let responses = vec![with_sqd0(Some(5)), with_sqd0(Some(4)), with_sqd0(Some(4))];
        assert_eq!(summarize(&responses).average_rating, 4.33);
    }

    #[test]
    fn test_dimension_averages_skip_unrated() {
        let responses = vec![with_sqd0(Some(2)), with_sqd0(Some(3))];
        let summary = summarize(&responses);
        assert_eq!(summary.dimension_averages[0], Some(2.5));
        assert_eq!(summary.dimension_averages[1], None);
        assert_eq!(summary.dimension_averages.len(), SQD_COUNT);
    }
}
