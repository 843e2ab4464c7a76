use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============ Answer Enumerations ============

/// Error returned when a stored label does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub label: String,
}

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.label)
    }
}

impl std::error::Error for UnknownLabel {}

/// Declares a string-backed answer enum: serde and `FromStr` both use the
/// stored label.
macro_rules! stored_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $label)] $variant),+
        }

        impl $name {
            /// Label persisted in the backing store.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err(UnknownLabel {
                        kind: $kind,
                        label: other.to_string(),
                    }),
                }
            }
        }
    };
}

stored_enum! {
    /// Who availed the service.
    ClientType, "client type" {
        Citizen => "citizen",
        Business => "business",
        Government => "government",
    }
}

stored_enum! {
    Sex, "sex" {
        Male => "Male",
        Female => "Female",
    }
}

stored_enum! {
    /// CC1: awareness of the office's Citizen's Charter.
    CharterAwareness, "charter awareness" {
        /// Knows what a CC is and saw this office's CC.
        KnowsAndSaw => "Yes",
        /// Knows what a CC is but did not see this office's CC.
        KnowsButNotSeen => "Aware, not seen",
        /// Learned of the CC only upon seeing this office's CC.
        LearnedOnSight => "Learned on sight",
        /// Does not know what a CC is and did not see one.
        Unaware => "No",
    }
}

impl CharterAwareness {
    /// CC2 and CC3 only apply to respondents who know of the charter.
    pub fn is_aware(&self) -> bool {
        !matches!(self, CharterAwareness::Unaware)
    }
}

stored_enum! {
    /// CC2: how visible the charter was.
    CharterVisibility, "charter visibility" {
        EasyToSee => "Easy to see",
        SomewhatEasy => "Somewhat easy",
        Difficult => "Difficult",
        NotVisible => "Not visible at all",
        NotApplicable => "N/A",
    }
}

stored_enum! {
    /// CC3: whether the charter helped the transaction.
    CharterHelpfulness, "charter helpfulness" {
        Yes => "Yes",
        No => "No",
        NotApplicable => "N/A",
    }
}

stored_enum! {
    /// Lifecycle of a survey definition. Owned by the admin tooling.
    SurveyStatus, "survey status" {
        Draft => "draft",
        Active => "active",
        Closed => "closed",
    }
}

stored_enum! {
    /// Role grants checked by the admin surface.
    AppRole, "role" {
        Admin => "admin",
        User => "user",
    }
}

/// Which required-field contract the form enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormVariant {
    /// `cc1` and all nine SQD ratings must be answered ("na" counts).
    #[default]
    Strict,
    /// Only the client profile and the service availed are required.
    Lenient,
}

impl FromStr for FormVariant {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(FormVariant::Strict),
            "lenient" => Ok(FormVariant::Lenient),
            other => Err(UnknownLabel {
                kind: "form variant",
                label: other.to_string(),
            }),
        }
    }
}

// ============ Ratings ============

/// A score on the 5-point agreement scale. Always within 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Rating(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Agree or strongly agree.
    pub fn is_satisfied(&self) -> bool {
        self.0 >= 4
    }
}

impl TryFrom<i16> for Rating {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Rating::new)
            .ok_or_else(|| format!("rating {} outside 1-5", value))
    }
}

impl From<Rating> for i16 {
    fn from(rating: Rating) -> Self {
        i16::from(rating.0)
    }
}

/// An answered SQD item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingAnswer {
    Score(Rating),
    /// The respondent chose "N/A"; persisted as absence.
    NotApplicable,
}

impl RatingAnswer {
    pub fn score(&self) -> Option<Rating> {
        match self {
            RatingAnswer::Score(rating) => Some(*rating),
            RatingAnswer::NotApplicable => None,
        }
    }
}

/// Number of Service Quality Dimensions (SQD0..SQD8).
pub const SQD_COUNT: usize = 9;

/// Wire names of the nine dimensions, in order.
pub const SQD_FIELDS: [&str; SQD_COUNT] = [
    "sqd0", "sqd1", "sqd2", "sqd3", "sqd4", "sqd5", "sqd6", "sqd7", "sqd8",
];

// ============ Submission Pipeline Types ============

/// Encoded but not yet validated submission. `None` means unanswered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateResponse {
    pub client_type: Option<ClientType>,
    pub date_of_transaction: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub age: Option<i32>,
    pub region: Option<String>,
    pub service_availed: Option<String>,
    pub cc1: Option<CharterAwareness>,
    pub cc2: Option<CharterVisibility>,
    pub cc3: Option<CharterHelpfulness>,
    pub sqd: [Option<RatingAnswer>; SQD_COUNT],
    pub suggestions: Option<String>,
    pub email: Option<String>,
    pub survey_id: Option<Uuid>,
}

/// A submission that passed validation and is ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSurveyResponse {
    pub client_type: ClientType,
    pub date_of_transaction: NaiveDate,
    pub sex: Sex,
    pub age: Option<i16>,
    pub region: Option<String>,
    pub service_availed: String,
    pub cc1: Option<CharterAwareness>,
    pub cc2: Option<CharterVisibility>,
    pub cc3: Option<CharterHelpfulness>,
    /// Scores only; "N/A" and unanswered are both `None` here.
    pub ratings: [Option<Rating>; SQD_COUNT],
    pub suggestions: Option<String>,
    pub email: Option<String>,
    pub survey_id: Option<Uuid>,
}

// ============ Persisted Models ============

/// One persisted citizen submission.
///
/// Absent optional fields are omitted from the serialized record, so an
/// "N/A" rating never appears as `null` or `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
    pub id: Uuid,
    pub client_type: ClientType,
    pub date_of_transaction: NaiveDate,
    pub sex: Sex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub service_availed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc1: Option<CharterAwareness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc2: Option<CharterVisibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc3: Option<CharterHelpfulness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqd0: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqd1: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqd2: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqd3: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqd4: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqd5: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqd6: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqd7: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqd8: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl SurveyResponse {
    /// Stamps a validated submission with its storage identity.
    pub fn from_new(id: Uuid, created_at: DateTime<Utc>, new: NewSurveyResponse) -> Self {
        let [sqd0, sqd1, sqd2, sqd3, sqd4, sqd5, sqd6, sqd7, sqd8] = new.ratings;
        Self {
            id,
            client_type: new.client_type,
            date_of_transaction: new.date_of_transaction,
            sex: new.sex,
            age: new.age,
            region: new.region,
            service_availed: new.service_availed,
            cc1: new.cc1,
            cc2: new.cc2,
            cc3: new.cc3,
            sqd0,
            sqd1,
            sqd2,
            sqd3,
            sqd4,
            sqd5,
            sqd6,
            sqd7,
            sqd8,
            suggestions: new.suggestions,
            email: new.email,
            survey_id: new.survey_id,
            created_at,
        }
    }

    /// The nine dimension scores, in order.
    pub fn ratings(&self) -> [Option<Rating>; SQD_COUNT] {
        [
            self.sqd0, self.sqd1, self.sqd2, self.sqd3, self.sqd4, self.sqd5, self.sqd6,
            self.sqd7, self.sqd8,
        ]
    }
}

impl AsRef<SurveyResponse> for SurveyResponse {
    fn as_ref(&self) -> &SurveyResponse {
        self
    }
}

/// A survey definition. Read-only from this service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: Uuid,
    pub title: String,
    /// Kept verbatim so statuses added by the admin tooling still display.
    pub status: String,
}

/// The survey columns joined onto a response listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveySummary {
    pub title: String,
    pub status: String,
}

/// A response together with its originating survey, as listed to admins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseWithSurvey {
    #[serde(flatten)]
    pub response: SurveyResponse,
    #[serde(default)]
    pub survey: Option<SurveySummary>,
}

impl AsRef<SurveyResponse> for ResponseWithSurvey {
    fn as_ref(&self) -> &SurveyResponse {
        &self.response
    }
}

/// The user behind a verified session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}
