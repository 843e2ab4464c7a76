//! Fixed choices offered to form clients.
//!
//! Region and service are free text on the wire; these lists only seed the
//! pickers. Code sets mirror what the encoder accepts.

use crate::encoding::{CC1_UNAWARE_CODE, NOT_APPLICABLE_CODE};
use crate::models::{FormVariant, SQD_FIELDS};
use serde::Serialize;

/// One selectable answer: the code the form submits and its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub code: &'static str,
    pub label: &'static str,
}

const fn choice(code: &'static str, label: &'static str) -> Choice {
    Choice { code, label }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub field: &'static str,
    pub prompt: &'static str,
}

pub const REGIONS: &[&str] = &[
    "NCR",
    "CAR",
    "Region I",
    "Region II",
    "Region III",
    "Region IV-A",
    "MIMAROPA",
    "Region V",
    "Region VI",
    "NIR",
    "Region VII",
    "Region VIII",
    "Region IX",
    "Region X",
    "Region XI",
    "Region XII",
    "Region XIII",
    "BARMM",
];

pub const SERVICES: &[&str] = &[
    "Business Permit (New)",
    "Business Permit (Renewal)",
    "Building Permit",
    "Occupancy Permit",
    "Community Tax Certificate (Cedula)",
    "Real Property Tax Payment",
    "Civil Registry Documents",
    "Barangay Clearance",
    "Health Certificate",
    "Social Welfare Assistance",
];

pub const CLIENT_TYPES: &[Choice] = &[
    choice("citizen", "Citizen"),
    choice("business", "Business"),
    choice("government", "Government (employee or another agency)"),
];

pub const SEXES: &[Choice] = &[choice("male", "Male"), choice("female", "Female")];

pub const CC1_CHOICES: &[Choice] = &[
    choice("1", "I know what a CC is and I saw this office's CC"),
    choice("2", "I know what a CC is but I did NOT see this office's CC"),
    choice("3", "I learned of the CC only when I saw this office's CC"),
    choice(
        CC1_UNAWARE_CODE,
        "I do not know what a CC is and I did not see one in this office",
    ),
];

pub const CC2_CHOICES: &[Choice] = &[
    choice("1", "Easy to see"),
    choice("2", "Somewhat easy to see"),
    choice("3", "Difficult to see"),
    choice("4", "Not visible at all"),
    choice("5", "Not Applicable"),
];

pub const CC3_CHOICES: &[Choice] = &[
    choice("1", "Helped very much"),
    choice("2", "Somewhat helped"),
    choice("3", "Did not help"),
    choice("4", "Not Applicable"),
];

pub const RATING_CHOICES: &[Choice] = &[
    choice("1", "Strongly Disagree"),
    choice("2", "Disagree"),
    choice("3", "Neither Agree nor Disagree"),
    choice("4", "Agree"),
    choice("5", "Strongly Agree"),
    choice(NOT_APPLICABLE_CODE, "Not Applicable"),
];

const SQD_PROMPTS: [&str; 9] = [
    "I am satisfied with the service that I availed",
    "I spent a reasonable amount of time for my transaction",
    "The office followed the transaction's requirements and steps based on the information provided",
    "The steps (including payment) I needed to do for my transaction were easy and simple",
    "I easily found information about my transaction from the office or its website",
    "I paid a reasonable amount of fees for my transaction",
    "I feel the office was fair to everyone, or 'walang palakasan', during my transaction",
    "I was treated courteously by the staff, and (if asked for help) the staff was helpful",
    "I got what I needed from the government office, or (if denied) denial of request was sufficiently explained to me",
];

/// Everything a form client needs to render the survey.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormOptions {
    pub variant: FormVariant,
    pub client_types: &'static [Choice],
    pub sexes: &'static [Choice],
    pub regions: &'static [&'static str],
    pub services: &'static [&'static str],
    pub cc1: &'static [Choice],
    pub cc2: &'static [Choice],
    pub cc3: &'static [Choice],
    /// `cc1` code that hides CC2 and CC3.
    pub cc1_unaware_code: &'static str,
    pub rating_scale: &'static [Choice],
    pub sqd_questions: Vec<Question>,
}

pub fn form_options(variant: FormVariant) -> FormOptions {
    FormOptions {
        variant,
        client_types: CLIENT_TYPES,
        sexes: SEXES,
        regions: REGIONS,
        services: SERVICES,
        cc1: CC1_CHOICES,
        cc2: CC2_CHOICES,
        cc3: CC3_CHOICES,
        cc1_unaware_code: CC1_UNAWARE_CODE,
        rating_scale: RATING_CHOICES,
        sqd_questions: SQD_FIELDS
            .into_iter()
            .zip(SQD_PROMPTS)
            .map(|(field, prompt)| Question { field, prompt })
            .collect(),
    }
}
