use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Polling data returned by the national registry for one document number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthoritativeRecord {
    pub department: Option<String>,
    pub municipality: Option<String>,
    pub voting_station: Option<String>, // free-form, usually a school name
    pub polling_table: Option<String>,
    pub address: Option<String>,
}

/// Polling data as typed by the operator. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ManualRecord {
    #[serde(alias = "departamento")]
    pub department: Option<String>,
    #[serde(alias = "municipio")]
    pub municipality: Option<String>,
    #[serde(alias = "lugar_votacion")]
    pub voting_station: Option<String>,
    #[serde(alias = "mesa_votacion")]
    pub polling_table: Option<String>,
    #[serde(alias = "direccion_puesto")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Verified,
    NeedsReview,
    Inconsistent,
    #[default]
    Unverified,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Verified => "verified",
            Classification::NeedsReview => "needs_review",
            Classification::Inconsistent => "inconsistent",
            Classification::Unverified => "unverified",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "verified" => Some(Classification::Verified),
            "needs_review" => Some(Classification::NeedsReview),
            "inconsistent" => Some(Classification::Inconsistent),
            "unverified" => Some(Classification::Unverified),
            _ => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A compared polling field, named the way the registry names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Department,
    Municipality,
    VotingStation,
    PollingTable,
}

impl Field {
    pub const COMPARED: [Field; 4] = [
        Field::Department,
        Field::Municipality,
        Field::VotingStation,
        Field::PollingTable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Department => "department",
            Field::Municipality => "municipality",
            Field::VotingStation => "votingStation",
            Field::PollingTable => "pollingTable",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReconciliationResult {
    pub classification: Classification,
    pub discrepancies: Vec<Field>, // non-empty only for needs_review
}

/// Result of a registry check, with or without operator data to compare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VerificationOutcome {
    pub success: bool,
    pub record: Option<AuthoritativeRecord>,
    pub error: Option<String>,
    pub classification: Option<Classification>,
    pub discrepancies: Vec<Field>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "Otro")]
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Other => "Otro",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "M" => Some(Gender::Male),
            "F" => Some(Gender::Female),
            other if other.eq_ignore_ascii_case("otro") => Some(Gender::Other),
            _ => None,
        }
    }
}

/// One candidate voter extracted from a tabular import, fields still raw text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct VoterRow {
    pub row: usize, // 1-based position in the source sheet, required
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub national_id: String,
    pub age: Option<String>,
    pub phone: Option<String>,
    pub residence_address: Option<String>,
    pub department: Option<String>,
    pub municipality: Option<String>,
    pub voting_place: Option<String>,
    pub table: Option<String>,
    pub notes: Option<String>,
}

/// Operator-entered voter, as submitted from the single registration form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct VoterSubmission {
    pub name: String,
    pub national_id: String,
    pub age: Option<i64>,
    pub phone: Option<String>,
    pub residence_address: Option<String>,
    pub gender: Option<String>,
    pub leader_id: Option<i64>,
    pub department: Option<String>,
    pub municipality: Option<String>,
    pub voting_place: Option<String>,
    pub table: Option<String>,
    pub polling_address: Option<String>,
    pub classification: Classification,
    pub discrepancies: Option<Vec<Field>>,
    pub notes: Option<String>,
}

/// A validated voter ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NewVoter {
    pub name: String,
    pub national_id: String,
    pub age: u8,
    pub phone: Option<String>,
    pub residence_address: String,
    pub gender: Option<Gender>,
    pub department: Option<String>,
    pub municipality: Option<String>,
    pub voting_place: Option<String>,
    pub table: Option<String>,
    pub polling_address: Option<String>,
    pub classification: Classification,
    pub discrepancies: Vec<Field>,
    pub leader_id: Option<i64>,
    pub registered_by: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VoterRecord {
    pub id: i64,
    pub registered_at: String,
    #[serde(flatten)]
    pub voter: NewVoter,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NewLeader {
    pub name: String,
    pub national_id: String,
    pub municipality: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Validation,
    Conflict,
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RowError {
    pub row: usize,
    pub kind: RejectionKind,
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BulkImportReport {
    pub created: usize,
    pub total_rows: usize,
    pub errors: Vec<RowError>,
}
