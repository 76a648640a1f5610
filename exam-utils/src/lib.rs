pub mod account;
pub mod import;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

/// Identifier assigned to a question when it enters the bank. Never reused,
/// never changed by edits.
pub type QuestionId = u64;

/// Identifier of one import operation. Every question ingested by that
/// operation is tagged with it.
pub type BatchId = u64;

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    serde::Serialize,
    serde::Deserialize,
    Hash,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    tsify::Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Lenient parse used by the importers. Unrecognized labels fall back to
    /// the default rather than failing the record.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Difficulty::Beginner,
            "intermediate" => Difficulty::Intermediate,
            "advanced" => Difficulty::Advanced,
            _ => Difficulty::default(),
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        };
        write!(f, "{word}")
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    serde::Serialize,
    serde::Deserialize,
    Hash,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    tsify::Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    #[default]
    Active,
    Inactive,
    Draft,
}

/// One multiple-choice exam question.
///
/// `correct_answer` must be byte-equal to one of `options`; the importers and
/// the repository enforce this before a question is ever stored. Option order
/// matters for display only.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct Question {
    pub id: QuestionId,
    pub topic: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub status: QuestionStatus,
    #[serde(default)]
    pub batch_id: Option<BatchId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An answered question, recorded at submission time and never mutated.
/// The referenced question may be edited or deleted later; the fact stands.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct UserAnswer {
    pub question_id: QuestionId,
    pub selected_answer: String,
    pub is_correct: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(
    Copy,
    Clone,
    Debug,
    serde::Serialize,
    serde::Deserialize,
    Hash,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    tsify::Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Json,
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = match self {
            FileType::Csv => "csv",
            FileType::Json => "json",
        };
        write!(f, "{word}")
    }
}

/// Summary of one import operation, kept so batches can be listed and bulk
/// deleted later. `success + failed == total` always holds.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct ImportBatch {
    pub id: BatchId,
    pub filename: String,
    pub total: u32,
    pub success: u32,
    pub failed: u32,
    pub file_size: u64,
    pub file_type: FileType,
    pub import_date: DateTime<Utc>,
}
