//! Parsing of question files into draft records.
//!
//! Two formats are accepted: CSV with a fixed column order
//! (topic, question, four options, correct answer, explanation,
//! semicolon-joined keywords, difficulty) and JSON (an array of
//! question-shaped objects). Validation is per record: a bad row is counted
//! and reported, it never fails the batch.

use std::collections::BTreeSet;

use crate::{Difficulty, QuestionStatus};

/// Number of columns in the fixed CSV layout.
const CSV_COLUMNS: usize = 10;

/// A parsed question that has not been assigned an id yet. The repository
/// turns accepted drafts into [`crate::Question`]s at insert time.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct QuestionDraft {
    #[serde(default)]
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
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("question text is empty")]
    EmptyPrompt,
    #[error("needs at least 2 answer options, found {found}")]
    TooFewOptions { found: usize },
    #[error("correct answer is missing or does not match any option")]
    CorrectAnswerNotAnOption,
    #[error("record is not question-shaped: {message}")]
    Malformed { message: String },
}

/// A rejected record: which row (1-based, as a user would count lines in
/// their file) and why.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordFailure {
    pub row: usize,
    pub error: RecordError,
}

/// Outcome of parsing one import file. `success() + failed()` always equals
/// `total`: every record in the file is either a draft or a failure.
#[derive(Clone, Debug, Default)]
pub struct ImportReport {
    pub total: u32,
    pub drafts: Vec<QuestionDraft>,
    pub failures: Vec<RecordFailure>,
}

impl ImportReport {
    pub fn success(&self) -> u32 {
        self.drafts.len() as u32
    }

    pub fn failed(&self) -> u32 {
        self.failures.len() as u32
    }

    fn push(&mut self, row: usize, parsed: Result<QuestionDraft, RecordError>) {
        self.total += 1;
        match parsed {
            Ok(draft) => self.drafts.push(draft),
            Err(error) => self.failures.push(RecordFailure { row, error }),
        }
    }
}

/// File-level import failure. Record-level problems never surface here; they
/// are counted inside the [`ImportReport`] instead.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("not a JSON array of questions: {0}")]
    Json(#[from] serde_json::Error),
}

impl QuestionDraft {
    /// Minimal validation required before a draft may be stored: non-empty
    /// prompt, at least two non-empty options, and a correct answer that is
    /// byte-equal to one of them. Matching is exact and case-sensitive,
    /// mirroring how answers are graded at submission time.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.text.trim().is_empty() {
            return Err(RecordError::EmptyPrompt);
        }
        let found = self.options.iter().filter(|o| !o.is_empty()).count();
        if found < 2 {
            return Err(RecordError::TooFewOptions { found });
        }
        if self.correct_answer.is_empty() || !self.options.contains(&self.correct_answer) {
            return Err(RecordError::CorrectAnswerNotAnOption);
        }
        Ok(())
    }
}

/// Parse a CSV question file.
///
/// Rows with too few columns are padded with empty fields and then rejected
/// by validation, so they still show up in the failure count rather than
/// disappearing. An optional header row (first column literally `topic`) is
/// tolerated and skipped.
pub fn parse_csv(content: &str) -> ImportReport {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut report = ImportReport::default();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = split_csv_line(line);
        if index == 0 && fields.first().map(|f| f.trim().eq_ignore_ascii_case("topic")) == Some(true)
        {
            continue;
        }
        fields.resize(CSV_COLUMNS, String::new());

        let draft = draft_from_fields(fields);
        let validated = draft.validate().map(|()| draft);
        report.push(index + 1, validated);
    }
    report
}

fn draft_from_fields(fields: Vec<String>) -> QuestionDraft {
    let mut fields = fields.into_iter();
    let topic = fields.next().unwrap_or_default();
    let text = fields.next().unwrap_or_default();
    let options: Vec<String> = fields.by_ref().take(4).filter(|o| !o.is_empty()).collect();
    let correct_answer = fields.next().unwrap_or_default();
    let explanation = fields.next().unwrap_or_default();
    let keywords = split_keywords(&fields.next().unwrap_or_default());
    let difficulty = Difficulty::parse_lenient(&fields.next().unwrap_or_default());

    QuestionDraft {
        topic,
        text,
        options,
        correct_answer,
        explanation,
        keywords,
        difficulty,
        status: QuestionStatus::Active,
    }
}

/// Parse a JSON question file: an array of question-shaped objects.
///
/// A document that is not a JSON array at all is a file-level error. Within
/// the array, each element is converted and validated independently, so one
/// malformed object costs one failure, not the batch.
pub fn parse_json(content: &str) -> Result<ImportReport, ImportError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let records: Vec<serde_json::Value> = serde_json::from_str(content)?;

    let mut report = ImportReport::default();
    for (index, record) in records.into_iter().enumerate() {
        let parsed = serde_json::from_value::<QuestionDraft>(record)
            .map_err(|e| RecordError::Malformed {
                message: e.to_string(),
            })
            .and_then(|draft| draft.validate().map(|()| draft));
        report.push(index + 1, parsed);
    }
    Ok(report)
}

/// Keywords arrive as one semicolon-joined field. Empty fragments (trailing
/// semicolons, doubled separators) are dropped.
pub fn split_keywords(field: &str) -> BTreeSet<String> {
    field
        .split(';')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split one CSV line into fields, honoring double-quoted fields with
/// embedded commas and doubled-quote escapes. Exam prompts routinely contain
/// commas, so a bare `split(',')` is not enough here.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
