//! The authoritative question bank: questions plus import-batch records,
//! persisted together as one table.

use chrono::{DateTime, Utc};
use im::Vector;
use serde::{Deserialize, Serialize};

use exam_utils::import::{ImportReport, QuestionDraft, RecordError};
use exam_utils::{BatchId, FileType, ImportBatch, Question, QuestionId, QuestionStatus};
use satchel::{StorageBackend, StorageError, Table};

pub const QUESTIONS_KEY: &str = "quizfolio.questions";

/// How the pool for a new session is narrowed. Topic and keyword are
/// mutually exclusive selection modes in the UI; `Any` is the whole bank.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum SessionFilter {
    Any,
    Topic(String),
    Keyword(String),
}

impl SessionFilter {
    fn matches(&self, question: &Question) -> bool {
        match self {
            SessionFilter::Any => true,
            SessionFilter::Topic(topic) => &question.topic == topic,
            SessionFilter::Keyword(keyword) => question.keywords.contains(keyword),
        }
    }
}

/// Caller-supplied facts about the file behind an import.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct BatchMeta {
    pub filename: String,
    pub file_size: u64,
    pub file_type: FileType,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct RepositoryStats {
    pub total: usize,
    pub active: usize,
    pub batches: usize,
    pub distinct_topics: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Invalid(#[from] RecordError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The persisted shape of the bank. Id counters live in the blob so ids stay
/// unique across reloads; `#[serde(default)]` keeps old blobs readable when
/// fields are added.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QuestionTable {
    #[serde(default)]
    pub questions: Vector<Question>,
    #[serde(default)]
    pub import_batches: Vector<ImportBatch>,
    #[serde(default)]
    next_question_id: u64,
    #[serde(default)]
    next_batch_id: u64,
}

impl QuestionTable {
    fn fresh_question_id(&mut self) -> QuestionId {
        self.next_question_id += 1;
        self.next_question_id
    }

    fn fresh_batch_id(&mut self) -> BatchId {
        self.next_batch_id += 1;
        self.next_batch_id
    }
}

pub struct QuestionRepository {
    table: Table<QuestionTable>,
    state: QuestionTable,
}

impl QuestionRepository {
    pub fn load(backend: &dyn StorageBackend) -> Self {
        let table = Table::new(QUESTIONS_KEY);
        let state = table.load(backend);
        Self { table, state }
    }

    /// Insert every accepted draft from an import, tagged with a fresh batch
    /// id, and record the batch summary. Rejected records were already
    /// counted by the parser; they are never stored.
    ///
    /// A failed save leaves the in-memory bank mutated (callers re-read to
    /// resynchronize), which is the store-divergence behavior the rest of
    /// the app is built around.
    pub fn insert_batch(
        &mut self,
        backend: &dyn StorageBackend,
        report: ImportReport,
        meta: BatchMeta,
        now: DateTime<Utc>,
    ) -> Result<ImportBatch, StorageError> {
        let batch_id = self.state.fresh_batch_id();
        let success = report.success();
        let failed = report.failed();

        for draft in report.drafts {
            let question = self.materialize(draft, Some(batch_id), now);
            self.state.questions.push_back(question);
        }

        let batch = ImportBatch {
            id: batch_id,
            filename: meta.filename,
            total: report.total,
            success,
            failed,
            file_size: meta.file_size,
            file_type: meta.file_type,
            import_date: now,
        };
        self.state.import_batches.push_back(batch.clone());

        self.save(backend)?;
        log::info!(
            "Imported batch {batch_id}: {success} stored, {failed} rejected of {}",
            batch.total
        );
        Ok(batch)
    }

    /// Manual authoring: one validated draft, no batch tag.
    pub fn insert_one(
        &mut self,
        backend: &dyn StorageBackend,
        draft: QuestionDraft,
        now: DateTime<Utc>,
    ) -> Result<Question, RepositoryError> {
        draft.validate()?;
        let question = self.materialize(draft, None, now);
        self.state.questions.push_back(question.clone());
        self.save(backend)?;
        Ok(question)
    }

    fn materialize(
        &mut self,
        draft: QuestionDraft,
        batch_id: Option<BatchId>,
        now: DateTime<Utc>,
    ) -> Question {
        Question {
            id: self.state.fresh_question_id(),
            topic: draft.topic,
            text: draft.text,
            options: draft.options,
            correct_answer: draft.correct_answer,
            explanation: draft.explanation,
            keywords: draft.keywords,
            difficulty: draft.difficulty,
            status: draft.status,
            batch_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the stored question with the same id. Returns `Ok(false)`
    /// without writing when the id is unknown. The id, creation stamp, and
    /// batch tag are immutable; everything else is taken from `edited`, and
    /// the edited record must still satisfy the correct-answer invariant.
    pub fn update(
        &mut self,
        backend: &dyn StorageBackend,
        edited: Question,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let Some(index) = self.state.questions.iter().position(|q| q.id == edited.id) else {
            return Ok(false);
        };

        let stored = self.state.questions[index].clone();
        let replacement = Question {
            id: stored.id,
            created_at: stored.created_at,
            batch_id: stored.batch_id,
            updated_at: now,
            ..edited
        };
        validate_stored(&replacement)?;

        self.state.questions.set(index, replacement);
        self.save(backend)?;
        Ok(true)
    }

    /// Remove one question. `Ok(false)` (and no write) when the id is
    /// unknown; answer history referencing the id is left alone.
    pub fn delete(
        &mut self,
        backend: &dyn StorageBackend,
        id: QuestionId,
    ) -> Result<bool, StorageError> {
        let Some(index) = self.state.questions.iter().position(|q| q.id == id) else {
            return Ok(false);
        };
        self.state.questions.remove(index);
        self.save(backend)?;
        Ok(true)
    }

    /// Bulk delete of one import: every question tagged with the batch and
    /// the batch record itself. Both removals land in a single table write.
    /// Returns how many questions went away, or `None` for an unknown batch.
    pub fn delete_batch(
        &mut self,
        backend: &dyn StorageBackend,
        batch_id: BatchId,
    ) -> Result<Option<usize>, StorageError> {
        let Some(batch_index) = self
            .state
            .import_batches
            .iter()
            .position(|b| b.id == batch_id)
        else {
            return Ok(None);
        };

        let before = self.state.questions.len();
        self.state
            .questions
            .retain(|q| q.batch_id != Some(batch_id));
        let removed = before - self.state.questions.len();
        self.state.import_batches.remove(batch_index);

        self.save(backend)?;
        log::info!("Deleted batch {batch_id} and its {removed} questions");
        Ok(Some(removed))
    }

    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.state.questions.iter()
    }

    pub fn list_all(&self) -> Vec<Question> {
        self.state.questions.iter().cloned().collect()
    }

    pub fn list_by_batch(&self, batch_id: BatchId) -> Vec<Question> {
        self.state
            .questions
            .iter()
            .filter(|q| q.batch_id == Some(batch_id))
            .cloned()
            .collect()
    }

    pub fn batches(&self) -> Vec<ImportBatch> {
        self.state.import_batches.iter().cloned().collect()
    }

    pub fn stats(&self) -> RepositoryStats {
        let distinct_topics = self
            .state
            .questions
            .iter()
            .map(|q| q.topic.as_str())
            .collect::<std::collections::BTreeSet<_>>()
            .len();
        RepositoryStats {
            total: self.state.questions.len(),
            active: self
                .state
                .questions
                .iter()
                .filter(|q| q.status == QuestionStatus::Active)
                .count(),
            batches: self.state.import_batches.len(),
            distinct_topics,
        }
    }

    /// The pool a new session draws from: active questions matching the
    /// filter. Keeping inactive and draft questions out of sessions is this
    /// method's job, not the session's.
    pub fn session_pool(&self, filter: &SessionFilter) -> Vec<Question> {
        self.state
            .questions
            .iter()
            .filter(|q| q.status == QuestionStatus::Active && filter.matches(q))
            .cloned()
            .collect()
    }

    /// Snapshot of the whole table, for export.
    pub fn snapshot(&self) -> QuestionTable {
        self.state.clone()
    }

    /// Replace the whole table, for import. The new contents are written
    /// through immediately.
    pub fn restore(
        &mut self,
        backend: &dyn StorageBackend,
        state: QuestionTable,
    ) -> Result<(), StorageError> {
        self.state = state;
        self.save(backend)
    }

    fn save(&self, backend: &dyn StorageBackend) -> Result<(), StorageError> {
        self.table.save(backend, &self.state).inspect_err(|e| {
            log::error!("Error writing the question table: {e:?}");
        })
    }
}

fn validate_stored(question: &Question) -> Result<(), RecordError> {
    if question.text.trim().is_empty() {
        return Err(RecordError::EmptyPrompt);
    }
    let found = question.options.iter().filter(|o| !o.is_empty()).count();
    if found < 2 {
        return Err(RecordError::TooFewOptions { found });
    }
    if !question.options.contains(&question.correct_answer) {
        return Err(RecordError::CorrectAnswerNotAnOption);
    }
    Ok(())
}
