//! The global answer history: every answer ever submitted, across all
//! sessions, appended at submission time and never rewritten.

use serde::{Deserialize, Serialize};

use exam_utils::{QuestionId, UserAnswer};
use satchel::{StorageBackend, StorageError, Table};

use crate::session::ScoreSummary;

pub const HISTORY_KEY: &str = "quizfolio.answer_history";

pub type HistoryList = im::Vector<UserAnswer>;

/// Overall accuracy plus per-question drill-down over the whole history.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct HistorySummary {
    pub score: ScoreSummary,
    pub distinct_questions: usize,
}

pub struct AnswerHistory {
    table: Table<HistoryList>,
    answers: HistoryList,
}

impl AnswerHistory {
    pub fn load(backend: &dyn StorageBackend) -> Self {
        let table = Table::new(HISTORY_KEY);
        let answers = table.load(backend);
        Self { table, answers }
    }

    /// Answers arrive in submission order, which is timestamp order within a
    /// tab; the sequence is append-only.
    pub fn append(
        &mut self,
        backend: &dyn StorageBackend,
        answer: UserAnswer,
    ) -> Result<(), StorageError> {
        self.answers.push_back(answer);
        self.save(backend)
    }

    pub fn all(&self) -> &HistoryList {
        &self.answers
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn for_question(&self, id: QuestionId) -> Vec<UserAnswer> {
        self.answers
            .iter()
            .filter(|a| a.question_id == id)
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> HistorySummary {
        let total = self.answers.len() as u32;
        let correct = self.answers.iter().filter(|a| a.is_correct).count() as u32;
        let percentage = if total == 0 {
            0
        } else {
            (100.0 * f64::from(correct) / f64::from(total)).round() as u32
        };
        let distinct_questions = self
            .answers
            .iter()
            .map(|a| a.question_id)
            .collect::<std::collections::BTreeSet<_>>()
            .len();
        HistorySummary {
            score: ScoreSummary {
                total,
                correct,
                percentage,
            },
            distinct_questions,
        }
    }

    pub fn snapshot(&self) -> HistoryList {
        self.answers.clone()
    }

    pub fn restore(
        &mut self,
        backend: &dyn StorageBackend,
        answers: HistoryList,
    ) -> Result<(), StorageError> {
        self.answers = answers;
        self.save(backend)
    }

    pub fn clear(&mut self, backend: &dyn StorageBackend) {
        self.answers = HistoryList::new();
        self.table.clear(backend);
    }

    fn save(&self, backend: &dyn StorageBackend) -> Result<(), StorageError> {
        self.table.save(backend, &self.answers).inspect_err(|e| {
            log::error!("Error writing the answer history: {e:?}");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use satchel::MemoryBackend;

    fn answer(question_id: u64, is_correct: bool) -> UserAnswer {
        UserAnswer {
            question_id,
            selected_answer: "a".to_string(),
            is_correct,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn appends_keep_order_and_survive_reload() {
        let backend = MemoryBackend::new();
        let mut history = AnswerHistory::load(&backend);

        history.append(&backend, answer(1, true)).unwrap();
        history.append(&backend, answer(2, false)).unwrap();
        history.append(&backend, answer(1, true)).unwrap();

        let reloaded = AnswerHistory::load(&backend);
        let ids: Vec<u64> = reloaded.all().iter().map(|a| a.question_id).collect();
        assert_eq!(ids, vec![1, 2, 1]);
        assert!(
            reloaded
                .all()
                .iter()
                .zip(reloaded.all().iter().skip(1))
                .all(|(a, b)| a.timestamp <= b.timestamp)
        );
    }

    #[test]
    fn summary_counts_and_rounds() {
        let backend = MemoryBackend::new();
        let mut history = AnswerHistory::load(&backend);
        history.append(&backend, answer(1, true)).unwrap();
        history.append(&backend, answer(2, true)).unwrap();
        history.append(&backend, answer(3, false)).unwrap();

        let summary = history.summary();
        assert_eq!(summary.score.total, 3);
        assert_eq!(summary.score.correct, 2);
        assert_eq!(summary.score.percentage, 67);
        assert_eq!(summary.distinct_questions, 3);
    }

    #[test]
    fn empty_history_has_zero_percentage() {
        let backend = MemoryBackend::new();
        let history = AnswerHistory::load(&backend);
        assert_eq!(history.summary().score.percentage, 0);
    }

    #[test]
    fn for_question_collects_point_in_time_facts() {
        let backend = MemoryBackend::new();
        let mut history = AnswerHistory::load(&backend);
        history.append(&backend, answer(7, false)).unwrap();
        history.append(&backend, answer(7, true)).unwrap();
        history.append(&backend, answer(8, true)).unwrap();

        let answers = history.for_question(7);
        assert_eq!(answers.len(), 2);
        assert!(!answers[0].is_correct);
        assert!(answers[1].is_correct);
    }
}
