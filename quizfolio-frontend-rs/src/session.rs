//! One quiz attempt, from start through review.
//!
//! The session holds a frozen snapshot of the questions chosen at start time;
//! repository edits made while a session is in flight never reach it. All
//! transitions are checked: a question is answered exactly once, navigation
//! during the quiz is strictly forward, and review is read-only.

use chrono::{DateTime, Utc};
use im::Vector;
use rand::Rng;
use serde::{Deserialize, Serialize};

use exam_utils::{Question, UserAnswer};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    InProgress,
    Reviewing { review_index: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no questions match the requested filter")]
    EmptyPool,
    #[error("a session needs at least one question")]
    ZeroRequested,
    #[error("the current question has already been answered")]
    AlreadyAnswered,
    #[error("the current question has not been answered yet")]
    NotAnswered,
    #[error("the session is in review mode and read-only")]
    ReviewOnly,
    #[error("the session is not in review mode")]
    NotReviewing,
    #[error("no active session")]
    NoSession,
}

/// What `advance` did: moved the cursor, or crossed into review because the
/// last question was answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advanced {
    NextQuestion,
    EnteredReview,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct ScoreSummary {
    pub total: u32,
    pub correct: u32,
    pub percentage: u32,
}

/// A question paired with how it was answered, for the review screen.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct ReviewItem {
    pub index: usize,
    pub question: Question,
    pub answer: UserAnswer,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QuizSession {
    questions: Vector<Question>,
    current_index: usize,
    start_time: DateTime<Utc>,
    answers: Vector<UserAnswer>,
    phase: SessionPhase,
}

impl QuizSession {
    /// Freeze `min(requested, pool)` questions out of the pool, uniformly
    /// shuffled. The pool must already be filtered to active questions
    /// matching the user's topic/keyword choice.
    pub fn start(
        pool: Vec<Question>,
        requested: usize,
        rng: &mut impl Rng,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if requested == 0 {
            return Err(SessionError::ZeroRequested);
        }
        if pool.is_empty() {
            return Err(SessionError::EmptyPool);
        }

        let questions = pool_sampler::shuffle_take(pool, requested, rng);
        Ok(Self {
            questions: questions.into(),
            current_index: 0,
            start_time: now,
            answers: Vector::new(),
            phase: SessionPhase::InProgress,
        })
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn answers(&self) -> &Vector<UserAnswer> {
        &self.answers
    }

    /// The question the cursor is on, while the quiz is in progress.
    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            SessionPhase::InProgress => self.questions.get(self.current_index),
            SessionPhase::Reviewing { .. } => None,
        }
    }

    fn current_is_answered(&self) -> bool {
        self.answers.len() == self.current_index + 1
    }

    pub fn is_last_question(&self) -> bool {
        self.current_index + 1 == self.questions.len()
    }

    /// Grade `selected` against the current question and record the result.
    ///
    /// Correctness is exact, case-sensitive string equality with the stored
    /// correct answer. No trimming, no case folding: grading must agree with
    /// the equality the importers enforced when the question was stored.
    pub fn submit_answer(
        &mut self,
        selected: &str,
        now: DateTime<Utc>,
    ) -> Result<UserAnswer, SessionError> {
        if matches!(self.phase, SessionPhase::Reviewing { .. }) {
            return Err(SessionError::ReviewOnly);
        }
        if self.current_is_answered() {
            return Err(SessionError::AlreadyAnswered);
        }
        let question = self
            .questions
            .get(self.current_index)
            .expect("in-progress cursor stays within the question list");

        let answer = UserAnswer {
            question_id: question.id,
            selected_answer: selected.to_string(),
            is_correct: selected == question.correct_answer,
            timestamp: now,
        };
        self.answers.push_back(answer.clone());
        Ok(answer)
    }

    /// Move on from an answered question. On the last question this enters
    /// review mode instead; advancing past the end is not possible.
    pub fn advance(&mut self) -> Result<Advanced, SessionError> {
        if matches!(self.phase, SessionPhase::Reviewing { .. }) {
            return Err(SessionError::ReviewOnly);
        }
        if !self.current_is_answered() {
            return Err(SessionError::NotAnswered);
        }

        if self.is_last_question() {
            self.current_index = self.questions.len();
            self.phase = SessionPhase::Reviewing { review_index: 0 };
            Ok(Advanced::EnteredReview)
        } else {
            self.current_index += 1;
            Ok(Advanced::NextQuestion)
        }
    }

    /// Review navigation, bounded at both ends. Returns the new index.
    pub fn review_next(&mut self) -> Result<usize, SessionError> {
        let last = self.questions.len().saturating_sub(1);
        match &mut self.phase {
            SessionPhase::Reviewing { review_index } => {
                *review_index = (*review_index + 1).min(last);
                Ok(*review_index)
            }
            SessionPhase::InProgress => Err(SessionError::NotReviewing),
        }
    }

    pub fn review_prev(&mut self) -> Result<usize, SessionError> {
        match &mut self.phase {
            SessionPhase::Reviewing { review_index } => {
                *review_index = review_index.saturating_sub(1);
                Ok(*review_index)
            }
            SessionPhase::InProgress => Err(SessionError::NotReviewing),
        }
    }

    pub fn review_item(&self) -> Result<ReviewItem, SessionError> {
        let SessionPhase::Reviewing { review_index } = self.phase else {
            return Err(SessionError::NotReviewing);
        };
        // Review is only entered once every question has an answer, so both
        // lookups hold by construction.
        let question = self
            .questions
            .get(review_index)
            .expect("review index is bounded by the question count");
        let answer = self
            .answers
            .get(review_index)
            .expect("every reviewed question has an answer");
        Ok(ReviewItem {
            index: review_index,
            question: question.clone(),
            answer: answer.clone(),
        })
    }

    /// Score over the answers given so far; safe to call at any point.
    pub fn score(&self) -> ScoreSummary {
        let total = self.answers.len() as u32;
        let correct = self.answers.iter().filter(|a| a.is_correct).count() as u32;
        let percentage = if total == 0 {
            0
        } else {
            (100.0 * f64::from(correct) / f64::from(total)).round() as u32
        };
        ScoreSummary {
            total,
            correct,
            percentage,
        }
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_seconds()
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        assert!(self.current_index <= self.questions.len());
        assert!(self.answers.len() <= self.current_index + 1);
    }
}
