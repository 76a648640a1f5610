//! Whole-state export and import.
//!
//! Export serializes every table into one versioned JSON document the shell
//! offers as a download; import parses the same shape and replaces the store
//! contents wholesale. Accounts stay out of the snapshot — credentials do
//! not belong in a file users pass around.

use serde::{Deserialize, Serialize};

use satchel::{StorageBackend, StorageError};

use crate::history::{AnswerHistory, HistoryList};
use crate::portfolio::{KeywordStatsMap, PortfolioAggregator, PortfolioMap};
use crate::repository::{QuestionRepository, QuestionTable};

#[derive(Serialize, Deserialize)]
#[serde(tag = "version")]
pub enum Snapshot {
    V1 {
        questions: QuestionTable,
        history: HistoryList,
        portfolio: PortfolioMap,
        keyword_stats: KeywordStatsMap,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("not a Quizfolio snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub fn export_snapshot(
    repository: &QuestionRepository,
    history: &AnswerHistory,
    portfolio: &PortfolioAggregator,
) -> Result<String, serde_json::Error> {
    let (portfolio_map, keyword_stats) = portfolio.snapshot();
    let snapshot = Snapshot::V1 {
        questions: repository.snapshot(),
        history: history.snapshot(),
        portfolio: portfolio_map,
        keyword_stats,
    };
    serde_json::to_string_pretty(&snapshot)
}

/// Parse a snapshot and replace every table with its contents. Each table is
/// written through as it is restored; a storage failure midway leaves the
/// earlier tables already replaced, the same non-rollback rule as every
/// other write in the app.
pub fn import_snapshot(
    json: &str,
    backend: &dyn StorageBackend,
    repository: &mut QuestionRepository,
    history: &mut AnswerHistory,
    portfolio: &mut PortfolioAggregator,
) -> Result<(), ExportError> {
    let Snapshot::V1 {
        questions,
        history: answers,
        portfolio: portfolio_map,
        keyword_stats,
    } = serde_json::from_str(json)?;

    repository.restore(backend, questions)?;
    history.restore(backend, answers)?;
    portfolio.restore(backend, portfolio_map, keyword_stats)?;
    log::info!("Imported a full snapshot");
    Ok(())
}
