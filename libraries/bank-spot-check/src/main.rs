//! Offline sanity check for an exported Quizfolio snapshot.
//!
//! Reads the JSON file produced by the app's export action and verifies the
//! invariants the app maintains at runtime. Useful after hand-editing a
//! snapshot, before re-importing one from somewhere else, or when hunting a
//! bug report that smells like corrupted state.
//!
//! Exit code 0 means every check passed; 1 means at least one violation was
//! found (warnings alone do not fail the run).

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;

use quizfolio_frontend_rs::Snapshot;

fn main() -> Result<()> {
    env_logger::init();

    let path: PathBuf = std::env::args()
        .nth(1)
        .context("usage: bank-spot-check <snapshot.json>")?
        .into();

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("could not read {}", path.display()))?;
    let Snapshot::V1 {
        questions,
        history,
        portfolio,
        keyword_stats,
    } = serde_json::from_str(&raw).context("not a Quizfolio snapshot")?;
    log::info!("Parsed snapshot from {}", path.display());

    let mut violations: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    // --- question bank ---
    let mut seen_ids = BTreeSet::new();
    for question in &questions.questions {
        if !seen_ids.insert(question.id) {
            violations.push(format!("duplicate question id {}", question.id));
        }
        if question.text.trim().is_empty() {
            violations.push(format!("question {} has an empty prompt", question.id));
        }
        if question.options.iter().filter(|o| !o.is_empty()).count() < 2 {
            violations.push(format!(
                "question {} has fewer than 2 answer options",
                question.id
            ));
        }
        if !question.options.contains(&question.correct_answer) {
            violations.push(format!(
                "question {}: correct answer `{}` is not among its options",
                question.id, question.correct_answer
            ));
        }
    }

    // --- import batches ---
    for batch in &questions.import_batches {
        if batch.success + batch.failed != batch.total {
            violations.push(format!(
                "batch {} ({}): success {} + failed {} != total {}",
                batch.id, batch.filename, batch.success, batch.failed, batch.total
            ));
        }
        let tagged = questions
            .questions
            .iter()
            .filter(|q| q.batch_id == Some(batch.id))
            .count() as u32;
        // Individually deleted questions legitimately shrink a batch below
        // its recorded success count, so this is informational only.
        if tagged != batch.success {
            warnings.push(format!(
                "batch {}: {} questions still tagged, {} recorded at import",
                batch.id, tagged, batch.success
            ));
        }
    }

    // --- answer history ---
    for pair in history.iter().zip(history.iter().skip(1)) {
        if pair.0.timestamp > pair.1.timestamp {
            warnings.push(format!(
                "history timestamps go backwards around question {}",
                pair.1.question_id
            ));
            break;
        }
    }

    // --- portfolio ---
    for (keyword, holding) in &portfolio {
        if !holding.credit.is_finite() || holding.credit <= 0.0 {
            violations.push(format!(
                "portfolio `{keyword}`: credit {} is out of range",
                holding.credit
            ));
        }
        if !holding.growth.is_finite() {
            violations.push(format!("portfolio `{keyword}`: growth is not finite"));
        }
    }

    // --- keyword stats ---
    for (keyword, days) in &keyword_stats {
        for (day, count) in days {
            if NaiveDate::parse_from_str(day, "%Y-%m-%d").is_err() {
                violations.push(format!("keyword `{keyword}`: bad day key `{day}`"));
            }
            if *count == 0 {
                warnings.push(format!("keyword `{keyword}`: empty bucket on {day}"));
            }
        }
    }

    println!(
        "{}: {} questions, {} batches, {} answers, {} keywords tracked",
        path.display(),
        questions.questions.len(),
        questions.import_batches.len(),
        history.len(),
        portfolio.len()
    );
    for warning in &warnings {
        println!("warning: {warning}");
    }
    for violation in &violations {
        println!("VIOLATION: {violation}");
    }

    if !violations.is_empty() {
        bail!("{} violation(s) found", violations.len());
    }
    println!("ok");
    Ok(())
}
