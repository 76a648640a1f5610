//! Per-keyword performance tracking: the gamified "portfolio" credit that
//! compounds with every answer, and the per-day wrong-answer counts behind
//! the heatmap.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use satchel::{StorageBackend, StorageError, Table};

pub const PORTFOLIO_KEY: &str = "quizfolio.portfolio";
pub const KEYWORD_STATS_KEY: &str = "quizfolio.keyword_stats";

/// Every keyword starts here; there is deliberately no floor or ceiling.
/// Credit compounds multiplicatively in both directions, so a long losing
/// streak approaches zero without reaching it and a winning streak grows
/// without bound.
const BASE_CREDIT: f64 = 100.0;
const CORRECT_MULTIPLIER: f64 = 1.05;
const INCORRECT_MULTIPLIER: f64 = 0.95;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct Holding {
    pub credit: f64,
    /// Percentage delta of the most recent step only, not a running average.
    pub growth: f64,
    pub last_updated: DateTime<Utc>,
}

/// keyword -> holding
pub type PortfolioMap = im::HashMap<String, Holding>;

/// keyword -> day (`%Y-%m-%d`) -> wrong answers that day
pub type KeywordStatsMap = im::HashMap<String, im::HashMap<String, u32>>;

/// One row of the portfolio view, sorted by credit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct PortfolioRow {
    pub keyword: String,
    pub credit: f64,
    pub growth: f64,
    pub last_updated: DateTime<Utc>,
}

/// One heatmap cell: how many wrong answers a keyword collected on a day.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct HeatmapCell {
    pub keyword: String,
    pub date: String,
    pub wrong: u32,
}

pub struct PortfolioAggregator {
    portfolio_table: Table<PortfolioMap>,
    stats_table: Table<KeywordStatsMap>,
    portfolio: PortfolioMap,
    stats: KeywordStatsMap,
}

fn day_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

impl PortfolioAggregator {
    pub fn load(backend: &dyn StorageBackend) -> Self {
        let portfolio_table = Table::new(PORTFOLIO_KEY);
        let stats_table = Table::new(KEYWORD_STATS_KEY);
        let portfolio = portfolio_table.load(backend);
        let stats = stats_table.load(backend);
        Self {
            portfolio_table,
            stats_table,
            portfolio,
            stats,
        }
    }

    /// Apply one answered question. Every keyword on the question gets the
    /// identical update; a question with three keywords moves three holdings.
    ///
    /// Both maps are re-serialized wholesale afterwards — that is the write
    /// granularity of the store, and the practical scaling limit of this
    /// design.
    pub fn apply_answer(
        &mut self,
        backend: &dyn StorageBackend,
        keywords: &BTreeSet<String>,
        is_correct: bool,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        for keyword in keywords {
            let holding = self
                .portfolio
                .entry(keyword.clone())
                .or_insert_with(|| Holding {
                    credit: BASE_CREDIT,
                    growth: 0.0,
                    last_updated: now,
                });

            let old = holding.credit;
            let multiplier = if is_correct {
                CORRECT_MULTIPLIER
            } else {
                INCORRECT_MULTIPLIER
            };
            holding.credit = old * multiplier;
            holding.growth = (holding.credit - old) / old * 100.0;
            holding.last_updated = now;

            if !is_correct {
                let day = self
                    .stats
                    .entry(keyword.clone())
                    .or_insert_with(im::HashMap::new)
                    .entry(day_key(now))
                    .or_insert(0);
                *day += 1;
            }
        }

        if keywords.is_empty() {
            return Ok(());
        }
        self.save(backend)
    }

    pub fn holding(&self, keyword: &str) -> Option<&Holding> {
        self.portfolio.get(keyword)
    }

    /// All holdings, highest credit first.
    pub fn rows(&self) -> Vec<PortfolioRow> {
        let mut rows: Vec<PortfolioRow> = self
            .portfolio
            .iter()
            .map(|(keyword, h)| PortfolioRow {
                keyword: keyword.clone(),
                credit: h.credit,
                growth: h.growth,
                last_updated: h.last_updated,
            })
            .collect();
        rows.sort_by(|a, b| b.credit.total_cmp(&a.credit));
        rows
    }

    /// Heatmap cells for the trailing window, oldest day first. Day keys are
    /// `%Y-%m-%d`, so the cutoff comparison is plain string ordering.
    pub fn heatmap(&self, window_days: u32, now: DateTime<Utc>) -> Vec<HeatmapCell> {
        let cutoff = day_key(now - Duration::days(i64::from(window_days)));
        let mut cells: Vec<HeatmapCell> = self
            .stats
            .iter()
            .flat_map(|(keyword, days)| {
                days.iter()
                    .filter(|(date, _)| date.as_str() >= cutoff.as_str())
                    .map(|(date, wrong)| HeatmapCell {
                        keyword: keyword.clone(),
                        date: date.clone(),
                        wrong: *wrong,
                    })
            })
            .collect();
        cells.sort_by(|a, b| (a.date.as_str(), a.keyword.as_str()).cmp(&(b.date.as_str(), b.keyword.as_str())));
        cells
    }

    pub fn wrong_count(&self, keyword: &str, day: DateTime<Utc>) -> u32 {
        self.stats
            .get(keyword)
            .and_then(|days| days.get(&day_key(day)))
            .copied()
            .unwrap_or(0)
    }

    /// Explicit data-clear: the only operation that ever resets credit.
    pub fn clear(&mut self, backend: &dyn StorageBackend) {
        self.portfolio = PortfolioMap::new();
        self.stats = KeywordStatsMap::new();
        self.portfolio_table.clear(backend);
        self.stats_table.clear(backend);
    }

    pub fn snapshot(&self) -> (PortfolioMap, KeywordStatsMap) {
        (self.portfolio.clone(), self.stats.clone())
    }

    pub fn restore(
        &mut self,
        backend: &dyn StorageBackend,
        portfolio: PortfolioMap,
        stats: KeywordStatsMap,
    ) -> Result<(), StorageError> {
        self.portfolio = portfolio;
        self.stats = stats;
        self.save(backend)
    }

    fn save(&self, backend: &dyn StorageBackend) -> Result<(), StorageError> {
        self.portfolio_table
            .save(backend, &self.portfolio)
            .inspect_err(|e| log::error!("Error writing the portfolio: {e:?}"))?;
        self.stats_table
            .save(backend, &self.stats)
            .inspect_err(|e| log::error!("Error writing keyword stats: {e:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel::MemoryBackend;

    fn keywords(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|k| k.to_string()).collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn first_answer_initializes_then_steps() {
        let backend = MemoryBackend::new();
        let mut agg = PortfolioAggregator::load(&backend);

        agg.apply_answer(&backend, &keywords(&["iam"]), true, Utc::now())
            .unwrap();

        let holding = agg.holding("iam").unwrap();
        assert!(close(holding.credit, 105.0));
        assert!(close(holding.growth, 5.0));
    }

    #[test]
    fn step_rule_is_multiplicative_and_growth_is_per_step() {
        let backend = MemoryBackend::new();
        let mut agg = PortfolioAggregator::load(&backend);

        agg.apply_answer(&backend, &keywords(&["vpc"]), true, Utc::now())
            .unwrap();
        agg.apply_answer(&backend, &keywords(&["vpc"]), false, Utc::now())
            .unwrap();

        let holding = agg.holding("vpc").unwrap();
        assert!(close(holding.credit, 100.0 * 1.05 * 0.95));
        // Growth reflects only the last step, not the history
        assert!(close(holding.growth, -5.0));
    }

    #[test]
    fn every_keyword_on_the_question_moves_identically() {
        let backend = MemoryBackend::new();
        let mut agg = PortfolioAggregator::load(&backend);
        let now = Utc::now();

        agg.apply_answer(&backend, &keywords(&["iam", "security"]), false, now)
            .unwrap();

        for keyword in ["iam", "security"] {
            let holding = agg.holding(keyword).unwrap();
            assert!(close(holding.credit, 95.0));
            assert_eq!(agg.wrong_count(keyword, now), 1);
        }
    }

    #[test]
    fn correct_answers_do_not_touch_the_heatmap() {
        let backend = MemoryBackend::new();
        let mut agg = PortfolioAggregator::load(&backend);
        let now = Utc::now();

        agg.apply_answer(&backend, &keywords(&["s3"]), true, now)
            .unwrap();
        assert_eq!(agg.wrong_count("s3", now), 0);
        assert!(agg.heatmap(7, now).is_empty());
    }

    #[test]
    fn wrong_answers_bucket_per_day() {
        let backend = MemoryBackend::new();
        let mut agg = PortfolioAggregator::load(&backend);
        let today = Utc::now();
        let yesterday = today - Duration::days(1);

        agg.apply_answer(&backend, &keywords(&["s3"]), false, yesterday)
            .unwrap();
        agg.apply_answer(&backend, &keywords(&["s3"]), false, today)
            .unwrap();
        agg.apply_answer(&backend, &keywords(&["s3"]), false, today)
            .unwrap();

        assert_eq!(agg.wrong_count("s3", yesterday), 1);
        assert_eq!(agg.wrong_count("s3", today), 2);

        let cells = agg.heatmap(7, today);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].wrong, 1);
        assert_eq!(cells[1].wrong, 2);
    }

    #[test]
    fn heatmap_window_excludes_old_days() {
        let backend = MemoryBackend::new();
        let mut agg = PortfolioAggregator::load(&backend);
        let now = Utc::now();

        agg.apply_answer(&backend, &keywords(&["old"]), false, now - Duration::days(30))
            .unwrap();
        agg.apply_answer(&backend, &keywords(&["new"]), false, now)
            .unwrap();

        let cells = agg.heatmap(7, now);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].keyword, "new");
    }

    #[test]
    fn credit_compounds_without_floor_or_ceiling() {
        let backend = MemoryBackend::new();
        let mut agg = PortfolioAggregator::load(&backend);

        for _ in 0..100 {
            agg.apply_answer(&backend, &keywords(&["down"]), false, Utc::now())
                .unwrap();
            agg.apply_answer(&backend, &keywords(&["up"]), true, Utc::now())
                .unwrap();
        }

        let down = agg.holding("down").unwrap().credit;
        let up = agg.holding("up").unwrap().credit;
        assert!(close(down, 100.0 * 0.95_f64.powi(100)));
        assert!(close(up, 100.0 * 1.05_f64.powi(100)));
        assert!(down > 0.0 && down < 1.0);
        assert!(up > 10_000.0);
    }

    #[test]
    fn state_survives_a_reload() {
        let backend = MemoryBackend::new();
        let mut agg = PortfolioAggregator::load(&backend);
        let now = Utc::now();
        agg.apply_answer(&backend, &keywords(&["iam"]), false, now)
            .unwrap();

        let reloaded = PortfolioAggregator::load(&backend);
        assert!(close(reloaded.holding("iam").unwrap().credit, 95.0));
        assert_eq!(reloaded.wrong_count("iam", now), 1);
    }

    #[test]
    fn clear_resets_everything() {
        let backend = MemoryBackend::new();
        let mut agg = PortfolioAggregator::load(&backend);
        agg.apply_answer(&backend, &keywords(&["iam"]), false, Utc::now())
            .unwrap();

        agg.clear(&backend);
        assert!(agg.holding("iam").is_none());
        assert!(PortfolioAggregator::load(&backend).holding("iam").is_none());
    }
}
