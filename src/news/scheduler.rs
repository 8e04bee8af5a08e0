//! Paced fan-out over every category.
//!
//! Calls are strictly sequential with a fixed pause between them: the news
//! API enforces a per-key request rate, and parallel calls would trip it.
//! A failed category is recorded and skipped; iteration always continues.
//! Cancellation is checked before every call and interrupts both an
//! in-progress call and the pause.

use crate::geocode::PlaceName;
use crate::guard::CancelSignal;
use crate::models::{Article, Category};
use crate::news::fetcher::CategoryFetcher;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Everything gathered for one place.
#[derive(Debug, Default)]
pub struct Aggregation {
    /// Articles in category order, then upstream order within a category.
    pub articles: Vec<Article>,
    /// Categories whose fetch failed.
    pub failed: Vec<Category>,
    /// Categories that were actually requested.
    pub attempted: Vec<Category>,
    pub cancelled: bool,
}

pub struct AggregationScheduler {
    fetcher: CategoryFetcher,
    pacing: Duration,
}

impl AggregationScheduler {
    pub fn new(fetcher: CategoryFetcher, pacing: Duration) -> Self {
        Self { fetcher, pacing }
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Fetch every category for `place` in [`Category::ALL`] order.
    ///
    /// Stops early, with `cancelled` set, as soon as `cancel` fires.
    #[instrument(level = "info", skip_all, fields(place = %place))]
    pub async fn run(&self, place: &PlaceName, api_key: &str, cancel: &CancelSignal) -> Aggregation {
        let t0 = Instant::now();
        let mut agg = Aggregation::default();

        for (i, category) in Category::ALL.into_iter().enumerate() {
            if cancel.is_cancelled() {
                agg.cancelled = true;
                break;
            }

            agg.attempted.push(category);
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    agg.cancelled = true;
                    break;
                }
                outcome = self.fetcher.fetch(place, category, api_key) => outcome,
            };

            if outcome.is_failed() {
                agg.failed.push(category);
            }
            let articles = outcome.into_articles();
            debug!(%category, count = articles.len(), "Category done");
            agg.articles.extend(articles);

            if i + 1 < Category::ALL.len() && !self.pacing.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        agg.cancelled = true;
                        break;
                    }
                    _ = sleep(self.pacing) => {}
                }
            }
        }

        if agg.cancelled {
            warn!(
                attempted = agg.attempted.len(),
                elapsed_ms = t0.elapsed().as_millis(),
                "Aggregation cancelled"
            );
        } else {
            info!(
                total = agg.articles.len(),
                failed = agg.failed.len(),
                elapsed_ms = t0.elapsed().as_millis(),
                "Aggregation finished"
            );
        }
        agg
    }
}
