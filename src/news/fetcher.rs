//! One category, one external call.

use crate::error::FetchError;
use crate::geocode::PlaceName;
use crate::models::{Article, Category};
use crate::news::search::{NewsSearch, SearchQuery};
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{info, instrument, warn};

/// Extra keywords OR-ed into the query, since the upstream only does keyword
/// matching and has no notion of topic for a free-text search.
pub fn category_keywords(category: Category) -> Option<&'static str> {
    match category {
        Category::General => None,
        Category::Sports => Some("sports OR cricket OR football OR match"),
        Category::Politics => Some("politics OR election OR government OR minister"),
        Category::Weather => Some("weather OR rain OR temperature OR forecast"),
    }
}

/// Build the search text for `place` in `category`.
pub fn expand_query(place: &PlaceName, category: Category) -> String {
    let place = place.as_str().replace('"', "");
    match category_keywords(category) {
        None => format!("\"{place}\""),
        Some(keywords) => format!("\"{place}\" AND ({keywords})"),
    }
}

/// Result of one category fetch. Never an error: failures carry their cause
/// for logging and status reporting but contribute no articles.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(Vec<Article>),
    Failed(FetchError),
}

impl FetchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }

    pub fn into_articles(self) -> Vec<Article> {
        match self {
            FetchOutcome::Fetched(articles) => articles,
            FetchOutcome::Failed(_) => Vec::new(),
        }
    }
}

/// Fixed request parameters applied to every category call.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub language: String,
    pub country: String,
    pub max_results: u32,
    pub lookback_days: Option<u32>,
}

pub struct CategoryFetcher {
    search: Arc<dyn NewsSearch>,
    params: SearchParams,
    call_timeout: Duration,
}

impl CategoryFetcher {
    pub fn new(search: Arc<dyn NewsSearch>, params: SearchParams, call_timeout: Duration) -> Self {
        Self {
            search,
            params,
            call_timeout,
        }
    }

    fn query(&self, place: &PlaceName, category: Category) -> SearchQuery {
        SearchQuery {
            category,
            text: expand_query(place, category),
            language: self.params.language.clone(),
            country: self.params.country.clone(),
            max_results: self.params.max_results,
            from: self
                .params
                .lookback_days
                .map(|days| Utc::now() - ChronoDuration::days(i64::from(days))),
        }
    }

    /// Fetch one category for `place`, bounded by the per-call timeout.
    ///
    /// # Arguments
    ///
    /// * `place` - Normalized place the query is built around
    /// * `category` - Category whose keywords are added to the query
    /// * `api_key` - Credential forwarded to the search service
    ///
    /// # Returns
    ///
    /// [`FetchOutcome::Fetched`] with the articles tagged `category`, or
    /// [`FetchOutcome::Failed`] for transport errors, bad statuses,
    /// unparsable bodies and timeouts alike.
    #[instrument(level = "info", skip(self, place, api_key), fields(place = %place))]
    pub async fn fetch(&self, place: &PlaceName, category: Category, api_key: &str) -> FetchOutcome {
        let query = self.query(place, category);
        let t0 = Instant::now();

        let result = match timeout(self.call_timeout, self.search.search(&query, api_key)).await {
            Ok(res) => res,
            Err(_) => Err(FetchError::Timeout(self.call_timeout)),
        };
        let elapsed_ms = t0.elapsed().as_millis();

        match result {
            Ok(raw) => {
                let articles: Vec<Article> = raw
                    .into_iter()
                    .map(|r| r.into_article(category))
                    .collect();
                info!(count = articles.len(), elapsed_ms, "Fetched category");
                FetchOutcome::Fetched(articles)
            }
            Err(e) => {
                warn!(error = %e, elapsed_ms, "Category fetch failed; continuing without it");
                FetchOutcome::Failed(e)
            }
        }
    }
}
