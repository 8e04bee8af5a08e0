//! The location-to-news pipeline.
//!
//! [`NewsService::load`] is the one operation exposed to callers:
//!
//! 1. **Admission**: the [`LoadGuard`] decides whether to run at all
//! 2. **Resolving**: coordinate → place name (fail-soft)
//! 3. **Fetching**: one paced call per category (fail-soft per category)
//! 4. **Deduplicating**: first occurrence of each article wins
//! 5. **Filtering**: caller criteria applied to the deduplicated set
//!
//! Only a missing API key stops a request with an error. Everything else
//! degrades the feed and explains itself in `advisory`.

use crate::config::Settings;
use crate::dedup::ArticleSet;
use crate::error::PipelineError;
use crate::filter::FilterCriteria;
use crate::geocode::{GeocodeResolver, NominatimClient, PlaceName, ReverseGeocoder};
use crate::guard::{Admission, LoadGuard, LoadKey};
use crate::models::{Category, Completeness, Coordinate, LoadStatus, NewsFeed};
use crate::news::fetcher::{CategoryFetcher, SearchParams};
use crate::news::scheduler::{Aggregation, AggregationScheduler};
use crate::news::search::{GNewsClient, NewsSearch};
use chrono::Utc;
use itertools::Itertools;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Unfiltered outcome of a finished run, kept by the guard for reuse.
#[derive(Debug)]
struct CompletedRun {
    place: PlaceName,
    display_name: Option<String>,
    articles: ArticleSet,
    completeness: Completeness,
    advisory: Option<String>,
}

impl CompletedRun {
    fn to_feed(&self, key: &LoadKey, criteria: &FilterCriteria) -> NewsFeed {
        let articles = criteria.apply(&self.articles, Utc::now());
        let mut notes: Vec<String> = self.advisory.iter().cloned().collect();
        if articles.is_empty() && !self.articles.is_empty() {
            notes.push("No articles match the current filters.".to_string());
        }
        NewsFeed {
            status: LoadStatus::Ready,
            completeness: Some(self.completeness),
            load_key: key.to_string(),
            place: Some(self.place.clone()),
            display_name: self.display_name.clone(),
            total_before_filter: self.articles.len(),
            articles,
            advisory: (!notes.is_empty()).then(|| notes.join(" ")),
        }
    }
}

fn completeness(agg: &Aggregation, articles: &ArticleSet) -> Completeness {
    if articles.is_empty() {
        Completeness::Empty
    } else if agg.failed.is_empty() {
        Completeness::Complete
    } else {
        Completeness::Partial
    }
}

fn advisory(place: &PlaceName, fell_back: bool, agg: &Aggregation, articles: &ArticleSet) -> Option<String> {
    let mut notes = Vec::new();
    if fell_back {
        notes.push(format!(
            "Could not resolve the location; showing news for {place}."
        ));
    }
    if agg.failed.len() == Category::ALL.len() {
        notes.push("The news service is unavailable; no categories could be loaded.".to_string());
    } else if !agg.failed.is_empty() {
        notes.push(format!(
            "Some categories could not be loaded: {}.",
            agg.failed.iter().join(", ")
        ));
    }
    if articles.is_empty() && agg.failed.len() < Category::ALL.len() {
        notes.push(format!("No articles found for {place}."));
    }
    (!notes.is_empty()).then(|| notes.join(" "))
}

pub struct NewsService {
    settings: Settings,
    resolver: GeocodeResolver,
    scheduler: AggregationScheduler,
    guard: LoadGuard<Arc<CompletedRun>>,
}

impl NewsService {
    pub fn new(
        settings: &Settings,
        geocoder: Arc<dyn ReverseGeocoder>,
        search: Arc<dyn NewsSearch>,
    ) -> Self {
        let params = SearchParams {
            language: settings.language.clone(),
            country: settings.country.clone(),
            max_results: settings.page_size,
            lookback_days: settings.lookback_days,
        };
        let fetcher = CategoryFetcher::new(search, params, settings.request_timeout());
        let service = Self {
            settings: settings.clone(),
            resolver: GeocodeResolver::new(geocoder, settings.request_timeout()),
            scheduler: AggregationScheduler::new(fetcher, settings.pacing()),
            guard: LoadGuard::new(settings.cancel_superseded),
        };
        debug!(
            pacing_ms = service.scheduler.pacing().as_millis(),
            cancel_superseded = settings.cancel_superseded,
            "News service ready"
        );
        service
    }

    /// Service talking to Nominatim and GNews as configured.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Configuration`] if an HTTP client cannot be built
    /// from the settings (for example a User-Agent that is not a valid
    /// header value).
    pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        let timeout = settings.request_timeout();
        let geocoder =
            NominatimClient::new(&settings.nominatim_base_url, &settings.user_agent, timeout)
                .map_err(|e| PipelineError::Configuration(format!("geocoder client: {e}")))?;
        let search = GNewsClient::new(&settings.gnews_base_url, &settings.user_agent, timeout)
            .map_err(|e| PipelineError::Configuration(format!("news client: {e}")))?;
        Ok(Self::new(settings, Arc::new(geocoder), Arc::new(search)))
    }

    /// Load news for `coordinate` (or the default place) filtered by
    /// `criteria`.
    ///
    /// # Arguments
    ///
    /// * `coordinate` - Map position; `None` loads the default place
    /// * `criteria` - Filters applied to the deduplicated result
    ///
    /// # Returns
    ///
    /// A [`NewsFeed`] whose `status` tells the caller what happened:
    /// `ready` with results (possibly `partial` or `empty`), `loading` when a
    /// run for the same location is already going, or `cancelled` when a
    /// newer location superseded this run.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Configuration`] when no API key is configured. No
    /// external call is made in that case.
    #[instrument(level = "info", skip(self, criteria))]
    pub async fn load(
        &self,
        coordinate: Option<Coordinate>,
        criteria: &FilterCriteria,
    ) -> Result<NewsFeed, PipelineError> {
        let key = LoadKey::new(coordinate);
        let permit = match self.guard.admit(key.clone()) {
            Admission::Cached(run) => return Ok(run.to_feed(&key, criteria)),
            Admission::InFlight => return Ok(NewsFeed::loading(key.to_string())),
            Admission::Admitted(permit) => permit,
        };

        // From here on the permit's drop releases the key on every return.
        let api_key = self.settings.require_api_key()?;
        let t0 = Instant::now();
        info!(%key, "Pipeline run admitted");

        let resolved = tokio::select! {
            biased;
            _ = permit.signal().cancelled() => return Ok(NewsFeed::cancelled(key.to_string())),
            resolved = self.resolver.resolve(coordinate) => resolved,
        };

        let mut agg = self
            .scheduler
            .run(&resolved.place, api_key, permit.signal())
            .await;
        if agg.cancelled {
            return Ok(NewsFeed::cancelled(key.to_string()));
        }

        let fetched = agg.articles.len();
        let articles = ArticleSet::dedup(std::mem::take(&mut agg.articles));
        let run = Arc::new(CompletedRun {
            completeness: completeness(&agg, &articles),
            advisory: advisory(&resolved.place, resolved.fell_back, &agg, &articles),
            place: resolved.place,
            display_name: resolved.display_name,
            articles,
        });
        let feed = run.to_feed(&key, criteria);

        info!(
            %key,
            place = %run.place,
            fetched,
            unique = run.articles.len(),
            shown = feed.articles.len(),
            completeness = ?run.completeness,
            elapsed_ms = t0.elapsed().as_millis(),
            "Pipeline run finished"
        );

        // An empty run is not remembered so the same location can be retried.
        if run.completeness == Completeness::Empty {
            warn!(%key, "Run produced no articles; not caching");
        } else if !permit.complete(run) {
            // Superseded after the last fetch returned.
            info!(%key, "Run was cancelled while finishing");
            return Ok(NewsFeed::cancelled(key.to_string()));
        }
        Ok(feed)
    }

    /// Cancel every run in flight.
    pub fn cancel_all(&self) -> usize {
        self.guard.cancel_all()
    }

    /// Forget the last completed location so it is fetched again.
    pub fn reset(&self) {
        self.guard.forget();
    }
}
