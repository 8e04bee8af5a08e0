//! Data models shared across the pipeline.
//!
//! - [`Coordinate`]: validated latitude/longitude pair
//! - [`Category`]: the closed set of topics fetched for every place
//! - [`Article`]: one upstream article, tagged with the category it was fetched for
//! - [`NewsFeed`]: what a caller gets back from a load request
//!
//! Serialized field names are camelCase to match the JSON shape of the
//! upstream news API.

use crate::error::PipelineError;
use crate::geocode::PlaceName;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A point on the map.
///
/// Both components are finite, latitude lies in `[-90, 90]` and longitude in
/// `[-180, 180]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, PipelineError> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        if valid {
            Ok(Self { lat, lon })
        } else {
            Err(PipelineError::InvalidCoordinate { lat, lon })
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

impl FromStr for Coordinate {
    type Err = String;

    /// Parses `"lat,lon"`, whitespace around either number is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| format!("expected `lat,lon`, got `{s}`"))?;
        let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {e}"))?;
        let lon: f64 = lon.trim().parse().map_err(|e| format!("bad longitude: {e}"))?;
        Coordinate::new(lat, lon).map_err(|e| e.to_string())
    }
}

/// Topic categories fetched for every place, in fetch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Sports,
    Politics,
    Weather,
}

impl Category {
    /// Every category, in the order the scheduler fetches them.
    pub const ALL: [Category; 4] = [
        Category::General,
        Category::Sports,
        Category::Politics,
        Category::Weather,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Sports => "sports",
            Category::Politics => "politics",
            Category::Weather => "weather",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown category `{s}`"))
    }
}

/// A news article as returned by the search API, tagged with the category
/// whose query produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub description: String,
    /// Canonical link; the identity key when present and non-empty.
    pub url: Option<String>,
    pub image_url: Option<String>,
    /// Raw publication timestamp exactly as the upstream sent it.
    pub published_at: String,
    /// Name of the publishing outlet, when the upstream reports one.
    pub source: Option<String>,
    pub category: Category,
}

impl Article {
    /// The key deciding uniqueness: the url if non-empty, else the title.
    pub fn identity(&self) -> &str {
        match self.url.as_deref() {
            Some(url) if !url.trim().is_empty() => url,
            _ => &self.title,
        }
    }

    /// Parsed publication time, or `None` when the raw value is not a
    /// timestamp we understand.
    ///
    /// Accepts RFC 3339 (`2025-05-06T14:30:00Z`) and the space-separated
    /// `2025-05-06 14:30:00` form, which is read as UTC.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.published_at.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Lifecycle state reported for a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    /// A run for the same location is already in flight.
    Loading,
    Ready,
    /// The run was superseded by a newer location before it finished.
    Cancelled,
    Error,
}

/// How much of the category fan-out succeeded, for a `Ready` feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    /// Every category fetch succeeded.
    Complete,
    /// At least one category failed but some articles were gathered.
    Partial,
    /// Nothing was gathered at all.
    Empty,
}

/// The answer to one load request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsFeed {
    pub status: LoadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completeness: Option<Completeness>,
    pub load_key: String,
    pub place: Option<PlaceName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub articles: Vec<Article>,
    pub total_before_filter: usize,
    pub advisory: Option<String>,
}

impl NewsFeed {
    /// Feed returned when a run for the same key is already in flight.
    pub fn loading(load_key: String) -> Self {
        Self::bare(LoadStatus::Loading, load_key, Some("still loading".to_string()))
    }

    pub fn cancelled(load_key: String) -> Self {
        Self::bare(
            LoadStatus::Cancelled,
            load_key,
            Some("superseded by a newer location request".to_string()),
        )
    }

    /// Render a blocking error in the same shape as a successful feed.
    pub fn failed(load_key: String, error: &PipelineError) -> Self {
        Self::bare(LoadStatus::Error, load_key, Some(error.to_string()))
    }

    fn bare(status: LoadStatus, load_key: String, advisory: Option<String>) -> Self {
        Self {
            status,
            completeness: None,
            load_key,
            place: None,
            display_name: None,
            articles: Vec::new(),
            total_before_filter: 0,
            advisory,
        }
    }
}
