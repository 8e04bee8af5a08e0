//! Runtime settings.
//!
//! Settings come from three layers, later ones winning:
//! 1. built-in defaults ([`Settings::default`])
//! 2. an optional YAML file ([`load_settings`])
//! 3. command-line flags and environment variables ([`crate::cli::Cli`])
//!
//! # Example
//!
//! ```yaml
//! gnews_api_key: "..."
//! country: in
//! pacing_ms: 500
//! request_timeout_secs: 8
//! ```

use crate::error::PipelineError;
use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// GNews API key. Absent means every load fails with a configuration error.
    pub gnews_api_key: Option<String>,
    pub gnews_base_url: String,
    pub nominatim_base_url: String,
    /// Nominatim's usage policy requires an identifying User-Agent.
    pub user_agent: String,
    pub language: String,
    pub country: String,
    /// Upper bound on articles returned per category call.
    pub page_size: u32,
    /// Wait between successive category calls, in milliseconds.
    pub pacing_ms: u64,
    /// Budget for any single external call, in seconds.
    pub request_timeout_secs: u64,
    /// Cancel runs for other locations when a new location is admitted.
    pub cancel_superseded: bool,
    /// When set, only ask for articles published within this many days.
    pub lookback_days: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gnews_api_key: None,
            gnews_base_url: "https://gnews.io/api/v4/search".to_string(),
            nominatim_base_url: "https://nominatim.openstreetmap.org/reverse".to_string(),
            user_agent: concat!("local_news_feed/", env!("CARGO_PKG_VERSION")).to_string(),
            language: "en".to_string(),
            country: "in".to_string(),
            page_size: 10,
            pacing_ms: 450,
            request_timeout_secs: 10,
            cancel_superseded: true,
            lookback_days: None,
        }
    }
}

impl Settings {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The news API key, or a configuration error if it is missing or blank.
    pub fn require_api_key(&self) -> Result<&str, PipelineError> {
        match self.gnews_api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(PipelineError::Configuration(
                "GNEWS_API_KEY is not set".to_string(),
            )),
        }
    }
}

// The API key must never end up in logs.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field(
                "gnews_api_key",
                &self.gnews_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("gnews_base_url", &self.gnews_base_url)
            .field("nominatim_base_url", &self.nominatim_base_url)
            .field("user_agent", &self.user_agent)
            .field("language", &self.language)
            .field("country", &self.country)
            .field("page_size", &self.page_size)
            .field("pacing_ms", &self.pacing_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("cancel_superseded", &self.cancel_superseded)
            .field("lookback_days", &self.lookback_days)
            .finish()
    }
}

/// Load settings from a YAML file, or the defaults when no path is given.
#[instrument(level = "info")]
pub async fn load_settings(path: Option<&str>) -> Result<Settings, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let raw = fs::read_to_string(path).await?;
    let settings: Settings = serde_yaml::from_str(&raw)?;
    info!(path, "Loaded settings file");
    Ok(settings)
}
