//! Command-line interface definitions.
//!
//! Every option can also come from the environment; values given here take
//! precedence over the YAML settings file.

use crate::config::Settings;
use crate::error::PipelineError;
use crate::filter::{CategoryFilter, FilterCriteria, MaxAge};
use crate::models::Coordinate;
use clap::Parser;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # News near Pune, sports only, last three days
/// local_news_feed --lat 18.52 --lon 73.85 -c sports -d 3
///
/// # No coordinate: news for the default place
/// local_news_feed -s monsoon
///
/// # Session mode: one `lat,lon` per line on stdin
/// printf '18.52,73.85\n19.07,72.87\n' | local_news_feed --stdin
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Latitude of the location, in degrees
    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    pub lat: Option<f64>,

    /// Longitude of the location, in degrees
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    pub lon: Option<f64>,

    /// Category to show: all, general, sports, politics or weather
    #[arg(short, long, default_value = "all")]
    pub category: CategoryFilter,

    /// Maximum article age in days, or "all"
    #[arg(short, long, default_value = "all")]
    pub days: MaxAge,

    /// Only show articles whose title or description contains this text
    #[arg(short, long, default_value = "")]
    pub search: String,

    /// Optional path to a YAML settings file
    #[arg(long, env = "NEWS_FEED_CONFIG")]
    pub config: Option<String>,

    /// GNews API key
    #[arg(long, env = "GNEWS_API_KEY", hide_env_values = true)]
    pub gnews_api_key: Option<String>,

    /// Pause between category requests, in milliseconds
    #[arg(long, env = "NEWS_FEED_PACING_MS")]
    pub pacing_ms: Option<u64>,

    /// Budget for each external request, in seconds
    #[arg(long, env = "NEWS_FEED_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Two-letter country code passed to the news search
    #[arg(long)]
    pub country: Option<String>,

    /// Language code passed to the news search
    #[arg(long)]
    pub language: Option<String>,

    /// Let runs for earlier locations finish instead of cancelling them
    #[arg(long)]
    pub keep_superseded: bool,

    /// Write the feed to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Read locations from stdin, one per line, for the whole session
    #[arg(long, conflicts_with_all = ["lat", "lon", "output"])]
    pub stdin: bool,
}

impl Cli {
    pub fn coordinate(&self) -> Result<Option<Coordinate>, PipelineError> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Coordinate::new(lat, lon).map(Some),
            _ => Ok(None),
        }
    }

    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            category: self.category,
            max_age: self.days,
            search_text: self.search.clone(),
        }
    }

    /// Layer the flags that were given over `settings`.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(key) = &self.gnews_api_key {
            settings.gnews_api_key = Some(key.clone());
        }
        if let Some(ms) = self.pacing_ms {
            settings.pacing_ms = ms;
        }
        if let Some(secs) = self.timeout_secs {
            settings.request_timeout_secs = secs;
        }
        if let Some(country) = &self.country {
            settings.country = country.clone();
        }
        if let Some(language) = &self.language {
            settings.language = language.clone();
        }
        if self.keep_superseded {
            settings.cancel_superseded = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["local_news_feed"]);
        assert_eq!(cli.criteria(), FilterCriteria::default());
        assert!(cli.coordinate().unwrap().is_none());
        assert!(!cli.stdin);
    }

    #[test]
    fn test_cli_full_criteria() {
        let cli = Cli::parse_from([
            "local_news_feed",
            "--lat",
            "-33.86",
            "--lon",
            "151.21",
            "-c",
            "sports",
            "-d",
            "3",
            "-s",
            "match",
        ]);

        let c = cli.coordinate().unwrap().unwrap();
        assert_eq!(c.lat(), -33.86);
        let criteria = cli.criteria();
        assert_eq!(criteria.category, CategoryFilter::Only(Category::Sports));
        assert_eq!(criteria.max_age, "3".parse().unwrap());
        assert_eq!(criteria.search_text, "match");
    }

    #[test]
    fn test_cli_rejects_lone_latitude() {
        assert!(Cli::try_parse_from(["local_news_feed", "--lat", "18.5"]).is_err());
    }

    #[test]
    fn test_cli_rejects_bad_days() {
        assert!(Cli::try_parse_from(["local_news_feed", "-d", "0"]).is_err());
        assert!(Cli::try_parse_from(["local_news_feed", "-c", "business"]).is_err());
    }

    #[test]
    fn test_out_of_range_coordinate() {
        let cli = Cli::parse_from(["local_news_feed", "--lat", "95", "--lon", "10"]);
        assert!(matches!(
            cli.coordinate(),
            Err(PipelineError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "local_news_feed",
            "--gnews-api-key",
            "abc",
            "--pacing-ms",
            "600",
            "--country",
            "us",
            "--keep-superseded",
        ]);
        let mut settings = Settings::default();
        cli.apply_overrides(&mut settings);

        assert_eq!(settings.gnews_api_key.as_deref(), Some("abc"));
        assert_eq!(settings.pacing_ms, 600);
        assert_eq!(settings.country, "us");
        assert_eq!(settings.language, "en");
        assert!(!settings.cancel_superseded);
    }
}
