//! Coordinate → place name resolution.
//!
//! A [`GeocodeResolver`] asks a [`ReverseGeocoder`] for the address at a
//! coordinate, picks the most specific usable address field and normalizes
//! it into a [`PlaceName`]. Resolution never fails: any problem along the way
//! (network, timeout, bad status, unparsable body, no address fields) yields
//! the sentinel place instead, so the news fetch still has something to
//! search for.
//!
//! # Normalization
//!
//! 1. lowercase and collapse whitespace
//! 2. strip trailing ` district`, ` division` and ` state` (repeatedly)
//! 3. map legacy or variant spellings through a fixed correction table
//!
//! Every correction target is itself a fixed point of steps 1–3, which keeps
//! normalization idempotent.

use crate::error::GeocodeError;
use crate::models::Coordinate;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Place searched for when the real location cannot be resolved.
pub const SENTINEL_PLACE: &str = "India";

static ADMIN_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(district|division|state)$").unwrap());

static SPELLING_CORRECTIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("bangalore", "bengaluru"),
        ("bombay", "mumbai"),
        ("calcutta", "kolkata"),
        ("madras", "chennai"),
        ("gurgaon", "gurugram"),
        ("poona", "pune"),
        ("trivandrum", "thiruvananthapuram"),
        ("baroda", "vadodara"),
        ("benares", "varanasi"),
        ("mysore", "mysuru"),
        ("national capital territory of delhi", "delhi"),
    ])
});

/// Normalize a raw place name. Returns an empty string if nothing is left.
pub fn normalize_place(raw: &str) -> String {
    let mut name = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    loop {
        let stripped = ADMIN_SUFFIX.replace(&name, "").trim().to_string();
        if stripped == name {
            break;
        }
        name = stripped;
    }

    match SPELLING_CORRECTIONS.get(name.as_str()) {
        Some(corrected) => corrected.to_string(),
        None => name,
    }
}

/// A normalized, lowercase place name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PlaceName(String);

impl PlaceName {
    /// Normalize `raw`; `None` if it normalizes to nothing.
    pub fn new(raw: &str) -> Option<Self> {
        let name = normalize_place(raw);
        (!name.is_empty()).then_some(Self(name))
    }

    pub fn sentinel() -> Self {
        Self(normalize_place(SENTINEL_PLACE))
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::sentinel()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address fields we select a place from, as named by Nominatim.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub state_district: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
}

impl Address {
    /// Most specific non-blank field: city > town > village > district > state.
    pub fn best_name(&self) -> Option<&str> {
        [
            &self.city,
            &self.town,
            &self.village,
            &self.state_district,
            &self.district,
            &self.state,
        ]
        .into_iter()
        .filter_map(|field| field.as_deref())
        .map(str::trim)
        .find(|name| !name.is_empty())
    }
}

/// Body of a reverse-geocoding answer.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ReverseGeocode {
    pub display_name: Option<String>,
    pub address: Option<Address>,
}

/// Something that can turn a coordinate into address fields.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, coordinate: Coordinate) -> Result<ReverseGeocode, GeocodeError>;
}

/// Reverse geocoding against a Nominatim instance.
pub struct NominatimClient {
    client: Client,
    base_url: String,
}

impl NominatimClient {
    /// Build a client that identifies itself with `user_agent`.
    ///
    /// Fails rather than falling back to a default client: Nominatim rejects
    /// requests without an identifying User-Agent.
    pub fn new(
        base_url: &str,
        user_agent: &str,
        request_timeout: Duration,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    #[instrument(level = "debug", skip(self))]
    async fn reverse(&self, coordinate: Coordinate) -> Result<ReverseGeocode, GeocodeError> {
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("format", "json".to_string()),
                ("lat", coordinate.lat().to_string()),
                ("lon", coordinate.lon().to_string()),
                ("accept-language", "en".to_string()),
            ],
        )
        .map_err(|e| GeocodeError::Request(e.to_string()))?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }
        Ok(response.json::<ReverseGeocode>().await?)
    }
}

/// Outcome of resolving a location.
#[derive(Debug, Clone)]
pub struct ResolvedPlace {
    pub place: PlaceName,
    pub display_name: Option<String>,
    /// True when the sentinel was used because resolution failed.
    pub fell_back: bool,
}

impl ResolvedPlace {
    fn sentinel(fell_back: bool) -> Self {
        Self {
            place: PlaceName::sentinel(),
            display_name: None,
            fell_back,
        }
    }
}

pub struct GeocodeResolver {
    geocoder: Arc<dyn ReverseGeocoder>,
    call_timeout: Duration,
}

impl GeocodeResolver {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>, call_timeout: Duration) -> Self {
        Self {
            geocoder,
            call_timeout,
        }
    }

    /// Resolve `coordinate` to a place. With no coordinate the sentinel is
    /// used without calling out.
    #[instrument(level = "info", skip(self))]
    pub async fn resolve(&self, coordinate: Option<Coordinate>) -> ResolvedPlace {
        let Some(coordinate) = coordinate else {
            debug!("No coordinate supplied; using sentinel place");
            return ResolvedPlace::sentinel(false);
        };

        let t0 = Instant::now();
        let answer = match timeout(self.call_timeout, self.geocoder.reverse(coordinate)).await {
            Ok(res) => res,
            Err(_) => Err(GeocodeError::Timeout(self.call_timeout)),
        };
        let elapsed_ms = t0.elapsed().as_millis();

        let resolved = answer.and_then(|geo| {
            let place = geo
                .address
                .as_ref()
                .and_then(Address::best_name)
                .and_then(PlaceName::new)
                .ok_or(GeocodeError::NoAddress)?;
            Ok(ResolvedPlace {
                place,
                display_name: geo.display_name,
                fell_back: false,
            })
        });

        match resolved {
            Ok(r) => {
                info!(place = %r.place, elapsed_ms, "Resolved place");
                r
            }
            Err(e) => {
                warn!(error = %e, elapsed_ms, sentinel = SENTINEL_PLACE, "Geocoding failed; using sentinel place");
                ResolvedPlace::sentinel(true)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted geocoder that counts its calls.
    pub struct FakeGeocoder {
        pub answer: Result<ReverseGeocode, u16>,
        pub delay: Duration,
        pub calls: AtomicUsize,
    }

    impl FakeGeocoder {
        pub fn city(name: &str) -> Self {
            Self {
                answer: Ok(ReverseGeocode {
                    display_name: Some(format!("{name}, India")),
                    address: Some(Address {
                        city: Some(name.to_string()),
                        ..Address::default()
                    }),
                }),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(status: u16) -> Self {
            Self {
                answer: Err(status),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReverseGeocoder for FakeGeocoder {
        async fn reverse(&self, _coordinate: Coordinate) -> Result<ReverseGeocode, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match &self.answer {
                Ok(geo) => Ok(geo.clone()),
                Err(status) => Err(GeocodeError::Status(*status)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::FakeGeocoder;
    use super::*;

    fn coord() -> Coordinate {
        Coordinate::new(18.5204, 73.8567).unwrap()
    }

    #[test]
    fn test_normalize_strips_suffixes() {
        assert_eq!(normalize_place("Pune District"), "pune");
        assert_eq!(normalize_place("Konkan Division"), "konkan");
        assert_eq!(normalize_place("Goa State"), "goa");
        assert_eq!(normalize_place("  Nashik   district  division "), "nashik");
    }

    #[test]
    fn test_normalize_keeps_inner_words() {
        assert_eq!(normalize_place("State Bank Colony"), "state bank colony");
        assert_eq!(normalize_place("District"), "district");
    }

    #[test]
    fn test_normalize_applies_corrections() {
        assert_eq!(normalize_place("Bangalore"), "bengaluru");
        assert_eq!(normalize_place("Bombay"), "mumbai");
        assert_eq!(normalize_place("Gurgaon District"), "gurugram");
        assert_eq!(normalize_place("National Capital Territory of Delhi"), "delhi");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "Pune District",
            "Bangalore",
            "  Mumbai Suburban  ",
            "Nashik District Division",
            "India",
            "National Capital Territory of Delhi",
            "State",
            "",
        ];
        for raw in samples {
            let once = normalize_place(raw);
            assert_eq!(normalize_place(&once), once, "not idempotent for {raw:?}");
        }
        for target in SPELLING_CORRECTIONS.values() {
            assert_eq!(normalize_place(target), *target);
        }
    }

    #[test]
    fn test_place_name_rejects_blank() {
        assert!(PlaceName::new("   ").is_none());
        assert_eq!(PlaceName::sentinel().as_str(), "india");
        assert!(PlaceName::new("INDIA").unwrap().is_sentinel());
    }

    #[test]
    fn test_address_priority() {
        let addr = Address {
            town: Some("Lonavala".to_string()),
            state_district: Some("Pune District".to_string()),
            state: Some("Maharashtra".to_string()),
            ..Address::default()
        };
        assert_eq!(addr.best_name(), Some("Lonavala"));

        let addr = Address {
            city: Some("  ".to_string()),
            district: Some("Thane".to_string()),
            state: Some("Maharashtra".to_string()),
            ..Address::default()
        };
        assert_eq!(addr.best_name(), Some("Thane"));

        assert_eq!(Address::default().best_name(), None);
    }

    #[test]
    fn test_client_requires_valid_user_agent() {
        let bad = NominatimClient::new(
            "https://nominatim.openstreetmap.org/reverse",
            "bad\nagent",
            Duration::from_secs(1),
        );
        assert!(matches!(bad, Err(GeocodeError::Request(_))));

        let good = NominatimClient::new(
            "https://nominatim.openstreetmap.org/reverse",
            "local_news_feed/test",
            Duration::from_secs(1),
        );
        assert!(good.is_ok());
    }

    #[test]
    fn test_parse_nominatim_body() {
        let body = r#"{
            "display_name": "Pune, Pune District, Maharashtra, India",
            "address": {"city": "Pune", "state_district": "Pune District", "state": "Maharashtra", "country": "India"}
        }"#;
        let geo: ReverseGeocode = serde_json::from_str(body).unwrap();
        assert_eq!(geo.address.unwrap().best_name(), Some("Pune"));

        let err_body = r#"{"error": "Unable to geocode"}"#;
        let geo: ReverseGeocode = serde_json::from_str(err_body).unwrap();
        assert!(geo.address.is_none());
    }

    #[tokio::test]
    async fn test_resolve_success() {
        let geocoder = Arc::new(FakeGeocoder::city("Bombay"));
        let resolver = GeocodeResolver::new(geocoder.clone(), Duration::from_secs(1));

        let r = resolver.resolve(Some(coord())).await;
        assert_eq!(r.place.as_str(), "mumbai");
        assert!(!r.fell_back);
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_failure_falls_back_once() {
        let geocoder = Arc::new(FakeGeocoder::failing(503));
        let resolver = GeocodeResolver::new(geocoder.clone(), Duration::from_secs(1));

        let r = resolver.resolve(Some(coord())).await;
        assert!(r.place.is_sentinel());
        assert!(r.fell_back);
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_without_address_falls_back() {
        let geocoder = Arc::new(FakeGeocoder {
            answer: Ok(ReverseGeocode::default()),
            delay: Duration::ZERO,
            calls: Default::default(),
        });
        let resolver = GeocodeResolver::new(geocoder, Duration::from_secs(1));
        assert!(resolver.resolve(Some(coord())).await.place.is_sentinel());
    }

    #[tokio::test]
    async fn test_resolve_times_out() {
        let mut slow = FakeGeocoder::city("Pune");
        slow.delay = Duration::from_secs(5);
        let resolver = GeocodeResolver::new(Arc::new(slow), Duration::from_millis(20));

        let r = resolver.resolve(Some(coord())).await;
        assert!(r.place.is_sentinel());
        assert!(r.fell_back);
    }

    #[tokio::test]
    async fn test_resolve_without_coordinate_skips_call() {
        let geocoder = Arc::new(FakeGeocoder::city("Pune"));
        let resolver = GeocodeResolver::new(geocoder.clone(), Duration::from_secs(1));

        let r = resolver.resolve(None).await;
        assert!(r.place.is_sentinel());
        assert!(!r.fell_back);
        assert_eq!(geocoder.calls(), 0);
    }
}
