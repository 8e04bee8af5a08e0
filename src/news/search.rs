//! News search collaborator.
//!
//! [`NewsSearch`] is the seam between the pipeline and the upstream search
//! API; [`GNewsClient`] is the production implementation. The API key is
//! passed per call rather than stored in the client so that the pipeline
//! decides, once, whether credentials are present.

use crate::error::FetchError;
use crate::models::{Article, Category};
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use url::Url;

/// One search request against the upstream API.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Category the query was expanded for.
    pub category: Category,
    /// Free-text query, already expanded with category keywords.
    pub text: String,
    pub language: String,
    pub country: String,
    pub max_results: u32,
    /// Oldest publication time to ask for.
    pub from: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawSource {
    pub name: Option<String>,
}

/// An article exactly as the search API returns it.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArticle {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub source: Option<RawSource>,
}

impl RawArticle {
    /// Convert into an [`Article`] tagged with `category`.
    pub fn into_article(self, category: Category) -> Article {
        Article {
            title: self.title.unwrap_or_default().trim().to_string(),
            description: self.description.unwrap_or_default().trim().to_string(),
            url: self.url.filter(|u| !u.trim().is_empty()),
            image_url: self.image.filter(|u| !u.trim().is_empty()),
            published_at: self.published_at.unwrap_or_default(),
            source: self.source.and_then(|s| s.name),
            category,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[async_trait]
pub trait NewsSearch: Send + Sync {
    async fn search(&self, query: &SearchQuery, api_key: &str)
    -> Result<Vec<RawArticle>, FetchError>;
}

/// Client for the GNews `search` endpoint.
pub struct GNewsClient {
    client: Client,
    base_url: String,
}

impl GNewsClient {
    pub fn new(
        base_url: &str,
        user_agent: &str,
        request_timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn search_url(&self, query: &SearchQuery, api_key: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| FetchError::Request(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", &query.text)
                .append_pair("lang", &query.language)
                .append_pair("country", &query.country)
                .append_pair("max", &query.max_results.to_string());
            if let Some(from) = query.from {
                pairs.append_pair("from", &from.to_rfc3339_opts(SecondsFormat::Secs, true));
            }
            pairs.append_pair("apikey", api_key);
        }
        Ok(url)
    }
}

#[async_trait]
impl NewsSearch for GNewsClient {
    #[instrument(level = "debug", skip_all, fields(category = %query.category))]
    async fn search(
        &self,
        query: &SearchQuery,
        api_key: &str,
    ) -> Result<Vec<RawArticle>, FetchError> {
        let url = self.search_url(query, api_key)?;
        let t0 = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                elapsed_ms = t0.elapsed().as_millis(),
                body = %truncate_for_log(&body, 200),
                "GNews returned non-success status"
            );
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: truncate_for_log(&body, 200),
            });
        }

        let body = response.text().await?;
        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))?;
        debug!(
            count = parsed.articles.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "GNews search succeeded"
        );
        Ok(parsed.articles)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> SearchQuery {
        SearchQuery {
            category: Category::Sports,
            text: "\"pune\" AND (sports OR cricket)".to_string(),
            language: "en".to_string(),
            country: "in".to_string(),
            max_results: 10,
            from: None,
        }
    }

    #[test]
    fn test_search_url_encodes_query() {
        let client = GNewsClient::new(
            "https://gnews.io/api/v4/search",
            "test-agent",
            Duration::from_secs(1),
        )
        .unwrap();
        let url = client.search_url(&query(), "k3y").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("gnews.io"));
        assert!(pairs.contains(&("q".into(), "\"pune\" AND (sports OR cricket)".into())));
        assert!(pairs.contains(&("lang".into(), "en".into())));
        assert!(pairs.contains(&("country".into(), "in".into())));
        assert!(pairs.contains(&("max".into(), "10".into())));
        assert!(pairs.contains(&("apikey".into(), "k3y".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "from"));
    }

    #[test]
    fn test_search_url_with_from() {
        let client = GNewsClient::new(
            "https://gnews.io/api/v4/search",
            "test-agent",
            Duration::from_secs(1),
        )
        .unwrap();
        let mut q = query();
        q.from = Some("2025-05-01T00:00:00Z".parse().unwrap());
        let url = client.search_url(&q, "k").unwrap();
        assert!(
            url.query_pairs()
                .any(|(k, v)| k == "from" && v == "2025-05-01T00:00:00Z")
        );
    }

    #[test]
    fn test_client_rejects_invalid_user_agent() {
        let res = GNewsClient::new(
            "https://gnews.io/api/v4/search",
            "bad\nagent",
            Duration::from_secs(1),
        );
        assert!(matches!(res, Err(FetchError::Request(_))));
    }

    #[test]
    fn test_parse_gnews_body() {
        let body = r#"{
            "totalArticles": 2,
            "articles": [
                {
                    "title": " Pune rains ",
                    "description": "Heavy showers",
                    "content": "...",
                    "url": "https://example.com/rain",
                    "image": "https://example.com/rain.jpg",
                    "publishedAt": "2025-05-06T10:00:00Z",
                    "source": {"name": "Example Times", "url": "https://example.com"}
                },
                {"title": "No link", "url": "", "publishedAt": null}
            ]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        let articles: Vec<Article> = parsed
            .articles
            .into_iter()
            .map(|r| r.into_article(Category::Weather))
            .collect();

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Pune rains");
        assert_eq!(articles[0].source.as_deref(), Some("Example Times"));
        assert_eq!(articles[0].category, Category::Weather);
        assert_eq!(articles[1].url, None);
        assert_eq!(articles[1].identity(), "No link");
        assert_eq!(articles[1].published_at, "");
    }

    #[test]
    fn test_parse_body_without_articles() {
        let parsed: SearchResponse = serde_json::from_str(r#"{"totalArticles": 0}"#).unwrap();
        assert!(parsed.articles.is_empty());
    }
}
