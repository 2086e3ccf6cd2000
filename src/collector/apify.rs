//! Platform sources backed by hosted scraping actors.
//!
//! Each actor is run synchronously and its dataset items are returned in the
//! same response, so one HTTP call per platform query.

use super::{
    Platform, SearchQuery, SortOrder, TermSource, TrendSource, TrendingTerm, VideoCandidate,
};
use crate::error::{ReelError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Minimal client for running scraping actors.
#[derive(Clone)]
pub struct ApifyClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApifyClient {
    pub fn new(http: reqwest::Client, base_url: &str, token: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Run an actor and deserialize its dataset items.
    #[instrument(skip(self, input))]
    pub async fn run_actor<T: DeserializeOwned>(
        &self,
        actor: &str,
        input: &serde_json::Value,
    ) -> Result<Vec<T>> {
        let url = format!(
            "{}/v2/acts/{}/run-sync-get-dataset-items",
            self.base_url, actor
        );

        let response = self
            .http
            .post(&url)
            .query(&[("token", self.token.as_str())])
            .json(input)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReelError::Collector(format!(
                "actor {} returned {}: {}",
                actor,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let items: Vec<T> = response.json().await?;
        debug!("Actor {} returned {} items", actor, items.len());
        Ok(items)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YoutubeItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    view_count: Option<u64>,
}

/// YouTube shorts search.
pub struct YoutubeShortsSource {
    client: Arc<ApifyClient>,
    actor: String,
}

impl YoutubeShortsSource {
    pub fn new(client: Arc<ApifyClient>, actor: &str) -> Self {
        Self {
            client,
            actor: actor.to_string(),
        }
    }
}

#[async_trait]
impl TrendSource for YoutubeShortsSource {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<VideoCandidate>> {
        let sorting = match query.sort {
            SortOrder::Popular => "POPULAR",
            SortOrder::Newest => "NEWEST",
        };
        let input = json!({
            "searchQueries": [query.term],
            "maxResults": 0,
            "maxResultsShorts": query.count,
            "maxResultStreams": 0,
            "sortingOrder": sorting,
        });

        let items: Vec<YoutubeItem> = self.client.run_actor(&self.actor, &input).await?;
        Ok(items
            .into_iter()
            .map(|item| VideoCandidate {
                title: item.title,
                url: item.url,
                view_count: item.view_count.unwrap_or(0),
                platform: Platform::Youtube,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TiktokItem {
    #[serde(default)]
    text: String,
    #[serde(default)]
    web_video_url: String,
    #[serde(default)]
    play_count: Option<u64>,
}

/// TikTok video search.
pub struct TikTokSource {
    client: Arc<ApifyClient>,
    actor: String,
}

impl TikTokSource {
    pub fn new(client: Arc<ApifyClient>, actor: &str) -> Self {
        Self {
            client,
            actor: actor.to_string(),
        }
    }
}

#[async_trait]
impl TrendSource for TikTokSource {
    fn platform(&self) -> Platform {
        Platform::Tiktok
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<VideoCandidate>> {
        let input = json!({
            "excludePinnedPosts": false,
            "proxyCountryCode": query.region,
            "resultsPerPage": query.count,
            "scrapeRelatedVideos": false,
            "searchQueries": [query.term],
            "searchSection": "/video",
            "shouldDownloadVideos": false,
            "shouldDownloadCovers": false,
            "shouldDownloadSubtitles": false,
        });

        let items: Vec<TiktokItem> = self.client.run_actor(&self.actor, &input).await?;
        Ok(items
            .into_iter()
            .map(|item| VideoCandidate {
                title: item.text,
                url: item.web_video_url,
                view_count: item.play_count.unwrap_or(0),
                platform: Platform::Tiktok,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct TrendsItem {
    #[serde(default)]
    trending_searches: Vec<TrendsEntry>,
}

#[derive(Debug, Deserialize)]
struct TrendsEntry {
    term: String,
    #[serde(default)]
    trend_volume: Option<u64>,
}

/// Google trending searches. Only the top five of each dataset item are kept.
pub struct GoogleTrendsSource {
    client: Arc<ApifyClient>,
    actor: String,
}

impl GoogleTrendsSource {
    pub fn new(client: Arc<ApifyClient>, actor: &str) -> Self {
        Self {
            client,
            actor: actor.to_string(),
        }
    }
}

#[async_trait]
impl TermSource for GoogleTrendsSource {
    async fn trending_terms(&self, region: &str, timeframe: &str) -> Result<Vec<TrendingTerm>> {
        let input = json!({
            "enableTrendingSearches": true,
            "fetchRegionalData": false,
            "trendingSearchesCountry": region,
            "trendingSearchesTimeframe": timeframe,
        });

        let items: Vec<TrendsItem> = self.client.run_actor(&self.actor, &input).await?;
        Ok(items
            .into_iter()
            .flat_map(|item| item.trending_searches.into_iter().take(5))
            .map(|entry| TrendingTerm {
                term: entry.term,
                volume: entry.trend_volume.unwrap_or(0),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> Arc<ApifyClient> {
        Arc::new(ApifyClient::new(reqwest::Client::new(), &server.uri(), "tok"))
    }

    fn query() -> SearchQuery {
        SearchQuery {
            term: "gaming".to_string(),
            region: "US".to_string(),
            count: 3,
            sort: SortOrder::Popular,
        }
    }

    #[tokio::test]
    async fn test_tiktok_items_are_normalized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/acts/tt-actor/run-sync-get-dataset-items"))
            .and(query_param("token", "tok"))
            .and(body_partial_json(json!({"searchQueries": ["gaming"], "resultsPerPage": 3})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"text": "speedrun", "webVideoUrl": "https://www.tiktok.com/@a/video/1", "playCount": 1200},
                {"text": "no views"}
            ])))
            .mount(&server)
            .await;

        let source = TikTokSource::new(client(&server), "tt-actor");
        let found = source.search(&query()).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].title, "speedrun");
        assert_eq!(found[0].view_count, 1200);
        assert_eq!(found[1].view_count, 0);
        assert_eq!(found[1].platform, Platform::Tiktok);
    }

    #[tokio::test]
    async fn test_youtube_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(402).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let source = YoutubeShortsSource::new(client(&server), "yt-actor");
        let err = source.search(&query()).await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_trends_keep_top_five() {
        let server = MockServer::start().await;
        let entries: Vec<_> = (0..8)
            .map(|i| json!({"term": format!("t{}", i), "trend_volume": i * 10}))
            .collect();
        Mock::given(method("POST"))
            .and(path("/v2/acts/trends/run-sync-get-dataset-items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"trending_searches": entries},
                {"other": true}
            ])))
            .mount(&server)
            .await;

        let source = GoogleTrendsSource::new(client(&server), "trends");
        let terms = source.trending_terms("US", "24").await.unwrap();
        assert_eq!(terms.len(), 5);
        assert_eq!(terms[4].term, "t4");
    }
}
