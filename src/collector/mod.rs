//! Trend collection across short-video platforms.
//!
//! Queries every configured platform concurrently, tolerates individual
//! platform failures, and returns one ranked, de-duplicated candidate list.

mod apify;

pub use apify::{ApifyClient, GoogleTrendsSource, TikTokSource, YoutubeShortsSource};

use crate::error::{ReelError, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Platform a candidate or trend came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Youtube,
    Tiktok,
    GoogleTrends,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Youtube => write!(f, "youtube"),
            Platform::Tiktok => write!(f, "tiktok"),
            Platform::GoogleTrends => write!(f, "google_trends"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "youtube" | "yt" => Ok(Platform::Youtube),
            "tiktok" => Ok(Platform::Tiktok),
            "google" | "google_trends" => Ok(Platform::GoogleTrends),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}

/// Sort order requested from a platform search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Popular,
    Newest,
}

/// What to collect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectRequest {
    /// Two-letter region code, e.g. "US".
    pub region: String,
    /// Timeframe understood by the trends source, e.g. "24" or "7d".
    pub timeframe: String,
    /// "trending" for generic trends, anything else is used as the search term.
    pub category: String,
}

impl CollectRequest {
    pub fn is_generic_trending(&self) -> bool {
        self.category.trim().eq_ignore_ascii_case("trending")
    }
}

/// One platform query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchQuery {
    pub term: String,
    pub region: String,
    pub count: u32,
    pub sort: SortOrder,
}

/// A video surfaced by a platform search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCandidate {
    pub title: String,
    pub url: String,
    pub view_count: u64,
    pub platform: Platform,
}

/// A trending search term with its volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingTerm {
    pub term: String,
    pub volume: u64,
}

/// Per-platform result flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformReport {
    pub platform: Platform,
    pub returned: usize,
    /// Set when the platform call failed or timed out.
    pub error: Option<String>,
}

impl PlatformReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Collected, ranked candidates plus what happened on each platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub search_term: String,
    pub candidates: Vec<VideoCandidate>,
    pub platforms: Vec<PlatformReport>,
}

impl Collection {
    pub fn urls(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.url.clone()).collect()
    }

    pub fn failed_platforms(&self) -> Vec<Platform> {
        self.platforms
            .iter()
            .filter(|p| !p.is_ok())
            .map(|p| p.platform)
            .collect()
    }
}

/// A platform that can be searched for videos.
#[async_trait]
pub trait TrendSource: Send + Sync {
    fn platform(&self) -> Platform;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<VideoCandidate>>;
}

/// A source of trending search terms.
#[async_trait]
pub trait TermSource: Send + Sync {
    async fn trending_terms(&self, region: &str, timeframe: &str) -> Result<Vec<TrendingTerm>>;
}

/// Collector settings resolved from config.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub timeout: Duration,
    pub max_concurrent: usize,
    pub per_platform_count: u32,
    pub limit: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_concurrent: 3,
            per_platform_count: 3,
            limit: 5,
        }
    }
}

/// Fans out to every source and merges the answers.
pub struct Collector {
    sources: Vec<Arc<dyn TrendSource>>,
    terms: Option<Arc<dyn TermSource>>,
    config: CollectorConfig,
}

impl Collector {
    pub fn new(
        sources: Vec<Arc<dyn TrendSource>>,
        terms: Option<Arc<dyn TermSource>>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            sources,
            terms,
            config,
        }
    }

    /// Collect ranked candidates. Fails only when every platform failed.
    #[instrument(skip(self), fields(category = %request.category, region = %request.region))]
    pub async fn collect(&self, request: &CollectRequest) -> Result<Collection> {
        let mut reports = Vec::new();
        let term = self.resolve_term(request, &mut reports).await;
        info!("Collecting candidates for '{}' from {} platforms", term, self.sources.len());

        let query = SearchQuery {
            term: term.clone(),
            region: request.region.clone(),
            count: self.config.per_platform_count,
            sort: SortOrder::Popular,
        };

        let timeout = self.config.timeout;
        let results: Vec<_> = stream::iter(self.sources.iter())
            .map(|source| {
                let query = &query;
                async move {
                    let platform = source.platform();
                    let result = match tokio::time::timeout(timeout, source.search(query)).await {
                        Ok(result) => result,
                        Err(_) => Err(ReelError::Collector(format!(
                            "{} timed out after {}s",
                            platform,
                            timeout.as_secs()
                        ))),
                    };
                    (platform, result)
                }
            })
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        let mut candidates = Vec::new();
        let mut searched_ok = 0usize;
        for (platform, result) in results {
            match result {
                Ok(found) => {
                    searched_ok += 1;
                    reports.push(PlatformReport {
                        platform,
                        returned: found.len(),
                        error: None,
                    });
                    candidates.extend(found);
                }
                Err(e) => {
                    warn!("Platform {} failed: {}", platform, e);
                    reports.push(PlatformReport {
                        platform,
                        returned: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        if searched_ok == 0 && !self.sources.is_empty() {
            return Err(ReelError::Collector(format!(
                "all {} platforms failed for '{}'",
                self.sources.len(),
                term
            )));
        }

        let candidates = rank(dedup_by_url(candidates), self.config.limit);
        info!("Collected {} candidates", candidates.len());

        Ok(Collection {
            search_term: term,
            candidates,
            platforms: reports,
        })
    }

    async fn resolve_term(
        &self,
        request: &CollectRequest,
        reports: &mut Vec<PlatformReport>,
    ) -> String {
        if !request.is_generic_trending() {
            return request.category.trim().to_string();
        }

        let Some(terms) = &self.terms else {
            return request.category.trim().to_string();
        };

        let result = tokio::time::timeout(
            self.config.timeout,
            terms.trending_terms(&request.region, &request.timeframe),
        )
        .await
        .unwrap_or_else(|_| Err(ReelError::Collector("trending terms timed out".to_string())));

        match result {
            Ok(found) => {
                reports.push(PlatformReport {
                    platform: Platform::GoogleTrends,
                    returned: found.len(),
                    error: None,
                });
                found
                    .into_iter()
                    .max_by_key(|t| t.volume)
                    .map(|t| t.term)
                    .unwrap_or_else(|| request.category.trim().to_string())
            }
            Err(e) => {
                warn!("Trending terms unavailable: {}", e);
                reports.push(PlatformReport {
                    platform: Platform::GoogleTrends,
                    returned: 0,
                    error: Some(e.to_string()),
                });
                request.category.trim().to_string()
            }
        }
    }
}

/// Canonical form of a URL for de-duplication.
pub fn normalize_url(raw: &str) -> String {
    match url::Url::parse(raw.trim()) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            let mut s = parsed.to_string();
            if s.ends_with('/') {
                s.pop();
            }
            s
        }
        Err(_) => raw.trim().to_string(),
    }
}

/// Keep the first occurrence of each URL, upgraded to the highest view count seen.
fn dedup_by_url(candidates: Vec<VideoCandidate>) -> Vec<VideoCandidate> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<VideoCandidate> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        if candidate.url.trim().is_empty() {
            continue;
        }
        let key = normalize_url(&candidate.url);
        match position.get(&key) {
            Some(&idx) => {
                if candidate.view_count > unique[idx].view_count {
                    unique[idx].view_count = candidate.view_count;
                }
            }
            None => {
                position.insert(key, unique.len());
                unique.push(candidate);
            }
        }
    }

    unique
}

fn rank(mut candidates: Vec<VideoCandidate>, limit: usize) -> Vec<VideoCandidate> {
    candidates.sort_by(|a, b| b.view_count.cmp(&a.view_count));
    candidates.truncate(limit);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource {
        platform: Platform,
        items: Vec<VideoCandidate>,
    }

    #[async_trait]
    impl TrendSource for FixedSource {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn search(&self, _query: &SearchQuery) -> Result<Vec<VideoCandidate>> {
            Ok(self.items.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl TrendSource for FailingSource {
        fn platform(&self) -> Platform {
            Platform::Tiktok
        }

        async fn search(&self, _query: &SearchQuery) -> Result<Vec<VideoCandidate>> {
            Err(ReelError::Collector("actor run failed".to_string()))
        }
    }

    struct SlowSource;

    #[async_trait]
    impl TrendSource for SlowSource {
        fn platform(&self) -> Platform {
            Platform::Tiktok
        }

        async fn search(&self, _query: &SearchQuery) -> Result<Vec<VideoCandidate>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    struct FixedTerms(Vec<TrendingTerm>);

    #[async_trait]
    impl TermSource for FixedTerms {
        async fn trending_terms(
            &self,
            _region: &str,
            _timeframe: &str,
        ) -> Result<Vec<TrendingTerm>> {
            Ok(self.0.clone())
        }
    }

    fn candidate(url: &str, views: u64, platform: Platform) -> VideoCandidate {
        VideoCandidate {
            title: format!("video {}", views),
            url: url.to_string(),
            view_count: views,
            platform,
        }
    }

    fn request(category: &str) -> CollectRequest {
        CollectRequest {
            region: "US".to_string(),
            timeframe: "24".to_string(),
            category: category.to_string(),
        }
    }

    #[tokio::test]
    async fn test_partial_results_when_one_platform_fails() {
        let youtube = FixedSource {
            platform: Platform::Youtube,
            items: vec![candidate("https://youtube.com/shorts/a", 10, Platform::Youtube)],
        };
        let collector = Collector::new(
            vec![Arc::new(youtube), Arc::new(FailingSource)],
            None,
            CollectorConfig::default(),
        );

        let collection = collector.collect(&request("cooking")).await.unwrap();
        assert_eq!(collection.candidates.len(), 1);
        assert_eq!(collection.failed_platforms(), vec![Platform::Tiktok]);
        assert_eq!(collection.search_term, "cooking");
    }

    #[tokio::test]
    async fn test_all_platforms_failing_is_an_error() {
        let collector = Collector::new(
            vec![Arc::new(FailingSource)],
            None,
            CollectorConfig::default(),
        );
        assert!(collector.collect(&request("cooking")).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_platform_times_out() {
        let youtube = FixedSource {
            platform: Platform::Youtube,
            items: vec![candidate("https://youtube.com/shorts/a", 10, Platform::Youtube)],
        };
        let config = CollectorConfig {
            timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let collector = Collector::new(vec![Arc::new(youtube), Arc::new(SlowSource)], None, config);

        let collection = collector.collect(&request("cooking")).await.unwrap();
        let tiktok = collection
            .platforms
            .iter()
            .find(|p| p.platform == Platform::Tiktok)
            .unwrap();
        assert!(tiktok.error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_dedup_ranks_and_limits() {
        let youtube = FixedSource {
            platform: Platform::Youtube,
            items: vec![
                candidate("https://youtube.com/shorts/a", 10, Platform::Youtube),
                candidate("https://youtube.com/shorts/a#t=3", 50, Platform::Youtube),
                candidate("https://youtube.com/shorts/b", 30, Platform::Youtube),
                candidate("", 999, Platform::Youtube),
            ],
        };
        let tiktok = FixedSource {
            platform: Platform::Tiktok,
            items: vec![candidate("https://www.tiktok.com/@x/video/1", 20, Platform::Tiktok)],
        };
        let config = CollectorConfig {
            limit: 2,
            ..Default::default()
        };
        let collector = Collector::new(vec![Arc::new(youtube), Arc::new(tiktok)], None, config);

        let collection = collector.collect(&request("cooking")).await.unwrap();
        let views: Vec<u64> = collection.candidates.iter().map(|c| c.view_count).collect();
        assert_eq!(views, vec![50, 30]);
        assert_eq!(collection.candidates[0].url, "https://youtube.com/shorts/a");
    }

    #[tokio::test]
    async fn test_generic_trending_uses_top_term() {
        let youtube = FixedSource {
            platform: Platform::Youtube,
            items: vec![candidate("https://youtube.com/shorts/a", 10, Platform::Youtube)],
        };
        let terms = FixedTerms(vec![
            TrendingTerm {
                term: "eclipse".to_string(),
                volume: 100,
            },
            TrendingTerm {
                term: "world cup".to_string(),
                volume: 500,
            },
        ]);
        let collector = Collector::new(
            vec![Arc::new(youtube)],
            Some(Arc::new(terms)),
            CollectorConfig::default(),
        );

        let collection = collector.collect(&request("Trending")).await.unwrap();
        assert_eq!(collection.search_term, "world cup");
        assert!(collection
            .platforms
            .iter()
            .any(|p| p.platform == Platform::GoogleTrends && p.is_ok()));
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("https://YouTube.com/watch?v=abc#frag"),
            "https://youtube.com/watch?v=abc"
        );
        assert_eq!(normalize_url("https://vm.tiktok.com/xyz/"), "https://vm.tiktok.com/xyz");
        assert_eq!(normalize_url("not a url "), "not a url");
    }
}
