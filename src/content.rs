//! Read-only access to the published data set.
//!
//! The scraper commits its output as JSON files; every read bypasses
//! intermediate caches because the files change on the scraper's schedule.

use crate::error::FetchError;
use crate::model::{DashboardConfig, DataStatus};
use crate::records::{RawStockRecord, ResearchMap};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::time::{SystemTime, UNIX_EPOCH};

pub const STOCKS_PATH: &str = "data/latest_stocks.json";
pub const RESEARCH_PATH: &str = "data/latest_research.json";
pub const STATUS_PATH: &str = "data/status.json";

#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_stocks(&self) -> Result<Vec<RawStockRecord>, FetchError>;
    async fn fetch_research(&self) -> Result<ResearchMap, FetchError>;
    async fn fetch_status(&self) -> Result<DataStatus, FetchError>;
}

pub struct HttpContentSource {
    http: reqwest::Client,
    root: Url,
}

impl HttpContentSource {
    pub fn new(cfg: &DashboardConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .connect_timeout(cfg.request_timeout.min(std::time::Duration::from_secs(5)))
            .build()
            .context("build content http client")?;
        Self::with_client(http, &cfg.content_root)
    }

    pub fn with_client(http: reqwest::Client, content_root: &str) -> Result<Self> {
        // Trailing slash so `join` appends instead of replacing the last segment.
        let root = format!("{}/", content_root.trim_end_matches('/'));
        let root = Url::parse(&root).with_context(|| format!("invalid content root {content_root}"))?;
        Ok(Self { http, root })
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self
            .root
            .join(path)
            .unwrap_or_else(|_| self.root.clone());
        url.query_pairs_mut().append_pair("t", &cache_buster());
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &'static str,
        path: &str,
    ) -> Result<T, FetchError> {
        let resp = self
            .http
            .get(self.url(path))
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|source| FetchError::Network { resource, source })?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                resource,
                status: resp.status().as_u16(),
            });
        }
        resp.json::<T>()
            .await
            .map_err(|source| FetchError::Decode { resource, source })
    }
}

/// Unique per request: wall-clock millis plus a random suffix, so two fetches
/// in the same millisecond still miss the cache.
fn cache_buster() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let salt: u32 = rand::thread_rng().gen();
    format!("{millis}-{salt:08x}")
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch_stocks(&self) -> Result<Vec<RawStockRecord>, FetchError> {
        self.get_json("stocks", STOCKS_PATH).await
    }

    async fn fetch_research(&self) -> Result<ResearchMap, FetchError> {
        self.get_json("research", RESEARCH_PATH).await
    }

    async fn fetch_status(&self) -> Result<DataStatus, FetchError> {
        self.get_json("status", STATUS_PATH).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn source(server: &MockServer) -> HttpContentSource {
        HttpContentSource::with_client(reqwest::Client::new(), &format!("{}/repo/main/", server.uri()))
            .unwrap()
    }

    #[tokio::test]
    async fn fetches_with_cache_busting() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repo/main/data/latest_stocks.json"))
            .and(header("cache-control", "no-cache"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"code":"A","count_today":3},{"code":"B","recent_posts_count":"12"}]"#,
            ))
            .expect(2)
            .mount(&server)
            .await;

        let src = source(&server).await;
        let first = src.fetch_stocks().await.unwrap();
        assert_eq!(first.len(), 2);
        src.fetch_stocks().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let busters: Vec<String> = requests
            .iter()
            .map(|r| {
                r.url
                    .query_pairs()
                    .find(|(k, _)| k == "t")
                    .map(|(_, v)| v.into_owned())
                    .expect("cache buster present")
            })
            .collect();
        assert_eq!(busters.len(), 2);
        assert_ne!(busters[0], busters[1]);
    }

    #[tokio::test]
    async fn reports_status_and_decode_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repo/main/data/latest_research.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repo/main/data/status.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let src = source(&server).await;
        match src.fetch_research().await {
            Err(FetchError::Status { resource, status }) => {
                assert_eq!(resource, "research");
                assert_eq!(status, 404);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            src.fetch_status().await,
            Err(FetchError::Decode { resource: "status", .. })
        ));
    }

    #[tokio::test]
    async fn decodes_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repo/main/data/status.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"last_updated":"2025-01-02 09:00"}"#),
            )
            .mount(&server)
            .await;

        let status = source(&server).await.fetch_status().await.unwrap();
        assert_eq!(status.last_updated, "2025-01-02 09:00");
    }
}
