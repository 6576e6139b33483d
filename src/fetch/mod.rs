//! Spreadsheet loading with caching.
//!
//! Turns a shared spreadsheet URL plus a tab name into a parsed
//! [`SheetTable`] via the sheet's CSV export endpoint. Parsed tables are
//! memoized in memory for a bounded time, keyed by (URL, tab).

pub mod cache;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::ingest::{self, IngestError, SheetTable};
use crate::models::ImageLookup;

pub use cache::TtlCache;

/// Errors loading the primary data source. Fatal to a render pass.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Could not parse spreadsheet ID from URL: {0}")]
    InvalidSheetUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Could not read sheet: {0}")]
    Parse(#[from] IngestError),
}

/// Errors loading the optional images tab. Never fatal.
#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("{0}")]
    Load(#[from] LoadError),

    #[error("tab \"{tab}\" is missing one of the PartType, Name, ImageURL columns")]
    MissingColumns { tab: String },
}

/// Anything that can hand back the CSV body behind an export URL.
#[async_trait]
pub trait CsvSource: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &'static str;

    /// Fetch the raw CSV body.
    async fn fetch_csv(&self, url: &Url) -> Result<String, LoadError>;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// How long a parsed sheet is reused before refetching
    pub cache_ttl: Duration,

    /// Request timeout
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(600), // 10 minutes
            timeout: Duration::from_secs(30),
            user_agent: concat!("combo-meta/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Fetches export bodies over HTTP.
pub struct HttpCsvSource {
    client: Client,
}

impl HttpCsvSource {
    pub fn new(config: &FetcherConfig) -> Result<Self, LoadError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("combo-meta")),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl CsvSource for HttpCsvSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_csv(&self, url: &Url) -> Result<String, LoadError> {
        info!("Fetching {}", url);

        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

/// Serves fixed bodies keyed by tab name. Used for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCsvSource {
    tabs: HashMap<String, String>,
}

impl StaticCsvSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tab(mut self, tab: impl Into<String>, body: impl Into<String>) -> Self {
        self.tabs.insert(tab.into(), body.into());
        self
    }
}

#[async_trait]
impl CsvSource for StaticCsvSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_csv(&self, url: &Url) -> Result<String, LoadError> {
        let tab = url
            .query_pairs()
            .find(|(k, _)| k == "sheet")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();

        self.tabs
            .get(&tab)
            .cloned()
            .ok_or_else(|| LoadError::Unavailable(format!("no tab named \"{}\"", tab)))
    }
}

fn sheet_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"/spreadsheets/d/([a-zA-Z0-9\-_]+)").expect("sheet id pattern is valid")
    })
}

/// Pull the spreadsheet identifier out of a shared sheet URL.
pub fn extract_sheet_id(sheet_url: &str) -> Result<String, LoadError> {
    sheet_id_pattern()
        .captures(sheet_url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| LoadError::InvalidSheetUrl(sheet_url.to_string()))
}

/// CSV export endpoint for one tab of a spreadsheet.
pub fn csv_export_url(sheet_id: &str, tab: &str) -> Result<Url, LoadError> {
    let base = format!("https://docs.google.com/spreadsheets/d/{}/gviz/tq", sheet_id);
    Url::parse_with_params(&base, &[("tqx", "out:csv"), ("sheet", tab)])
        .map_err(|e| LoadError::InvalidSheetUrl(e.to_string()))
}

/// Loads and memoizes sheet tabs.
pub struct SheetLoader {
    source: Arc<dyn CsvSource>,
    tables: TtlCache<(String, String), SheetTable>,
}

impl SheetLoader {
    pub fn new(source: Arc<dyn CsvSource>, cache_ttl: Duration) -> Self {
        Self {
            source,
            tables: TtlCache::new(cache_ttl),
        }
    }

    /// Loader backed by the HTTP source.
    pub fn http(config: &FetcherConfig) -> Result<Self, LoadError> {
        Ok(Self::new(
            Arc::new(HttpCsvSource::new(config)?),
            config.cache_ttl,
        ))
    }

    /// Load a tab, using the cache if a fresh copy exists.
    pub async fn load(&self, sheet_url: &str, tab: &str) -> Result<Arc<SheetTable>, LoadError> {
        let key = (sheet_url.to_string(), tab.to_string());
        if let Some(table) = self.tables.get(&key).await {
            debug!("Serving tab \"{}\" from cache", tab);
            return Ok(table);
        }

        let sheet_id = extract_sheet_id(sheet_url)?;
        let export_url = csv_export_url(&sheet_id, tab)?;
        let body = self.source.fetch_csv(&export_url).await?;
        let table = ingest::parse_csv(&body)?;

        info!(
            "Loaded {} rows from \"{}\" via {} source",
            table.len(),
            tab,
            self.source.name()
        );
        Ok(self.tables.insert(key, table).await)
    }

    /// Load the optional images tab.
    pub async fn load_images(
        &self,
        sheet_url: &str,
        tab: &str,
    ) -> Result<ImageLookup, ImageLoadError> {
        let table = self.load(sheet_url, tab).await?;
        ingest::image_lookup(&table).ok_or_else(|| ImageLoadError::MissingColumns {
            tab: tab.to_string(),
        })
    }

    /// Forget every cached tab.
    pub async fn invalidate(&self) {
        self.tables.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SHEET_URL: &str =
        "https://docs.google.com/spreadsheets/d/1h1j87RQAdwZ2XS_dLlVQ6p768HPkRxOovWoDgKtQ1Xg/edit?usp=sharing";

    /// Counts fetches so cache hits can be observed.
    struct CountingSource {
        inner: StaticCsvSource,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CsvSource for CountingSource {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch_csv(&self, url: &Url) -> Result<String, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_csv(url).await
        }
    }

    fn counting(source: StaticCsvSource) -> Arc<CountingSource> {
        Arc::new(CountingSource {
            inner: source,
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_extract_sheet_id() {
        assert_eq!(
            extract_sheet_id(SHEET_URL).unwrap(),
            "1h1j87RQAdwZ2XS_dLlVQ6p768HPkRxOovWoDgKtQ1Xg"
        );
    }

    #[test]
    fn test_extract_sheet_id_invalid() {
        let err = extract_sheet_id("https://example.com/not-a-sheet").unwrap_err();
        assert!(matches!(err, LoadError::InvalidSheetUrl(_)));
        assert!(err.to_string().contains("Could not parse spreadsheet ID"));
    }

    #[test]
    fn test_csv_export_url_encodes_tab() {
        let url = csv_export_url("abc-123", "Images & Parts").unwrap();

        assert_eq!(url.host_str(), Some("docs.google.com"));
        assert_eq!(url.path(), "/spreadsheets/d/abc-123/gviz/tq");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("tqx".to_string(), "out:csv".to_string()),
                ("sheet".to_string(), "Images & Parts".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_load_caches_by_url_and_tab() {
        let source = counting(
            StaticCsvSource::new()
                .with_tab("Sheet1", "Event,Placement\nCup,1\n")
                .with_tab("Sheet2", "Event,Placement\nCup,2\n"),
        );
        let loader = SheetLoader::new(source.clone(), Duration::from_secs(600));

        let first = loader.load(SHEET_URL, "Sheet1").await.unwrap();
        let again = loader.load(SHEET_URL, "Sheet1").await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        loader.load(SHEET_URL, "Sheet2").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        loader.invalidate().await;
        loader.load(SHEET_URL, "Sheet1").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_load_invalid_url_fails_before_fetch() {
        let source = counting(StaticCsvSource::new());
        let loader = SheetLoader::new(source.clone(), Duration::from_secs(600));

        let err = loader.load("https://example.com", "Sheet1").await.unwrap_err();
        assert!(matches!(err, LoadError::InvalidSheetUrl(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_load_missing_tab() {
        let loader = SheetLoader::new(Arc::new(StaticCsvSource::new()), Duration::from_secs(600));
        let err = loader.load(SHEET_URL, "Nope").await.unwrap_err();
        assert!(matches!(err, LoadError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_load_non_csv_response() {
        let source = StaticCsvSource::new().with_tab("Sheet1", "<html><body>Sign in</body></html>");
        let loader = SheetLoader::new(Arc::new(source), Duration::from_secs(600));

        let err = loader.load(SHEET_URL, "Sheet1").await.unwrap_err();
        assert!(matches!(err, LoadError::Parse(IngestError::NotCsv)));
    }

    #[tokio::test]
    async fn test_load_images() {
        let source = StaticCsvSource::new()
            .with_tab("Images", "PartType,Name,ImageURL\nblade,Wizard Rod,https://img/wr.png\n")
            .with_tab("Broken", "Part,Name\nblade,Wizard Rod\n");
        let loader = SheetLoader::new(Arc::new(source), Duration::from_secs(600));

        let images = loader.load_images(SHEET_URL, "Images").await.unwrap();
        assert_eq!(images.len(), 1);

        let err = loader.load_images(SHEET_URL, "Broken").await.unwrap_err();
        assert!(matches!(err, ImageLoadError::MissingColumns { .. }));

        let err = loader.load_images(SHEET_URL, "Missing").await.unwrap_err();
        assert!(matches!(err, ImageLoadError::Load(LoadError::Unavailable(_))));
    }

    #[test]
    fn test_fetcher_config_default() {
        let config = FetcherConfig::default();

        assert_eq!(config.cache_ttl, Duration::from_secs(600));
        assert!(config.user_agent.starts_with("combo-meta/"));
    }
}
