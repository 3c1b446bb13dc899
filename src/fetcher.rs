use std::future::Future;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{CatalogConfig, FetchConfig};
use crate::error::{FetchError, ImportError};
use crate::parser::document::SourceDocument;
use crate::parser::text::slugify;

// Supplier codes embedded at the start of an image filename, e.g. "AN1234-2.jpg"
static FILENAME_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]{1,4}[-_]?\d{2,6})(?:[-_.]|$)").unwrap());
// Explicit reference marker anywhere in the filename, e.g. "foto-ref-BR220.jpg"
static FILENAME_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[-_])(?:cod|ref|sku)[-_]?([A-Za-z0-9]{3,})").unwrap());
static SIZE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:-\d+x\d+|-scaled|-\d{1,2})+$").unwrap());

/// What the caller knows about a product it wants fetched. The fetcher
/// prefers the code, then the name, then the image reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLookup {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ProductLookup {
    pub fn identifier(&self) -> String {
        [&self.code, &self.name, &self.image_url]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| "<empty lookup>".to_string())
    }
}

/// Builds canonical product URLs, plus alternate shapes that tolerate
/// catalog URL-scheme drift.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    base_url: Url,
    alternate_base_url: Option<Url>,
    product_path: String,
    alternate_product_path: Option<String>,
}

impl UrlResolver {
    pub fn new(
        base_url: Url,
        alternate_base_url: Option<Url>,
        product_path: impl Into<String>,
        alternate_product_path: Option<String>,
    ) -> Self {
        Self {
            base_url,
            alternate_base_url,
            product_path: product_path.into().trim_matches('/').to_string(),
            alternate_product_path: alternate_product_path
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty()),
        }
    }

    pub fn from_config(catalog: &CatalogConfig) -> Result<Self, url::ParseError> {
        let base = Url::parse(&catalog.base_url)?;
        let alternate = catalog
            .alternate_base_url
            .as_deref()
            .map(Url::parse)
            .transpose()?;
        Ok(Self::new(
            base,
            alternate,
            catalog.product_path.clone(),
            catalog.alternate_product_path.clone(),
        ))
    }

    /// Slug the lookup resolves to: the slugified code, else the slugified
    /// name, else a code recovered from the image filename.
    pub fn resolve_slug(&self, lookup: &ProductLookup) -> Option<String> {
        let non_empty = |s: &Option<String>| s.as_deref().map(slugify).filter(|s| !s.is_empty());
        non_empty(&lookup.code)
            .or_else(|| non_empty(&lookup.name))
            .or_else(|| lookup.image_url.as_deref().and_then(code_from_image))
    }

    /// Primary URL first, then the alternates, without duplicates.
    pub fn candidates(&self, lookup: &ProductLookup) -> Vec<Url> {
        let Some(slug) = self.resolve_slug(lookup) else {
            return Vec::new();
        };

        let mut shapes = vec![(&self.base_url, self.product_path.as_str())];
        if let Some(path) = &self.alternate_product_path {
            shapes.push((&self.base_url, path.as_str()));
        }
        if let Some(base) = &self.alternate_base_url {
            shapes.push((base, self.product_path.as_str()));
        }

        let mut urls: Vec<Url> = Vec::with_capacity(shapes.len());
        for (base, path) in shapes {
            let Ok(url) = base.join(&format!("/{}/{}/", path, slug)) else {
                continue;
            };
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        urls
    }
}

/// Recover a product code from an image URL or filename: supplier-code
/// patterns first, then the slugified filename stem.
pub fn code_from_image(image_ref: &str) -> Option<String> {
    let path = Url::parse(image_ref)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| image_ref.split(['?', '#']).next().unwrap_or("").to_string());
    let filename = path.rsplit('/').next().unwrap_or("");
    let stem = filename
        .rsplit_once('.')
        .map_or(filename, |(stem, _ext)| stem);
    if stem.is_empty() {
        return None;
    }

    if let Some(caps) = FILENAME_CODE_RE.captures(stem) {
        return Some(slugify(&caps[1]));
    }
    if let Some(caps) = FILENAME_REF_RE.captures(stem) {
        return Some(slugify(&caps[1]));
    }
    let slug = slugify(&SIZE_SUFFIX_RE.replace(stem, ""));
    (!slug.is_empty()).then_some(slug)
}

/// Retrieves the raw content behind one URL.
pub trait DocumentFetcher {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<String, FetchError>> + Send;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        Self::with_builder(config, reqwest::Client::builder())
    }

    fn with_builder(config: &FetchConfig, builder: reqwest::ClientBuilder) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = builder
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Other(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }
}

impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let start = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| request_error(url, e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| request_error(url, e, self.timeout))?;
        debug!(%url, bytes = body.len(), latency_ms = start.elapsed().as_millis() as u64, "fetched");
        Ok(body)
    }
}

fn request_error(url: &Url, e: reqwest::Error, timeout: Duration) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            source: e,
        }
    }
}

/// Try each candidate in order and stop at the first success. Every failure
/// (network, timeout, non-success status) moves on to the next candidate.
pub async fn fetch_first<F: DocumentFetcher>(
    fetcher: &F,
    identifier: &str,
    candidates: &[Url],
) -> Result<SourceDocument, ImportError> {
    if candidates.is_empty() {
        return Err(ImportError::NoCandidateUrl {
            identifier: identifier.to_string(),
        });
    }

    let mut last_error = String::new();
    for url in candidates {
        match fetcher.fetch(url).await {
            Ok(content) => {
                info!(identifier, %url, "fetched product page");
                return Ok(SourceDocument::new(url.as_str(), content));
            }
            Err(e) => {
                warn!(identifier, %url, error = %e, "candidate URL failed");
                last_error = e.to_string();
            }
        }
    }

    Err(ImportError::AllCandidatesFailed {
        identifier: identifier.to_string(),
        attempts: candidates.len(),
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    fn resolver() -> UrlResolver {
        UrlResolver::new(
            Url::parse("https://www.catalog.example.com").unwrap(),
            Some(Url::parse("https://catalog.example.com").unwrap()),
            "produto",
            Some("produtos".to_string()),
        )
    }

    struct MapFetcher {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl DocumentFetcher for MapFetcher {
        async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages.get(url.as_str()).cloned().ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    #[test]
    fn code_preferred_over_name() {
        let lookup = ProductLookup {
            code: Some("AN 1234".into()),
            name: Some("Anel Luna".into()),
            image_url: None,
        };
        let urls: Vec<String> = resolver().candidates(&lookup).iter().map(Url::to_string).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.catalog.example.com/produto/an-1234/",
                "https://www.catalog.example.com/produtos/an-1234/",
                "https://catalog.example.com/produto/an-1234/",
            ]
        );
    }

    #[test]
    fn name_used_without_code() {
        let lookup = ProductLookup {
            name: Some("Brinco Coração Vazado".into()),
            ..Default::default()
        };
        assert_eq!(resolver().resolve_slug(&lookup).as_deref(), Some("brinco-coracao-vazado"));
    }

    #[test]
    fn image_code_patterns() {
        assert_eq!(
            code_from_image("https://cdn.example.com/uploads/2024/05/AN1234-2-300x300.jpg").as_deref(),
            Some("an1234")
        );
        assert_eq!(code_from_image("foto-ref-BR220.png").as_deref(), Some("br220"));
        assert_eq!(
            code_from_image("/uploads/colar-gota-dourado-1-600x600.jpg?v=2").as_deref(),
            Some("colar-gota-dourado")
        );
        assert_eq!(code_from_image("https://cdn.example.com/").as_deref(), None);
    }

    #[test]
    fn nothing_to_resolve() {
        assert!(resolver().candidates(&ProductLookup::default()).is_empty());
        let blank = ProductLookup {
            code: Some("  ".into()),
            ..Default::default()
        };
        assert!(resolver().candidates(&blank).is_empty());
    }

    #[test]
    fn alternates_deduplicated() {
        let r = UrlResolver::new(
            Url::parse("https://catalog.example.com").unwrap(),
            Some(Url::parse("https://catalog.example.com/").unwrap()),
            "/produto/",
            None,
        );
        let lookup = ProductLookup {
            code: Some("x1".into()),
            ..Default::default()
        };
        assert_eq!(r.candidates(&lookup).len(), 1);
    }

    #[tokio::test]
    async fn first_success_wins() {
        let urls = resolver().candidates(&ProductLookup {
            code: Some("an1234".into()),
            ..Default::default()
        });
        let fetcher = MapFetcher {
            pages: HashMap::from([(urls[1].to_string(), "<h1>ok</h1>".to_string())]),
            requested: Mutex::new(Vec::new()),
        };
        let doc = fetch_first(&fetcher, "an1234", &urls).await.unwrap();
        assert_eq!(doc.url, urls[1].as_str());
        // third candidate never requested
        assert_eq!(fetcher.requested.lock().unwrap().len(), 2);
    }

    /// Times out on the listed URLs, serves a page everywhere else.
    struct SlowFetcher {
        slow: Vec<String>,
        requested: Mutex<Vec<String>>,
    }

    impl DocumentFetcher for SlowFetcher {
        async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            if self.slow.iter().any(|u| u == url.as_str()) {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                    secs: 10,
                });
            }
            Ok("<h1>ok</h1>".to_string())
        }
    }

    #[tokio::test]
    async fn timeout_moves_on_to_next_candidate() {
        let urls = resolver().candidates(&ProductLookup {
            code: Some("an1234".into()),
            ..Default::default()
        });
        let fetcher = SlowFetcher {
            slow: vec![urls[0].to_string()],
            requested: Mutex::new(Vec::new()),
        };
        let doc = fetch_first(&fetcher, "an1234", &urls).await.unwrap();
        assert_eq!(doc.url, urls[1].as_str());
        assert_eq!(*fetcher.requested.lock().unwrap(), vec![urls[0].to_string(), urls[1].to_string()]);
    }

    #[tokio::test]
    async fn every_candidate_timing_out_is_a_fetch_failure() {
        let urls = resolver().candidates(&ProductLookup {
            code: Some("an1234".into()),
            ..Default::default()
        });
        let fetcher = SlowFetcher {
            slow: urls.iter().map(Url::to_string).collect(),
            requested: Mutex::new(Vec::new()),
        };
        let err = fetch_first(&fetcher, "an1234", &urls).await.unwrap_err();
        assert!(matches!(err, ImportError::AllCandidatesFailed { attempts: 3, .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn silent_server_maps_to_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // accept and never answer
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let config = FetchConfig {
            timeout_secs: 1,
            ..FetchConfig::default()
        };
        let fetcher = HttpFetcher::with_builder(&config, reqwest::Client::builder().no_proxy()).unwrap();
        let url = Url::parse(&format!("http://{}/produto/an1234/", addr)).unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();
        server.abort();

        match err {
            FetchError::Timeout { url: failed, secs } => {
                assert_eq!(failed, url.to_string());
                assert_eq!(secs, 1);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn all_candidates_failing() {
        let urls = resolver().candidates(&ProductLookup {
            code: Some("zz9".into()),
            ..Default::default()
        });
        let fetcher = MapFetcher {
            pages: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        };
        let err = fetch_first(&fetcher, "zz9", &urls).await.unwrap_err();
        assert!(matches!(err, ImportError::AllCandidatesFailed { attempts: 3, .. }));
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[tokio::test]
    async fn no_candidates() {
        let fetcher = MapFetcher {
            pages: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        };
        let err = fetch_first(&fetcher, "<empty lookup>", &[]).await.unwrap_err();
        assert!(matches!(err, ImportError::NoCandidateUrl { .. }));
    }
}
