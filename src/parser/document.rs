use scraper::Html;
use serde::{Deserialize, Serialize};
use url::Url;

use super::text::strip_tags;

/// Raw catalog content plus the URL it came from.
///
/// The content is either HTML or markdown-like text; both go through the
/// same extractors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub url: String,
    pub content: String,
}

impl SourceDocument {
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
        }
    }

    /// Parse once for a full extraction pass. The DOM is not `Send`, so the
    /// parsed view must not be held across an await point.
    pub fn parse(&self) -> ParsedDocument<'_> {
        ParsedDocument {
            raw: &self.content,
            url: &self.url,
            base_url: Url::parse(&self.url).ok(),
            html: Html::parse_document(&self.content),
            text: strip_tags(&self.content),
        }
    }
}

pub struct ParsedDocument<'a> {
    raw: &'a str,
    url: &'a str,
    base_url: Option<Url>,
    html: Html,
    text: String,
}

impl<'a> ParsedDocument<'a> {
    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn url(&self) -> &'a str {
        self.url
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Visible text with markup stripped and whitespace collapsed.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Resolve a possibly relative reference against the document URL.
    /// Only http(s) results are returned.
    pub fn resolve(&self, reference: &str) -> Option<Url> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        let resolved = match Url::parse(reference) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => self.base_url.as_ref()?.join(reference).ok()?,
            Err(_) => return None,
        };
        matches!(resolved.scheme(), "http" | "https").then_some(resolved)
    }
}
