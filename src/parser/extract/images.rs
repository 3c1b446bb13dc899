use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;

use crate::parser::document::ParsedDocument;
use crate::parser::rules::{Confidence, ExtractedField};

/// Path fragments that identify stand-in artwork rather than product photos.
const PLACEHOLDER_MARKERS: &[&str] = &[
    "placeholder",
    "no-image",
    "sem-imagem",
    "blank.gif",
    "spinner",
    "lazy-load",
];

// (selector, attribute) pairs, gallery first so full-size images lead.
static IMAGE_SOURCES: LazyLock<Vec<(Selector, &'static str)>> = LazyLock::new(|| {
    [
        (".woocommerce-product-gallery__image a", "href"),
        ("img[data-large_image]", "data-large_image"),
        ("img[data-src]", "data-src"),
        ("img[src]", "src"),
        ("meta[property=\"og:image\"]", "content"),
    ]
    .into_iter()
    .map(|(css, attr)| (Selector::parse(css).unwrap(), attr))
    .collect()
});

static MARKDOWN_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\(([^)\s]+)").unwrap());

/// Every image reference in the document: placeholders dropped, resolved
/// against the source URL, deduplicated keeping the first occurrence.
///
/// Order follows the source tiers in `IMAGE_SOURCES` (gallery links, then
/// `data-large_image`, `data-src`, `src`, `og:image`, then markdown images),
/// and document position only within a tier.
pub fn extract(doc: &ParsedDocument<'_>) -> ExtractedField<Vec<String>> {
    let mut references: Vec<String> = Vec::new();
    for (selector, attr) in IMAGE_SOURCES.iter() {
        references.extend(
            doc.html()
                .select(selector)
                .filter_map(|el| el.value().attr(attr).map(str::to_string)),
        );
    }
    references.extend(
        MARKDOWN_IMAGE_RE
            .captures_iter(doc.raw())
            .map(|caps| caps[1].to_string()),
    );

    let mut seen = HashSet::new();
    let images: Vec<String> = references
        .iter()
        .filter(|r| !is_placeholder(r))
        .filter_map(|r| doc.resolve(r))
        .map(String::from)
        .filter(|url| seen.insert(url.clone()))
        .collect();

    if images.is_empty() {
        ExtractedField::NotFound
    } else {
        ExtractedField::Found {
            value: images,
            rule_index: 0,
            confidence: Confidence::High,
        }
    }
}

fn is_placeholder(reference: &str) -> bool {
    let lower = reference.to_lowercase();
    lower.starts_with("data:") || PLACEHOLDER_MARKERS.iter().any(|m| lower.contains(m))
}
