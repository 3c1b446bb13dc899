use std::sync::LazyLock;

use serde::Serialize;

use crate::parser::document::ParsedDocument;
use crate::parser::rules::{ExtractedField, FieldExtractor, Rule};
use crate::parser::text::{collapse_whitespace, decode_entities, fold};

/// Storefront lead words removed from the display name. At most one is
/// stripped.
const NAME_PREFIXES: &[&str] = &["semijoia", "semi joia", "joia", "gold", "silver", "prata", "folheado"];

const SITE_SEPARATORS: &[&str] = &[" | ", " – ", " — "];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedName {
    /// Heading text with entities decoded and the site suffix removed.
    pub full: String,
    /// `full` with one storefront prefix word removed.
    pub display: String,
}

static NAME: LazyLock<FieldExtractor<ExtractedName>> = LazyLock::new(|| {
    FieldExtractor::new(
        "name",
        vec![
            Rule::select("h1.product_title, h1.product-title, [itemprop=\"name\"]", clean_name),
            Rule::select("h1, .product-name, .product_title", clean_name),
            Rule::select_attr("meta[property=\"og:title\"]", "content", clean_name),
            Rule::markup(r"(?m)^#\s+(.+)$", clean_name),
            Rule::select("title", clean_name),
        ],
        |name| name.display.chars().count() > 3,
    )
});

pub fn extract(doc: &ParsedDocument<'_>) -> ExtractedField<ExtractedName> {
    NAME.extract(doc)
}

pub fn clean_name(raw: &str) -> Option<ExtractedName> {
    let decoded = collapse_whitespace(&decode_entities(raw));
    let full = strip_site_suffix(&decoded).trim().to_string();
    if full.is_empty() {
        return None;
    }
    let display = strip_prefix_word(&full).to_string();
    Some(ExtractedName { full, display })
}

fn strip_site_suffix(name: &str) -> &str {
    SITE_SEPARATORS
        .iter()
        .filter_map(|sep| name.find(sep))
        .min()
        .map_or(name, |idx| &name[..idx])
}

fn strip_prefix_word(name: &str) -> &str {
    let folded = fold(name);
    for prefix in NAME_PREFIXES {
        let Some(rest) = folded.strip_prefix(prefix) else {
            continue;
        };
        // Prefix must be a whole word and leave something behind.
        if !rest.starts_with([' ', '-', ':']) {
            continue;
        }
        let cut = prefix.chars().count();
        let remainder = name
            .char_indices()
            .nth(cut)
            .map_or("", |(idx, _)| &name[idx..])
            .trim_start_matches([' ', '-', ':'])
            .trim();
        if !remainder.is_empty() {
            return remainder;
        }
    }
    name
}
