use std::sync::LazyLock;

use crate::parser::document::ParsedDocument;
use crate::parser::rules::{ExtractedField, FieldExtractor, Rule};
use crate::parser::text::strip_tags;

const MIN_DESCRIPTION_CHARS: usize = 20;

static DESCRIPTION: LazyLock<FieldExtractor<String>> = LazyLock::new(|| {
    FieldExtractor::new(
        "description",
        vec![
            Rule::select(
                ".woocommerce-product-details__short-description, .short-description, [itemprop=\"description\"]",
                clean_description,
            ),
            Rule::select(
                ".woocommerce-Tabs-panel--description, #tab-description, .product-description, .entry-content",
                clean_description,
            ),
            Rule::select_attr("meta[name=\"description\"], meta[property=\"og:description\"]", "content", clean_description),
        ],
        |text| text.chars().count() > MIN_DESCRIPTION_CHARS,
    )
});

pub fn extract(doc: &ParsedDocument<'_>) -> ExtractedField<String> {
    DESCRIPTION.extract(doc)
}

fn clean_description(raw: &str) -> Option<String> {
    // Attribute values may still carry escaped markup.
    let text = strip_tags(raw);
    (!text.is_empty()).then_some(text)
}
