use std::sync::LazyLock;

use regex::Regex;

use crate::parser::document::ParsedDocument;
use crate::parser::rules::{ExtractedField, FieldExtractor, Rule};

/// Plausible wholesale range for the numeric-scan rescue tier.
pub const RESCUE_MIN: f64 = 15.0;
pub const RESCUE_MAX: f64 = 200.0;

static AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d.]*(?:,\d{1,2})?").unwrap());

// Decimal-comma with optional dot grouping, or a dot with exactly two decimals.
static RESCUE_SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d{1,3}(?:\.\d{3})*,\d{2}|\d+\.\d{2})$").unwrap());

static PRICE: LazyLock<FieldExtractor<f64>> = LazyLock::new(|| {
    FieldExtractor::new(
        "price",
        vec![
            // Sale price inside a discounted price block
            Rule::select(".price ins .woocommerce-Price-amount, .price ins .amount", first_amount),
            Rule::select(
                ".woocommerce-Price-amount, .price .amount, .product-price, .preco, [class*=\"price-value\"]",
                first_amount,
            ),
            Rule::text(r"(?:R\$|US\$|\$|€|£)\s*(\d[\d.]*(?:,\d{1,2})?)", parse_amount),
            Rule::select_attr(
                "meta[itemprop=\"price\"], meta[property=\"product:price:amount\"], meta[property=\"og:price:amount\"]",
                "content",
                parse_amount,
            ),
            Rule::markup(r#""price"\s*:\s*"?(\d[\d.,]*)"#, parse_amount),
            // Whole numeric tokens; the amount shape is checked in the map fn
            Rule::text(r"([\d.,]*\d[\d.,]*)", rescue_amount)
                .low_confidence(),
        ],
        |value| value.is_finite() && *value > 0.0,
    )
});

pub fn extract(doc: &ParsedDocument<'_>) -> ExtractedField<f64> {
    PRICE.extract(doc)
}

/// Rule index of the numeric-scan rescue tier.
pub fn rescue_rule_index() -> usize {
    PRICE.len() - 1
}

fn first_amount(text: &str) -> Option<f64> {
    AMOUNT_RE.find(text).and_then(|m| parse_amount(m.as_str()))
}

fn rescue_amount(token: &str) -> Option<f64> {
    // Sentence punctuation may trail the number
    let token = token.trim_end_matches(['.', ',']);
    if !RESCUE_SHAPE_RE.is_match(token) {
        return None;
    }
    parse_amount(token).filter(|v| (RESCUE_MIN..=RESCUE_MAX).contains(v))
}

/// Parse a catalog amount.
///
/// With a comma present the comma is the decimal separator and dots group
/// thousands ("1.234,56"). Without one, a single dot followed by one or two
/// digits is a decimal point ("45.90"); any other dots group thousands.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ',');

    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replacen(',', ".", 1).replace(',', "")
    } else if is_dot_decimal(cleaned) {
        cleaned.to_string()
    } else {
        cleaned.replace('.', "")
    };

    let value: f64 = normalized.parse().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

fn is_dot_decimal(s: &str) -> bool {
    let mut parts = s.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(frac), None) => (1..=2).contains(&frac.len()),
        _ => false,
    }
}
