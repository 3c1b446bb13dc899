use std::sync::LazyLock;

use crate::parser::document::ParsedDocument;
use crate::parser::rules::{ExtractedField, FieldExtractor, Rule};

/// Jewelry never weighs this much; larger readings are extraction noise.
pub const MAX_PLAUSIBLE_GRAMS: f64 = 50.0;

static WEIGHT: LazyLock<FieldExtractor<f64>> = LazyLock::new(|| {
    FieldExtractor::new(
        "weight",
        vec![
            Rule::text(
                r"(?i)\b(?:peso|weight)(?:\s+(?:aproximado|aprox\.?|approx\.?))?\s*:?\s*(\d+(?:[.,]\d+)?\s*(?:kg|mg|gramas|grams?|grs|gr|g|cm|mm|ml)?)\b",
                parse_labelled,
            ),
            Rule::text(r"(?i)\b(\d+(?:[.,]\d+)?)\s*(?:g|gr|grs|gramas|grams?)\b", parse_grams),
        ],
        |grams| is_plausible(*grams),
    )
});

pub fn extract(doc: &ParsedDocument<'_>) -> ExtractedField<f64> {
    WEIGHT.extract(doc)
}

pub fn is_plausible(grams: f64) -> bool {
    grams.is_finite() && grams > 0.0 && grams < MAX_PLAUSIBLE_GRAMS
}

/// Number with an optional unit after a weight label. No unit means grams;
/// kilograms are converted, anything else is not a weight in grams.
fn parse_labelled(raw: &str) -> Option<f64> {
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let grams = parse_grams(number)?;
    match unit.trim().to_lowercase().as_str() {
        "" | "g" | "gr" | "grs" | "gram" | "grams" | "gramas" => Some(grams),
        "kg" => Some(grams * 1000.0),
        _ => None,
    }
}

fn parse_grams(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse::<f64>().ok()
}
