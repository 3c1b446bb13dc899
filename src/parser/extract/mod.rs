pub mod description;
pub mod images;
pub mod name;
pub mod price;
pub mod weight;

use super::document::ParsedDocument;
use super::rules::ExtractedField;
use name::ExtractedName;

/// Raw per-field outcomes for one document, before any defaulting.
#[derive(Debug, Clone)]
pub struct ExtractedFields {
    pub name: ExtractedField<ExtractedName>,
    pub price: ExtractedField<f64>,
    pub weight: ExtractedField<f64>,
    pub images: ExtractedField<Vec<String>>,
    pub description: ExtractedField<String>,
}

pub fn extract_all(doc: &ParsedDocument<'_>) -> ExtractedFields {
    ExtractedFields {
        name: name::extract(doc),
        price: price::extract(doc),
        weight: weight::extract(doc),
        images: images::extract(doc),
        description: description::extract(doc),
    }
}
