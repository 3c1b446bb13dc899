pub mod classify;
pub mod document;
pub mod extract;
pub mod rules;
pub mod text;

use crate::error::ImportError;
use crate::estimator::Estimator;
use crate::normalizer::{self, ImportedProductRecord};
use document::SourceDocument;
use extract::ExtractedFields;

/// Extract every field from a document without defaulting anything.
pub fn extract_fields(document: &SourceDocument) -> ExtractedFields {
    let parsed = document.parse();
    extract::extract_all(&parsed)
}

/// Two-step pipeline: document → extracted fields → normalized record.
pub fn process_document(
    document: &SourceDocument,
    name_hint: Option<&str>,
    estimator: &Estimator,
    sku_suffix: &str,
) -> Result<ImportedProductRecord, ImportError> {
    let fields = extract_fields(document);
    normalizer::normalize(fields, name_hint, &document.url, estimator, sku_suffix)
}
