//! Assembly of extracted fields and estimator defaults into one validated
//! product record.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ImportError;
use crate::estimator::Estimator;
use crate::parser::classify::{classify, detect_features, Feature, ProductTypeClass};
use crate::parser::extract::name::clean_name;
use crate::parser::extract::weight::is_plausible;
use crate::parser::extract::ExtractedFields;
use crate::parser::rules::ExtractedField;
use crate::parser::text::slugify;

const SKU_BASE_MAX: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Extracted,
    /// Taken from the low-confidence numeric scan.
    Rescued,
    Estimated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    Extracted,
    Estimated,
}

impl PriceSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PriceSource::Extracted => "extracted",
            PriceSource::Rescued => "rescued",
            PriceSource::Estimated => "estimated",
        }
    }
}

impl FieldSource {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldSource::Extracted => "extracted",
            FieldSource::Estimated => "estimated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedProductRecord {
    pub name: String,
    pub product_type: ProductTypeClass,
    pub cost_price: f64,
    pub sale_price: f64,
    pub price_source: PriceSource,
    pub weight_grams: f64,
    pub weight_source: FieldSource,
    pub images: Vec<String>,
    pub description: String,
    pub slug: String,
    pub sku: String,
    pub source_url: String,
}

/// Per-run SKU suffixes: a UTC timestamp stamp plus a sequence number, so
/// repeated names within a run and across runs get distinct SKUs.
#[derive(Debug, Clone)]
pub struct SkuSequence {
    stamp: String,
    next: u32,
}

impl SkuSequence {
    pub fn new(stamp: impl Into<String>) -> Self {
        Self {
            stamp: stamp.into(),
            next: 1,
        }
    }

    pub fn from_clock() -> Self {
        Self::new(Utc::now().format("%y%m%d%H%M%S").to_string())
    }

    /// Suffix the next record will get, without claiming it.
    pub fn peek_suffix(&self) -> String {
        format!("{}{:03}", self.stamp, self.next)
    }

    pub fn advance(&mut self) {
        self.next += 1;
    }

    pub fn next_suffix(&mut self) -> String {
        let suffix = self.peek_suffix();
        self.advance();
        suffix
    }
}

/// Merge extracted fields with estimator defaults.
///
/// Only a missing name is fatal; every other miss or rejected value is
/// replaced by the class estimate.
pub fn normalize(
    fields: ExtractedFields,
    name_hint: Option<&str>,
    source_url: &str,
    estimator: &Estimator,
    sku_suffix: &str,
) -> Result<ImportedProductRecord, ImportError> {
    let name = fields
        .name
        .into_value()
        .or_else(|| name_hint.and_then(clean_name))
        .filter(|n| !n.display.trim().is_empty())
        .ok_or_else(|| ImportError::MissingName {
            source_url: source_url.to_string(),
        })?;

    let product_type = classify(&name.full);
    let defaults = estimator.estimate_defaults(product_type);

    let (cost_price, price_source) = match &fields.price {
        ExtractedField::Found { value, .. } if value.is_finite() && *value > 0.0 => {
            let source = if fields.price.is_low_confidence() {
                PriceSource::Rescued
            } else {
                PriceSource::Extracted
            };
            (*value, source)
        }
        _ => (defaults.cost_price, PriceSource::Estimated),
    };

    let (weight_grams, weight_source) = match fields.weight.value() {
        Some(grams) if is_plausible(*grams) => (*grams, FieldSource::Extracted),
        _ => (defaults.weight_grams, FieldSource::Estimated),
    };

    let description = fields
        .description
        .into_value()
        .unwrap_or_else(|| generate_description(product_type, &detect_features(&name.full)));

    let slug = slugify(&name.display);
    let sku = build_sku(&slug, sku_suffix);
    debug!(
        %sku,
        class = %product_type,
        price = price_source.as_str(),
        weight = weight_source.as_str(),
        "normalized record"
    );

    Ok(ImportedProductRecord {
        name: name.display,
        product_type,
        cost_price,
        sale_price: estimator.sale_price(cost_price),
        price_source,
        weight_grams,
        weight_source,
        images: fields.images.into_value().unwrap_or_default(),
        description,
        slug,
        sku,
        source_url: source_url.to_string(),
    })
}

/// First three letters of each slug token, uppercased, then the suffix.
pub fn build_sku(slug: &str, suffix: &str) -> String {
    let mut base: String = slug
        .split('-')
        .filter(|t| !t.is_empty())
        .flat_map(|t| t.chars().take(3))
        .take(SKU_BASE_MAX)
        .collect::<String>()
        .to_uppercase();
    if base.is_empty() {
        base.push_str("ITEM");
    }
    format!("{}-{}", base, suffix)
}

fn class_noun(class: ProductTypeClass) -> &'static str {
    match class {
        ProductTypeClass::Ring => "Ring",
        ProductTypeClass::Earring => "Pair of earrings",
        ProductTypeClass::Necklace => "Necklace",
        ProductTypeClass::Bracelet => "Bracelet",
        ProductTypeClass::Piercing => "Piercing",
        ProductTypeClass::Generic => "Jewelry piece",
    }
}

fn feature_clause(feature: Feature) -> &'static str {
    match feature {
        Feature::GoldTone => "with a gold-tone finish",
        Feature::SilverTone => "with a silver-tone finish",
        Feature::CubicZirconia => "set with cubic zirconia stones",
        Feature::HeartShaped => "featuring a heart-shaped design",
        Feature::Solitaire => "in a solitaire setting",
        Feature::Delicate => "in a delicate, minimalist style",
    }
}

/// Template sentence used when the page has no usable description. Each
/// detected feature contributes one clause.
pub fn generate_description(class: ProductTypeClass, features: &[Feature]) -> String {
    let noun = class_noun(class);
    if features.is_empty() {
        return format!("{} designed for everyday elegance.", noun);
    }
    let clauses: Vec<&str> = features.iter().map(|f| feature_clause(*f)).collect();
    let joined = match clauses.as_slice() {
        [only] => only.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
        [] => String::new(),
    };
    format!("{} {}, designed for everyday elegance.", noun, joined)
}
