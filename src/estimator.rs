//! Default commercial values per product type.
//!
//! Used only when extraction misses or a value fails validation. The sale
//! price is never estimated on its own: it is always derived from whichever
//! cost price is in effect.

use serde::{Deserialize, Serialize};

use crate::parser::classify::ProductTypeClass;

pub const DEFAULT_MARGIN_MULTIPLIER: f64 = 4.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommercialDefaults {
    pub cost_price: f64,
    pub weight_grams: f64,
}

impl CommercialDefaults {
    pub const fn new(cost_price: f64, weight_grams: f64) -> Self {
        Self {
            cost_price,
            weight_grams,
        }
    }
}

/// Hand-tuned typical wholesale price and weight for each class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorTable {
    pub ring: CommercialDefaults,
    pub earring: CommercialDefaults,
    pub necklace: CommercialDefaults,
    pub bracelet: CommercialDefaults,
    pub piercing: CommercialDefaults,
    pub generic: CommercialDefaults,
}

impl Default for EstimatorTable {
    fn default() -> Self {
        Self {
            ring: CommercialDefaults::new(35.0, 3.0),
            earring: CommercialDefaults::new(30.0, 2.5),
            necklace: CommercialDefaults::new(55.0, 6.0),
            bracelet: CommercialDefaults::new(45.0, 5.0),
            piercing: CommercialDefaults::new(20.0, 1.0),
            generic: CommercialDefaults::new(40.0, 4.0),
        }
    }
}

impl EstimatorTable {
    pub fn get(&self, class: ProductTypeClass) -> CommercialDefaults {
        match class {
            ProductTypeClass::Ring => self.ring,
            ProductTypeClass::Earring => self.earring,
            ProductTypeClass::Necklace => self.necklace,
            ProductTypeClass::Bracelet => self.bracelet,
            ProductTypeClass::Piercing => self.piercing,
            ProductTypeClass::Generic => self.generic,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Estimator {
    table: EstimatorTable,
    margin_multiplier: f64,
}

impl Default for Estimator {
    fn default() -> Self {
        Self::new(EstimatorTable::default(), DEFAULT_MARGIN_MULTIPLIER)
    }
}

impl Estimator {
    pub fn new(table: EstimatorTable, margin_multiplier: f64) -> Self {
        Self {
            table,
            margin_multiplier,
        }
    }

    pub fn estimate_defaults(&self, class: ProductTypeClass) -> CommercialDefaults {
        self.table.get(class)
    }

    pub fn margin_multiplier(&self) -> f64 {
        self.margin_multiplier
    }

    /// `round(cost × multiplier)`, in whole currency units.
    pub fn sale_price(&self, cost_price: f64) -> f64 {
        (cost_price * self.margin_multiplier).round()
    }
}
