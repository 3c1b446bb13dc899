use serde::{Deserialize, Serialize};

use super::text::fold;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductTypeClass {
    Ring,
    Earring,
    Necklace,
    Bracelet,
    Piercing,
    Generic,
}

impl ProductTypeClass {
    pub const ALL: [ProductTypeClass; 6] = [
        ProductTypeClass::Ring,
        ProductTypeClass::Earring,
        ProductTypeClass::Necklace,
        ProductTypeClass::Bracelet,
        ProductTypeClass::Piercing,
        ProductTypeClass::Generic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProductTypeClass::Ring => "ring",
            ProductTypeClass::Earring => "earring",
            ProductTypeClass::Necklace => "necklace",
            ProductTypeClass::Bracelet => "bracelet",
            ProductTypeClass::Piercing => "piercing",
            ProductTypeClass::Generic => "generic",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == fold(label.trim()))
    }
}

impl std::fmt::Display for ProductTypeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Checked in order; the first class with a matching keyword wins.
const CLASS_KEYWORDS: &[(ProductTypeClass, &[&str])] = &[
    (ProductTypeClass::Ring, &["anel", "aneis", "alianca", "ring"]),
    (ProductTypeClass::Earring, &["brinco", "earring", "argola", "ear cuff", "hoop"]),
    (ProductTypeClass::Necklace, &["colar", "gargantilha", "choker", "necklace"]),
    (
        ProductTypeClass::Bracelet,
        &["pulseira", "bracelete", "bracelet", "tornozeleira", "anklet", "bangle"],
    ),
    (ProductTypeClass::Piercing, &["piercing", "septum", "tragus", "helix", "labret"]),
];

/// Classify a product name by keyword. Case and accents are ignored;
/// keywords match at the start of a word so "earrings" is not a ring.
pub fn classify(name: &str) -> ProductTypeClass {
    let folded = fold(name);
    CLASS_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| contains_word_start(&folded, kw)))
        .map(|(class, _)| *class)
        .unwrap_or(ProductTypeClass::Generic)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    GoldTone,
    SilverTone,
    CubicZirconia,
    HeartShaped,
    Solitaire,
    Delicate,
}

const FEATURE_KEYWORDS: &[(Feature, &[&str])] = &[
    (Feature::GoldTone, &["dourad", "ouro", "gold", "banhado a ouro"]),
    (Feature::SilverTone, &["prata", "pratead", "rodio", "silver"]),
    (Feature::CubicZirconia, &["zirconia", "zircao", "cravejad", "cubic zirconia", "cz"]),
    (Feature::HeartShaped, &["coracao", "coracoes", "heart"]),
    (Feature::Solitaire, &["solitario", "solitaire", "ponto de luz"]),
    (Feature::Delicate, &["delicad", "minimalista", "delicate", "dainty"]),
];

/// Material, finish and setting words found in the name, in a fixed order.
pub fn detect_features(name: &str) -> Vec<Feature> {
    let folded = fold(name);
    FEATURE_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| contains_word_start(&folded, kw)))
        .map(|(feature, _)| *feature)
        .collect()
}

fn contains_word_start(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(idx, _)| {
        haystack[..idx]
            .chars()
            .next_back()
            .map_or(true, |prev| !prev.is_alphanumeric())
    })
}
