//! Context-sensitive exemptions that veto an otherwise valid keyword match.
//!
//! Only Milk, Egg and Gluten carry exemptions; every other allergen passes
//! through unguarded.

use lazy_static::lazy_static;
use regex::Regex;

use super::Allergen;

lazy_static! {
    // Milk
    static ref NON_DAIRY_MILK: Regex =
        Regex::new(r"(?i)\b(?:coconut|almond|oat|rice|soy|hemp|cashew|pea)\s+milk\b").unwrap();
    static ref VEGAN_BUTTER: Regex = Regex::new(r"(?i)\bvegan\s+butter\b").unwrap();
    static ref COCOA_BUTTER: Regex = Regex::new(r"(?i)\bcocoa\s+butter\b").unwrap();
    static ref NUT_BUTTER: Regex =
        Regex::new(r"(?i)\b(?:peanut|almond|cashew|hazelnut|sunflower|seed|nut|apple|shea)\s+butter\b")
            .unwrap();
    static ref NON_DAIRY_CREAM: Regex =
        Regex::new(r"(?i)\b(?:coconut|soy|oat|cashew|almond)\s+(?:cream|yogurt|yoghurt)\b").unwrap();
    static ref CREAM_OF_TARTAR: Regex = Regex::new(r"(?i)\bcream\s+of\s+tartar\b").unwrap();

    // Egg
    static ref EGG_REPLACER: Regex =
        Regex::new(r"(?i)\b(?:egg\s+replacer|vegan\s+egg|plant[-\s]based\s+egg)\b").unwrap();
    static ref VEGAN_MAYO: Regex = Regex::new(r"(?i)\bvegan\s+mayonnaise\b").unwrap();

    // Gluten
    static ref GLUTEN_FREE: Regex = Regex::new(r"(?i)\bgluten[-\s]?free\b").unwrap();
    static ref ALT_FLOUR: Regex = Regex::new(
        r"(?i)\b(?:rice|almond|oat|coconut|soy|corn|buckwheat|cassava|garbanzo|chickpea|quinoa)\s+flour\b"
    )
    .unwrap();
}

/// Decides whether a keyword hit for an allergen should be discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct FalsePositiveGuard;

impl FalsePositiveGuard {
    pub fn new() -> Self {
        Self
    }

    /// `true` means the match is a known false positive and must be dropped.
    pub fn is_false_positive(&self, allergen: Allergen, text: &str) -> bool {
        match allergen {
            Allergen::Milk => {
                NON_DAIRY_MILK.is_match(text)
                    || VEGAN_BUTTER.is_match(text)
                    || COCOA_BUTTER.is_match(text)
                    || NUT_BUTTER.is_match(text)
                    || NON_DAIRY_CREAM.is_match(text)
                    || CREAM_OF_TARTAR.is_match(text)
            }
            Allergen::Egg => EGG_REPLACER.is_match(text) || VEGAN_MAYO.is_match(text),
            Allergen::Gluten => GLUTEN_FREE.is_match(text) || ALT_FLOUR.is_match(text),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guarded(allergen: Allergen, text: &str) -> bool {
        FalsePositiveGuard::new().is_false_positive(allergen, text)
    }

    #[test]
    fn test_milk_exemptions() {
        assert!(guarded(Allergen::Milk, "almond milk"));
        assert!(guarded(Allergen::Milk, "unsweetened Oat  Milk"));
        assert!(guarded(Allergen::Milk, "vegan butter"));
        assert!(guarded(Allergen::Milk, "cocoa butter"));
        assert!(guarded(Allergen::Milk, "peanut butter"));
        assert!(guarded(Allergen::Milk, "coconut cream"));
        assert!(guarded(Allergen::Milk, "cream of tartar"));

        assert!(!guarded(Allergen::Milk, "whole milk"));
        assert!(!guarded(Allergen::Milk, "unsalted butter"));
        assert!(!guarded(Allergen::Milk, "heavy cream"));
    }

    #[test]
    fn test_egg_exemptions() {
        assert!(guarded(Allergen::Egg, "vegan egg replacer"));
        assert!(guarded(Allergen::Egg, "plant-based egg"));
        assert!(guarded(Allergen::Egg, "plant based egg"));
        assert!(guarded(Allergen::Egg, "vegan mayonnaise"));

        assert!(!guarded(Allergen::Egg, "egg yolk"));
        assert!(!guarded(Allergen::Egg, "mayonnaise"));
    }

    #[test]
    fn test_gluten_exemptions() {
        assert!(guarded(Allergen::Gluten, "gluten-free pasta"));
        assert!(guarded(Allergen::Gluten, "gluten free oats"));
        assert!(guarded(Allergen::Gluten, "glutenfree flour"));
        assert!(guarded(Allergen::Gluten, "rice flour"));
        assert!(guarded(Allergen::Gluten, "chickpea flour"));

        assert!(!guarded(Allergen::Gluten, "flour"));
        assert!(!guarded(Allergen::Gluten, "whole wheat flour"));
    }

    #[test]
    fn test_other_allergens_pass_through() {
        assert!(!guarded(Allergen::TreeNuts, "almond milk"));
        assert!(!guarded(Allergen::Soy, "soy milk"));
        assert!(!guarded(Allergen::Peanuts, "peanut butter"));
    }
}
