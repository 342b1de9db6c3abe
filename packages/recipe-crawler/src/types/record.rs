//! Structured recipe record produced by the extractor.

use serde::{Deserialize, Serialize};

/// Title used when a page has no usable title element.
pub const UNTITLED: &str = "Untitled";

/// One recipe as pulled out of a detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeRecord {
    pub site_name: String,
    pub title: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub tags: Vec<String>,
}

impl RecipeRecord {
    pub fn new(site_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
            title: title.into(),
            ingredients: Vec::new(),
            instructions: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_ingredients(mut self, lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ingredients = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_instructions(mut self, lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.instructions = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Ingredient lines as the newline-separated block that gets stored.
    pub fn ingredients_text(&self) -> String {
        self.ingredients.join("\n")
    }

    pub fn instructions_text(&self) -> String {
        self.instructions.join("\n")
    }

    /// Tags as a comma list.
    pub fn tags_text(&self) -> String {
        self.tags.join(", ")
    }

    pub fn is_untitled(&self) -> bool {
        self.title == UNTITLED
    }
}
