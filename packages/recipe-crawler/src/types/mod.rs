//! Site configuration and extracted record types.

pub mod record;
pub mod site;

pub use record::{RecipeRecord, UNTITLED};
pub use site::{Selectors, SiteConfig};
