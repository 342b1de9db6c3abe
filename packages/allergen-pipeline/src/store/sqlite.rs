//! SQLite storage implementation.
//!
//! Every write runs in its own transaction, so a failed write rolls back
//! only itself. Foreign keys are enforced: rebuilding the ingredient table
//! cascades to the tags that reference it.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use recipe_crawler::{RecipeRecord, RecipeSink};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{debug, info};

use super::{
    AllergenTag, NewIngredient, ProcessedIngredient, RawPage, Recipe, StoreCounts, TagSource,
    TagState,
};
use crate::allergens::Allergen;
use crate::error::{PipelineError, Result};

/// SQLite-backed recipe store.
#[derive(Clone)]
pub struct RecipeStore {
    pool: SqlitePool,
}

impl RecipeStore {
    /// Connect and create the schema if needed.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite://allergen_recipes.db` - File database, created if missing
    pub async fn connect(database_url: &str) -> Result<Self> {
        let in_memory = database_url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database lives and dies with its single connection.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        let store = Self { pool };
        store.run_migrations().await?;
        debug!(database_url = %database_url, "Recipe store ready");
        Ok(store)
    }

    /// Ephemeral store for tests.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS raw_pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_name TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                html TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS recipes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                raw_page_id INTEGER REFERENCES raw_pages(id) ON DELETE SET NULL,
                site_name TEXT NOT NULL,
                title TEXT NOT NULL,
                ingredients TEXT NOT NULL DEFAULT '',
                instructions TEXT NOT NULL DEFAULT '',
                tags TEXT NOT NULL DEFAULT '',
                scraped_at TEXT NOT NULL,
                UNIQUE(site_name, title)
            );

            CREATE TABLE IF NOT EXISTS processed_ingredients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                ingredient_text TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_processed_ingredients_recipe
                ON processed_ingredients(recipe_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        let tags_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS allergen_tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ingredient_id INTEGER NOT NULL
                    REFERENCES processed_ingredients(id) ON DELETE CASCADE,
                recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                allergen TEXT NOT NULL CHECK (allergen IN ({})),
                source TEXT NOT NULL CHECK (source IN ('rule', 'ml')),
                UNIQUE(ingredient_id, allergen)
            );

            CREATE INDEX IF NOT EXISTS idx_allergen_tags_recipe ON allergen_tags(recipe_id);
            "#,
            Allergen::quoted_list()
        );
        sqlx::query(&tags_table).execute(&self.pool).await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Insert a raw page, or return the existing id for its URL.
    ///
    /// The stored HTML is never overwritten.
    pub async fn upsert_raw_page(&self, site_name: &str, url: &str, html: &str) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO raw_pages (site_name, url, html)
            VALUES (?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET url = excluded.url
            RETURNING id
            "#,
        )
        .bind(site_name)
        .bind(url)
        .bind(html)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Insert a recipe, or overwrite the mutable fields of the existing
    /// `(site_name, title)` row. The id is stable across re-scrapes.
    pub async fn upsert_recipe(&self, raw_page_id: Option<i64>, record: &RecipeRecord) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO recipes (raw_page_id, site_name, title, ingredients, instructions, tags, scraped_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(site_name, title) DO UPDATE SET
                raw_page_id = excluded.raw_page_id,
                ingredients = excluded.ingredients,
                instructions = excluded.instructions,
                tags = excluded.tags,
                scraped_at = excluded.scraped_at
            RETURNING id
            "#,
        )
        .bind(raw_page_id)
        .bind(&record.site_name)
        .bind(&record.title)
        .bind(record.ingredients_text())
        .bind(record.instructions_text())
        .bind(record.tags_text())
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Insert a tag unless the `(ingredient, allergen)` pair already exists.
    ///
    /// Returns whether a row was written.
    pub async fn insert_tag(
        &self,
        ingredient_id: i64,
        recipe_id: i64,
        allergen: Allergen,
        source: TagSource,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO allergen_tags (ingredient_id, recipe_id, allergen, source)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(ingredient_id, allergen) DO NOTHING
            "#,
        )
        .bind(ingredient_id)
        .bind(recipe_id)
        .bind(allergen.as_str())
        .bind(source.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }

    /// Replace the whole normalized-ingredient table in one transaction.
    ///
    /// Every existing allergen tag is removed with it.
    pub async fn rebuild_ingredients(&self, rows: &[NewIngredient]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM processed_ingredients")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for row in rows {
            sqlx::query("INSERT INTO processed_ingredients (recipe_id, ingredient_text) VALUES (?, ?)")
                .bind(row.recipe_id)
                .bind(&row.text)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!(removed, inserted = rows.len(), "Rebuilt processed ingredients");
        Ok(rows.len())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn get_raw_page(&self, url: &str) -> Result<Option<RawPage>> {
        let row = sqlx::query_as::<_, RawPageRow>(
            "SELECT id, site_name, url, html FROM raw_pages WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RawPageRow::into_raw_page))
    }

    pub async fn get_recipe(&self, id: i64) -> Result<Option<Recipe>> {
        let row = sqlx::query_as::<_, RecipeRow>(
            "SELECT id, raw_page_id, site_name, title, ingredients, instructions, tags, scraped_at FROM recipes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RecipeRow::into_recipe).transpose()
    }

    pub async fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let rows = sqlx::query_as::<_, RecipeRow>(
            "SELECT id, raw_page_id, site_name, title, ingredients, instructions, tags, scraped_at FROM recipes ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RecipeRow::into_recipe).collect()
    }

    /// `(recipe_id, ingredient block)` for every stored recipe.
    pub async fn recipes_for_normalization(&self) -> Result<Vec<(i64, String)>> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, ingredients FROM recipes ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    pub async fn all_ingredients(&self) -> Result<Vec<ProcessedIngredient>> {
        let rows = sqlx::query_as::<_, IngredientRow>(
            "SELECT id, recipe_id, ingredient_text FROM processed_ingredients ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(IngredientRow::into_ingredient).collect())
    }

    /// Ingredients with zero tags of any source.
    pub async fn untagged_ingredients(&self) -> Result<Vec<ProcessedIngredient>> {
        let rows = sqlx::query_as::<_, IngredientRow>(
            r#"
            SELECT pi.id, pi.recipe_id, pi.ingredient_text
            FROM processed_ingredients pi
            WHERE NOT EXISTS (
                SELECT 1 FROM allergen_tags t WHERE t.ingredient_id = pi.id
            )
            ORDER BY pi.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(IngredientRow::into_ingredient).collect())
    }

    pub async fn tags_for_ingredient(&self, ingredient_id: i64) -> Result<Vec<AllergenTag>> {
        let rows = sqlx::query_as::<_, TagRow>(
            "SELECT id, ingredient_id, recipe_id, allergen, source FROM allergen_tags WHERE ingredient_id = ? ORDER BY id",
        )
        .bind(ingredient_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TagRow::into_tag).collect()
    }

    pub async fn all_tags(&self) -> Result<Vec<AllergenTag>> {
        let rows = sqlx::query_as::<_, TagRow>(
            "SELECT id, ingredient_id, recipe_id, allergen, source FROM allergen_tags ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TagRow::into_tag).collect()
    }

    pub async fn tag_state(&self, ingredient_id: i64) -> Result<TagState> {
        let tags = self.tags_for_ingredient(ingredient_id).await?;
        Ok(TagState::from_tags(&tags))
    }

    /// Allergen set per recipe, optionally restricted to one tag source.
    ///
    /// Recipes without tags are absent from the map.
    pub async fn tags_by_recipe(
        &self,
        source: Option<TagSource>,
    ) -> Result<HashMap<i64, BTreeSet<Allergen>>> {
        let rows: Vec<(i64, String)> = match source {
            Some(source) => {
                sqlx::query_as("SELECT DISTINCT recipe_id, allergen FROM allergen_tags WHERE source = ?")
                    .bind(source.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT DISTINCT recipe_id, allergen FROM allergen_tags")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut by_recipe: HashMap<i64, BTreeSet<Allergen>> = HashMap::new();
        for (recipe_id, name) in rows {
            by_recipe
                .entry(recipe_id)
                .or_default()
                .insert(parse_allergen(&name)?);
        }
        Ok(by_recipe)
    }

    pub async fn counts(&self) -> Result<StoreCounts> {
        let (raw_pages, recipes, ingredients, tags): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM raw_pages),
                (SELECT COUNT(*) FROM recipes),
                (SELECT COUNT(*) FROM processed_ingredients),
                (SELECT COUNT(*) FROM allergen_tags)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreCounts {
            raw_pages,
            recipes,
            ingredients,
            tags,
        })
    }
}

#[async_trait]
impl RecipeSink for RecipeStore {
    type Error = PipelineError;

    async fn save(&self, url: &str, html: &str, record: &RecipeRecord) -> Result<()> {
        let raw_id = self.upsert_raw_page(&record.site_name, url, html).await?;
        let recipe_id = self.upsert_recipe(Some(raw_id), record).await?;
        debug!(url = %url, raw_page_id = raw_id, recipe_id, "Stored recipe");
        Ok(())
    }
}

fn parse_allergen(name: &str) -> Result<Allergen> {
    name.parse()
        .map_err(|e| PipelineError::CorruptRow(format!("allergen_tags.allergen: {}", e)))
}

// Row types for sqlx queries
#[derive(Debug, FromRow)]
struct RawPageRow {
    id: i64,
    site_name: String,
    url: String,
    html: String,
}

impl RawPageRow {
    fn into_raw_page(self) -> RawPage {
        RawPage {
            id: self.id,
            site_name: self.site_name,
            url: self.url,
            html: self.html,
        }
    }
}

#[derive(Debug, FromRow)]
struct RecipeRow {
    id: i64,
    raw_page_id: Option<i64>,
    site_name: String,
    title: String,
    ingredients: String,
    instructions: String,
    tags: String,
    scraped_at: String,
}

impl RecipeRow {
    fn into_recipe(self) -> Result<Recipe> {
        let scraped_at = chrono::DateTime::parse_from_rfc3339(&self.scraped_at)
            .map_err(|e| PipelineError::CorruptRow(format!("recipes.scraped_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(Recipe {
            id: self.id,
            raw_page_id: self.raw_page_id,
            site_name: self.site_name,
            title: self.title,
            ingredients: self.ingredients,
            instructions: self.instructions,
            tags: self.tags,
            scraped_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct IngredientRow {
    id: i64,
    recipe_id: i64,
    ingredient_text: String,
}

impl IngredientRow {
    fn into_ingredient(self) -> ProcessedIngredient {
        ProcessedIngredient {
            id: self.id,
            recipe_id: self.recipe_id,
            text: self.ingredient_text,
        }
    }
}

#[derive(Debug, FromRow)]
struct TagRow {
    id: i64,
    ingredient_id: i64,
    recipe_id: i64,
    allergen: String,
    source: String,
}

impl TagRow {
    fn into_tag(self) -> Result<AllergenTag> {
        let source = self
            .source
            .parse::<TagSource>()
            .map_err(|e| PipelineError::CorruptRow(format!("allergen_tags.source: {}", e)))?;

        Ok(AllergenTag {
            id: self.id,
            ingredient_id: self.ingredient_id,
            recipe_id: self.recipe_id,
            allergen: parse_allergen(&self.allergen)?,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> RecipeStore {
        RecipeStore::in_memory().await.unwrap()
    }

    fn pancakes(ingredients: &[&str]) -> RecipeRecord {
        RecipeRecord::new("X", "Pancakes").with_ingredients(ingredients.iter().copied())
    }

    #[tokio::test]
    async fn test_raw_page_upsert_keeps_first_html() {
        let store = test_store().await;

        let first = store
            .upsert_raw_page("X", "https://x.test/p", "<p>one</p>")
            .await
            .unwrap();
        let second = store
            .upsert_raw_page("X", "https://x.test/p", "<p>two</p>")
            .await
            .unwrap();

        assert_eq!(first, second);
        let page = store.get_raw_page("https://x.test/p").await.unwrap().unwrap();
        assert_eq!(page.html, "<p>one</p>");
        assert_eq!(store.counts().await.unwrap().raw_pages, 1);
    }

    #[tokio::test]
    async fn test_recipe_upsert_overwrites_and_keeps_id() {
        let store = test_store().await;

        let first = store
            .upsert_recipe(None, &pancakes(&["1 cup flour"]))
            .await
            .unwrap();
        let second = store
            .upsert_recipe(None, &pancakes(&["2 cups oat flour", "1 egg"]))
            .await
            .unwrap();

        assert_eq!(first, second);
        let recipes = store.list_recipes().await.unwrap();
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].ingredients, "2 cups oat flour\n1 egg");
    }

    #[tokio::test]
    async fn test_same_title_on_other_site_is_distinct() {
        let store = test_store().await;
        let a = store.upsert_recipe(None, &pancakes(&[])).await.unwrap();
        let b = store
            .upsert_recipe(None, &RecipeRecord::new("Y", "Pancakes"))
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_insert_tag_is_conflict_tolerant() {
        let store = test_store().await;
        let recipe_id = store.upsert_recipe(None, &pancakes(&["milk"])).await.unwrap();
        store
            .rebuild_ingredients(&[NewIngredient::new(recipe_id, "milk")])
            .await
            .unwrap();
        let ingredient = store.all_ingredients().await.unwrap().remove(0);

        assert!(store
            .insert_tag(ingredient.id, recipe_id, Allergen::Milk, TagSource::Rule)
            .await
            .unwrap());
        assert!(!store
            .insert_tag(ingredient.id, recipe_id, Allergen::Milk, TagSource::Ml)
            .await
            .unwrap());

        let tags = store.tags_for_ingredient(ingredient.id).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].source, TagSource::Rule);
        assert_eq!(store.tag_state(ingredient.id).await.unwrap(), TagState::RuleTagged);
    }

    #[tokio::test]
    async fn test_rebuild_cascades_to_tags() {
        let store = test_store().await;
        let recipe_id = store.upsert_recipe(None, &pancakes(&["egg"])).await.unwrap();
        store
            .rebuild_ingredients(&[NewIngredient::new(recipe_id, "egg")])
            .await
            .unwrap();
        let ingredient = store.all_ingredients().await.unwrap().remove(0);
        store
            .insert_tag(ingredient.id, recipe_id, Allergen::Egg, TagSource::Rule)
            .await
            .unwrap();
        assert_eq!(store.counts().await.unwrap().tags, 1);

        store
            .rebuild_ingredients(&[NewIngredient::new(recipe_id, "egg")])
            .await
            .unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.ingredients, 1);
        assert_eq!(counts.tags, 0);
        assert_eq!(store.untagged_ingredients().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ingredient_requires_live_recipe() {
        let store = test_store().await;
        let err = store
            .rebuild_ingredients(&[NewIngredient::new(999, "ghost")])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));
        // The failed rebuild rolled back as a unit.
        assert_eq!(store.counts().await.unwrap().ingredients, 0);
    }

    #[tokio::test]
    async fn test_tags_by_recipe_filters_source() {
        let store = test_store().await;
        let recipe_id = store
            .upsert_recipe(None, &pancakes(&["milk", "mystery paste"]))
            .await
            .unwrap();
        store
            .rebuild_ingredients(&[
                NewIngredient::new(recipe_id, "milk"),
                NewIngredient::new(recipe_id, "mystery paste"),
            ])
            .await
            .unwrap();
        let ingredients = store.all_ingredients().await.unwrap();
        store
            .insert_tag(ingredients[0].id, recipe_id, Allergen::Milk, TagSource::Rule)
            .await
            .unwrap();
        store
            .insert_tag(ingredients[1].id, recipe_id, Allergen::Sesame, TagSource::Ml)
            .await
            .unwrap();

        let all = store.tags_by_recipe(None).await.unwrap();
        assert_eq!(
            all[&recipe_id],
            BTreeSet::from([Allergen::Milk, Allergen::Sesame])
        );
        let rule_only = store.tags_by_recipe(Some(TagSource::Rule)).await.unwrap();
        assert_eq!(rule_only[&recipe_id], BTreeSet::from([Allergen::Milk]));
    }

    #[tokio::test]
    async fn test_sink_stores_page_and_recipe() {
        let store = test_store().await;
        let record = pancakes(&["1 cup milk"]);

        store.save("https://x.test/pancakes", "<html/>", &record).await.unwrap();
        store.save("https://x.test/pancakes", "<html/>", &record).await.unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.raw_pages, 1);
        assert_eq!(counts.recipes, 1);
        let recipe = store.list_recipes().await.unwrap().remove(0);
        assert!(recipe.raw_page_id.is_some());
    }
}
