//! Category service
//!
//! Category names are embedded in every cached movie view, so any category
//! change drops the movie namespaces too.

use std::sync::Arc;

use chrono::Utc;

use super::{invalidate_after_write, require_text};
use crate::data::{
    ALL_KEY, Cache, CacheNamespace, Category, CategorySummary, Database, Invalidation,
};
use crate::error::AppError;

fn category_invalidations() -> Vec<Invalidation> {
    vec![
        Invalidation::list(CacheNamespace::Categories),
        Invalidation::namespace(CacheNamespace::Movies),
        Invalidation::namespace(CacheNamespace::SingleMovie),
    ]
}

/// Category service
pub struct CategoryService {
    db: Arc<Database>,
    cache: Arc<Cache>,
}

impl CategoryService {
    pub fn new(db: Arc<Database>, cache: Arc<Cache>) -> Self {
        Self { db, cache }
    }

    /// All categories, newest first
    pub async fn list(&self) -> Result<Vec<CategorySummary>, AppError> {
        self.cache
            .get_or_load(CacheNamespace::Categories, ALL_KEY, || async move {
                let categories = self.db.list_categories().await?;
                Ok(categories.into_iter().map(CategorySummary::from).collect())
            })
            .await
    }

    pub async fn create(&self, name: &str) -> Result<Category, AppError> {
        let name = require_text("name", name)?;
        let category = self.db.insert_category(&name, Utc::now()).await?;

        invalidate_after_write(&self.cache, "category.create", &category_invalidations()).await;
        tracing::info!(category_id = category.id, name = %category.name, "Category created");
        Ok(category)
    }

    pub async fn rename(&self, id: i64, name: &str) -> Result<Category, AppError> {
        let name = require_text("newName", name)?;
        let category = self
            .db
            .rename_category(id, &name)
            .await?
            .ok_or(AppError::NotFound("category"))?;

        invalidate_after_write(&self.cache, "category.rename", &category_invalidations()).await;
        tracing::info!(category_id = id, name = %category.name, "Category renamed");
        Ok(category)
    }

    /// Delete a category
    ///
    /// # Errors
    /// `NotFound` if missing, `Conflict` while movies still use it
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        if !self.db.delete_category(id).await? {
            return Err(AppError::NotFound("category"));
        }

        invalidate_after_write(&self.cache, "category.delete", &category_invalidations()).await;
        tracing::info!(category_id = id, "Category deleted");
        Ok(())
    }
}
