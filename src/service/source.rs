//! Source service
//!
//! Sources are embedded in movie views, so every source write also drops
//! the movie list and the affected single-movie entries.

use std::sync::Arc;

use chrono::Utc;

use super::{invalidate_after_write, require_text};
use crate::data::{ALL_KEY, Cache, CacheNamespace, Database, Invalidation, NewSource, Source};
use crate::error::AppError;

fn source_invalidations(movie_ids: &[i64]) -> Vec<Invalidation> {
    let mut targets = vec![
        Invalidation::list(CacheNamespace::Sources),
        Invalidation::list(CacheNamespace::Movies),
    ];
    for movie_id in movie_ids {
        let target = Invalidation::key(CacheNamespace::SingleMovie, movie_id);
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    targets
}

fn validate(source: NewSource) -> Result<NewSource, AppError> {
    if source.part < 1 {
        return Err(AppError::Validation("part must be at least 1".to_string()));
    }

    let base_url = require_text("baseUrl", &source.base_url)?;
    url::Url::parse(&base_url)
        .map_err(|_| AppError::Validation("baseUrl must be an absolute URL".to_string()))?;

    Ok(NewSource {
        name: require_text("name", &source.name)?,
        domain: require_text("domain", &source.domain)?,
        base_url,
        download_link: source.download_link.trim().to_string(),
        ..source
    })
}

/// Source service
pub struct SourceService {
    db: Arc<Database>,
    cache: Arc<Cache>,
}

impl SourceService {
    pub fn new(db: Arc<Database>, cache: Arc<Cache>) -> Self {
        Self { db, cache }
    }

    /// All sources, newest first
    pub async fn list(&self) -> Result<Vec<Source>, AppError> {
        self.cache
            .get_or_load(CacheNamespace::Sources, ALL_KEY, || async move {
                self.db.list_sources().await
            })
            .await
    }

    /// Sources of one movie ordered by part. Read from the database.
    pub async fn list_for_movie(&self, movie_id: i64) -> Result<Vec<Source>, AppError> {
        if self.db.get_movie(movie_id).await?.is_none() {
            return Err(AppError::NotFound("movie"));
        }
        self.db.list_sources_for_movie(movie_id).await
    }

    pub async fn create(&self, source: NewSource) -> Result<Source, AppError> {
        let source = validate(source)?;
        let created = self.db.insert_source(&source, Utc::now()).await?;

        invalidate_after_write(
            &self.cache,
            "source.create",
            &source_invalidations(&[created.movie_id]),
        )
        .await;
        tracing::info!(source_id = created.id, movie_id = created.movie_id, "Source created");
        Ok(created)
    }

    /// Update a source. Moving it to another movie refreshes both movies.
    pub async fn update(&self, id: i64, source: NewSource) -> Result<Source, AppError> {
        let source = validate(source)?;
        let (previous_movie_id, updated) = self
            .db
            .update_source(id, &source)
            .await?
            .ok_or(AppError::NotFound("source"))?;

        invalidate_after_write(
            &self.cache,
            "source.update",
            &source_invalidations(&[previous_movie_id, updated.movie_id]),
        )
        .await;
        tracing::info!(source_id = id, movie_id = updated.movie_id, "Source updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let deleted = self
            .db
            .delete_source(id)
            .await?
            .ok_or(AppError::NotFound("source"))?;

        invalidate_after_write(
            &self.cache,
            "source.delete",
            &source_invalidations(&[deleted.movie_id]),
        )
        .await;
        tracing::info!(source_id = id, movie_id = deleted.movie_id, "Source deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SourceType;

    fn input() -> NewSource {
        NewSource {
            movie_id: 1,
            name: " Server A ".to_string(),
            domain: "stream.example.com".to_string(),
            source_type: SourceType::End,
            part: 1,
            base_url: "https://stream.example.com/v/1".to_string(),
            download_link: String::new(),
            is_iframe: false,
        }
    }

    #[test]
    fn validate_rejects_zero_part() {
        let mut source = input();
        source.part = 0;
        assert!(matches!(validate(source), Err(AppError::Validation(_))));
    }

    #[test]
    fn validate_rejects_relative_base_url() {
        let mut source = input();
        source.base_url = "/v/1".to_string();
        assert!(matches!(validate(source), Err(AppError::Validation(_))));
    }

    #[test]
    fn moved_source_invalidates_both_movies_once() {
        let targets = source_invalidations(&[1, 2]);
        assert!(targets.contains(&Invalidation::key(CacheNamespace::SingleMovie, 1)));
        assert!(targets.contains(&Invalidation::key(CacheNamespace::SingleMovie, 2)));

        let same_movie = source_invalidations(&[1, 1]);
        assert_eq!(same_movie.len(), 3);
    }
}
