//! Movie service
//!
//! Serves movie views (movie + category name + sources) through the cache.
//! The list lives under `movies:all`, single movies under `single-movie:{id}`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use super::{invalidate_after_write, require_text};
use crate::data::{
    ALL_KEY, Cache, CacheNamespace, Database, Invalidation, Movie, MovieView, NewMovie, Source,
};
use crate::error::AppError;

/// Search looks at this many of the newest movies
const SEARCH_WINDOW: i64 = 10;

fn update_invalidations(id: i64) -> Vec<Invalidation> {
    vec![
        Invalidation::list(CacheNamespace::Movies),
        Invalidation::key(CacheNamespace::SingleMovie, id),
    ]
}

fn delete_invalidations(id: i64) -> Vec<Invalidation> {
    let mut targets = update_invalidations(id);
    targets.push(Invalidation::list(CacheNamespace::Sources));
    targets.push(Invalidation::namespace(CacheNamespace::Comments));
    targets
}

fn validate(movie: NewMovie) -> Result<NewMovie, AppError> {
    let title = require_text("title", &movie.title)?;
    let description = require_text("description", &movie.description)?;

    if !(0.0..=10.0).contains(&movie.rating) {
        return Err(AppError::Validation(
            "rating must be between 0 and 10".to_string(),
        ));
    }
    if movie.year <= 0 {
        return Err(AppError::Validation("year must be positive".to_string()));
    }

    Ok(NewMovie {
        title,
        description,
        movie_type: movie
            .movie_type
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        poster: movie
            .poster
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        ..movie
    })
}

fn matches_query(view: &MovieView, needle: &str) -> bool {
    view.movie.title.to_lowercase().contains(needle)
        || view.movie.description.to_lowercase().contains(needle)
        || view.category_name.to_lowercase().contains(needle)
        || view.movie.year.to_string().contains(needle)
}

/// Movie service
pub struct MovieService {
    db: Arc<Database>,
    cache: Arc<Cache>,
}

impl MovieService {
    pub fn new(db: Arc<Database>, cache: Arc<Cache>) -> Self {
        Self { db, cache }
    }

    /// All movies with category and sources, newest first
    pub async fn list(&self) -> Result<Vec<MovieView>, AppError> {
        self.cache
            .get_or_load(CacheNamespace::Movies, ALL_KEY, || async move {
                self.load_views().await
            })
            .await
    }

    /// One movie with category and sources
    ///
    /// # Errors
    /// `NotFound` if the movie does not exist (never cached)
    pub async fn get(&self, id: i64) -> Result<MovieView, AppError> {
        self.cache
            .get_or_load(CacheNamespace::SingleMovie, &id.to_string(), || async move {
                let record = self
                    .db
                    .get_movie_record(id)
                    .await?
                    .ok_or(AppError::NotFound("movie"))?;
                let sources = self.db.list_sources_for_movie(id).await?;
                Ok(MovieView::new(record, sources))
            })
            .await
    }

    pub async fn create(&self, movie: NewMovie) -> Result<Movie, AppError> {
        let movie = validate(movie)?;
        let created = self.db.insert_movie(&movie, Utc::now()).await?;

        invalidate_after_write(
            &self.cache,
            "movie.create",
            &[Invalidation::list(CacheNamespace::Movies)],
        )
        .await;
        tracing::info!(movie_id = created.id, title = %created.title, "Movie created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, movie: NewMovie) -> Result<Movie, AppError> {
        let movie = validate(movie)?;
        let updated = self
            .db
            .update_movie(id, &movie)
            .await?
            .ok_or(AppError::NotFound("movie"))?;

        invalidate_after_write(&self.cache, "movie.update", &update_invalidations(id)).await;
        tracing::info!(movie_id = id, "Movie updated");
        Ok(updated)
    }

    /// Delete a movie together with its sources and comments
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        self.db
            .delete_movie(id)
            .await?
            .ok_or(AppError::NotFound("movie"))?;

        invalidate_after_write(&self.cache, "movie.delete", &delete_invalidations(id)).await;
        tracing::info!(movie_id = id, "Movie deleted");
        Ok(())
    }

    /// Case-insensitive match on title, description, category or year
    /// among the newest movies. Always read from the database.
    ///
    /// An absent or blank query returns those newest movies unfiltered.
    pub async fn search(&self, query: Option<&str>) -> Result<Vec<MovieView>, AppError> {
        let needle = query
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());

        let records = self.db.recent_movie_records(SEARCH_WINDOW).await?;
        let mut results = Vec::new();
        for record in records {
            let id = record.movie.id;
            let view = MovieView::new(record, Vec::new());
            if needle.as_deref().is_none_or(|needle| matches_query(&view, needle)) {
                let sources = self.db.list_sources_for_movie(id).await?;
                results.push(MovieView { sources, ..view });
            }
        }

        Ok(results)
    }

    async fn load_views(&self) -> Result<Vec<MovieView>, AppError> {
        let records = self.db.list_movie_records().await?;

        let mut sources_by_movie: HashMap<i64, Vec<Source>> = HashMap::new();
        for source in self.db.list_sources().await? {
            sources_by_movie
                .entry(source.movie_id)
                .or_default()
                .push(source);
        }

        Ok(records
            .into_iter()
            .map(|record| {
                let mut sources = sources_by_movie
                    .remove(&record.movie.id)
                    .unwrap_or_default();
                sources.sort_by_key(|s| (s.part, s.id));
                MovieView::new(record, sources)
            })
            .collect())
    }
}
