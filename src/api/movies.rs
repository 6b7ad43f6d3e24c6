//! Movie and per-movie source endpoints

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use axum_extra::extract::WithRejection;

use super::dto::{MovieRequest, SearchQuery};
use crate::AppState;
use crate::data::{Movie, MovieView, Source};
use crate::error::AppError;

/// Routes:
/// - GET/POST /movies
/// - GET /movies/search?query=
/// - GET/PUT/DELETE /movies/:id
/// - GET /movies/:id/sources
pub fn movies_router() -> Router<AppState> {
    Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/search", get(search_movies))
        .route(
            "/movies/:id",
            get(get_movie).put(update_movie).delete(delete_movie),
        )
        .route("/movies/:id/sources", get(list_movie_sources))
}

async fn list_movies(State(state): State<AppState>) -> Result<Json<Vec<MovieView>>, AppError> {
    Ok(Json(state.movies.list().await?))
}

async fn get_movie(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<MovieView>, AppError> {
    Ok(Json(state.movies.get(id).await?))
}

async fn create_movie(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<MovieRequest>, AppError>,
) -> Result<(StatusCode, Json<Movie>), AppError> {
    let movie = state.movies.create(req.into_new_movie()?).await?;
    Ok((StatusCode::CREATED, Json(movie)))
}

async fn update_movie(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(req), _): WithRejection<Json<MovieRequest>, AppError>,
) -> Result<Json<Movie>, AppError> {
    Ok(Json(state.movies.update(id, req.into_new_movie()?).await?))
}

async fn delete_movie(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> Result<StatusCode, AppError> {
    state.movies.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /movies/search?query=
///
/// Matches the ten most recent movies only; without a query those ten are
/// returned unfiltered.
async fn search_movies(
    State(state): State<AppState>,
    WithRejection(Query(params), _): WithRejection<Query<SearchQuery>, AppError>,
) -> Result<Json<Vec<MovieView>>, AppError> {
    Ok(Json(state.movies.search(params.query.as_deref()).await?))
}

async fn list_movie_sources(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<Vec<Source>>, AppError> {
    Ok(Json(state.sources.list_for_movie(id).await?))
}
