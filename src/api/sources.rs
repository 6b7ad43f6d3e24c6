//! Source endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use axum_extra::extract::WithRejection;

use super::dto::SourceRequest;
use crate::AppState;
use crate::data::Source;
use crate::error::AppError;

pub fn sources_router() -> Router<AppState> {
    Router::new()
        .route("/sources", get(list_sources).post(create_source))
        .route("/sources/:id", put(update_source).delete(delete_source))
}

async fn list_sources(State(state): State<AppState>) -> Result<Json<Vec<Source>>, AppError> {
    Ok(Json(state.sources.list().await?))
}

async fn create_source(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<SourceRequest>, AppError>,
) -> Result<(StatusCode, Json<Source>), AppError> {
    let source = state.sources.create(req.into_new_source()?).await?;
    Ok((StatusCode::CREATED, Json(source)))
}

async fn update_source(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(req), _): WithRejection<Json<SourceRequest>, AppError>,
) -> Result<Json<Source>, AppError> {
    Ok(Json(state.sources.update(id, req.into_new_source()?).await?))
}

async fn delete_source(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> Result<StatusCode, AppError> {
    state.sources.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
