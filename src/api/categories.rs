//! Category endpoints

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use axum_extra::extract::WithRejection;

use super::dto::{CreateCategoryRequest, DeleteCategoryRequest, RenameCategoryRequest};
use crate::AppState;
use crate::data::{Category, CategorySummary};
use crate::error::AppError;

/// Routes:
/// - GET /categories - List categories
/// - POST /categories - Create category
/// - PUT /categories - Rename category
/// - DELETE /categories - Delete category
pub fn categories_router() -> Router<AppState> {
    Router::new().route(
        "/categories",
        get(list_categories)
            .post(create_category)
            .put(rename_category)
            .delete(delete_category),
    )
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategorySummary>>, AppError> {
    Ok(Json(state.categories.list().await?))
}

async fn create_category(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<CreateCategoryRequest>, AppError>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let name = req.name.ok_or_else(|| AppError::missing_fields(&["name"]))?;
    let category = state.categories.create(&name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn rename_category(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RenameCategoryRequest>, AppError>,
) -> Result<Json<Category>, AppError> {
    let (id, new_name) = match (req.id, req.new_name) {
        (Some(id), Some(new_name)) => (id, new_name),
        (None, Some(_)) => return Err(AppError::missing_fields(&["id"])),
        (Some(_), None) => return Err(AppError::missing_fields(&["newName"])),
        (None, None) => return Err(AppError::missing_fields(&["id", "newName"])),
    };
    Ok(Json(state.categories.rename(id, &new_name).await?))
}

async fn delete_category(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<DeleteCategoryRequest>, AppError>,
) -> Result<StatusCode, AppError> {
    let id = req
        .category_id
        .ok_or_else(|| AppError::missing_fields(&["categoryId"]))?;
    state.categories.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
