use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    catalog::repo::{self, Ingredient, Tag},
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct IngredientFilter {
    pub name: Option<String>,
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/tags/", get(list_tags))
        .route("/tags/:id/", get(get_tag))
        .route("/ingredients/", get(list_ingredients))
        .route("/ingredients/:id/", get(get_ingredient))
}

#[instrument(skip(state))]
pub async fn list_tags(State(state): State<AppState>) -> ApiResult<Json<Vec<Tag>>> {
    Ok(Json(repo::list_tags(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn get_tag(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Tag>> {
    repo::get_tag(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Tag not found."))
}

#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(filter): Query<IngredientFilter>,
) -> ApiResult<Json<Vec<Ingredient>>> {
    Ok(Json(
        repo::list_ingredients(&state.db, filter.name.as_deref()).await?,
    ))
}

#[instrument(skip(state))]
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Ingredient>> {
    repo::get_ingredient(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Ingredient not found."))
}
