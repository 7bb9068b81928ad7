use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::services::{AuthUser, MaybeAuthUser},
    error::{ApiError, ApiResult},
    images::services::discard,
    pagination::{ListQuery, Page},
    recipes::{
        dto::{RecipeMinified, RecipeRead, RecipeWriteRequest, ShortLinkResponse},
        relations::{self, Relation},
        repo,
        repo_types::RecipeFilter,
        services, shopping_list,
    },
    state::AppState,
    users::repo_types::User,
};

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes/", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/download_shopping_cart/",
            get(download_shopping_cart),
        )
        .route(
            "/recipes/:id/",
            get(get_recipe).patch(update_recipe).delete(delete_recipe),
        )
        .route("/recipes/:id/favorite/", post(add_favorite).delete(remove_favorite))
        .route(
            "/recipes/:id/shopping_cart/",
            post(add_to_cart).delete(remove_from_cart),
        )
        .route("/recipes/:id/get-link/", get(get_link))
}

/// Mounted outside `/api`.
pub fn short_link_routes() -> Router<AppState> {
    Router::new().route("/s/:hash/", get(follow_short_link))
}

fn recipe_not_found() -> ApiError {
    ApiError::not_found("Recipe not found.")
}

pub(crate) fn filter_from_query(query: &ListQuery) -> RecipeFilter {
    RecipeFilter {
        author: query.get_i64("author"),
        tags: query.get_all("tags"),
        is_favorited: query.get_flag("is_favorited"),
        is_in_shopping_cart: query.get_flag("is_in_shopping_cart"),
    }
}

async fn read_one(state: &AppState, viewer: Option<i64>, id: i64) -> ApiResult<RecipeRead> {
    let row = repo::get(&state.db, viewer, id)
        .await?
        .ok_or_else(recipe_not_found)?;
    services::assemble(state, viewer, vec![row])
        .await?
        .pop()
        .ok_or_else(recipe_not_found)
}

/// Authors may modify their own recipes; staff may modify any.
async fn ensure_can_modify(state: &AppState, user_id: i64, author_id: i64) -> ApiResult<()> {
    if user_id == author_id {
        return Ok(());
    }
    let is_staff = User::find_by_id(&state.db, user_id)
        .await?
        .map(|u| u.is_staff)
        .unwrap_or(false);
    if !is_staff {
        warn!(user_id, author_id, "recipe modification forbidden");
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

#[instrument(skip(state, query))]
pub async fn list_recipes(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    query: ListQuery,
) -> ApiResult<Json<Page<RecipeRead>>> {
    let window = query.window(state.config.page_size)?;
    let filter = filter_from_query(&query);
    let count = repo::count_filtered(&state.db, viewer, &filter).await?;
    let rows =
        repo::list_filtered(&state.db, viewer, &filter, window.size, window.offset()).await?;
    let recipes = services::assemble(&state, viewer, rows).await?;
    Ok(Json(Page::build(&query, window, count, recipes)?))
}

#[instrument(skip(state, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<RecipeWriteRequest>,
) -> ApiResult<(StatusCode, Json<RecipeRead>)> {
    let draft = services::validate_create(payload)?;
    let id = services::create_recipe(&state, user_id, draft).await?;
    let recipe = read_one(&state, Some(user_id), id).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<RecipeRead>> {
    Ok(Json(read_one(&state, viewer, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<RecipeWriteRequest>,
) -> ApiResult<Json<RecipeRead>> {
    let (author_id, image) = repo::owner_and_image(&state.db, id)
        .await?
        .ok_or_else(recipe_not_found)?;
    ensure_can_modify(&state, user_id, author_id).await?;

    let patch = services::validate_patch(payload)?;
    services::update_recipe(&state, id, &image, patch).await?;
    Ok(Json(read_one(&state, Some(user_id), id).await?))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let (author_id, image) = repo::owner_and_image(&state.db, id)
        .await?
        .ok_or_else(recipe_not_found)?;
    ensure_can_modify(&state, user_id, author_id).await?;

    repo::delete(&state.db, id).await?;
    discard(&state, &image).await;
    info!(recipe_id = id, user_id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn add_relation(
    state: &AppState,
    relation: Relation,
    user_id: i64,
    recipe_id: i64,
) -> ApiResult<(StatusCode, Json<RecipeMinified>)> {
    let row = repo::get_minified(&state.db, recipe_id)
        .await?
        .ok_or_else(recipe_not_found)?;
    if !relations::add(&state.db, relation, user_id, recipe_id).await? {
        warn!(user_id, recipe_id, relation = relation.label(), "duplicate relation");
        return Err(ApiError::validation(relation.duplicate_message()));
    }
    info!(user_id, recipe_id, relation = relation.label(), "recipe added");
    Ok((
        StatusCode::CREATED,
        Json(RecipeMinified::resolve(state, row).await?),
    ))
}

async fn remove_relation(
    state: &AppState,
    relation: Relation,
    user_id: i64,
    recipe_id: i64,
) -> ApiResult<StatusCode> {
    if !repo::exists(&state.db, recipe_id).await? {
        return Err(recipe_not_found());
    }
    if !relations::remove(&state.db, relation, user_id, recipe_id).await? {
        return Err(ApiError::validation(relation.missing_message()));
    }
    info!(user_id, recipe_id, relation = relation.label(), "recipe removed");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn add_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<(StatusCode, Json<RecipeMinified>)> {
    add_relation(&state, Relation::Favorite, user_id, id).await
}

#[instrument(skip(state))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    remove_relation(&state, Relation::Favorite, user_id, id).await
}

#[instrument(skip(state))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<(StatusCode, Json<RecipeMinified>)> {
    add_relation(&state, Relation::ShoppingCart, user_id, id).await
}

#[instrument(skip(state))]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    remove_relation(&state, Relation::ShoppingCart, user_id, id).await
}

#[instrument(skip(state))]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<impl IntoResponse> {
    let lines = repo::cart_lines(&state.db, user_id).await?;
    let body = shopping_list::render(&lines);
    info!(user_id, lines = lines.len(), "shopping list rendered");
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", shopping_list::FILENAME),
            ),
        ],
        body,
    ))
}

#[instrument(skip(state))]
pub async fn get_link(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ShortLinkResponse>> {
    let hash = repo::short_hash_of(&state.db, id)
        .await?
        .ok_or_else(recipe_not_found)?;
    Ok(Json(ShortLinkResponse {
        short_link: format!("{}/s/{}/", state.config.public_url, hash),
    }))
}

#[instrument(skip(state))]
pub async fn follow_short_link(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = repo::find_by_short_hash(&state.db, &hash)
        .await?
        .ok_or_else(|| ApiError::not_found("Short link not found."))?;
    let location = format!("{}/recipes/{}/", state.config.public_url, id);
    Ok((StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(path_and_query: &str) -> ListQuery {
        ListQuery::parse("http://testserver", path_and_query).unwrap()
    }

    #[test]
    fn filter_reads_repeated_tags_and_flags() {
        let q = query("/api/recipes/?tags=breakfast&tags=lunch&author=3&is_favorited=1");
        let filter = filter_from_query(&q);
        assert_eq!(filter.author, Some(3));
        assert_eq!(filter.tags, vec!["breakfast".to_string(), "lunch".to_string()]);
        assert!(filter.is_favorited);
        assert!(!filter.is_in_shopping_cart);
    }

    #[test]
    fn empty_query_means_no_filter() {
        assert_eq!(filter_from_query(&query("/api/recipes/")), RecipeFilter::default());
    }

    #[test]
    fn falsy_flags_are_ignored() {
        let q = query("/api/recipes/?is_in_shopping_cart=0&is_favorited=false");
        let filter = filter_from_query(&q);
        assert!(!filter.is_favorited);
        assert!(!filter.is_in_shopping_cart);
    }
}
