use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::services::{hash_password, verify_password, AuthUser, MaybeAuthUser},
    error::{is_unique_violation, ApiError, ApiResult},
    images::services::{decode_data_uri, discard, media_url, upload_image},
    pagination::{ListQuery, Page},
    state::AppState,
    users::{
        dto::{
            AvatarRequest, AvatarResponse, CreatedUser, PublicUser, RegisterRequest,
            SetPasswordRequest, UserWithRecipes,
        },
        repo,
        repo_types::{NewUser, User},
        services::{
            ensure_not_self, public_user, validate_password, validate_registration, with_recipes,
        },
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/", get(list_users).post(register))
        .route("/users/me/", get(get_me))
        .route("/users/set_password/", post(set_password))
        .route("/users/me/avatar/", put(set_avatar).delete(delete_avatar))
        .route("/users/subscriptions/", get(list_subscriptions))
        .route("/users/:id/", get(get_user))
        .route("/users/:id/subscribe/", post(subscribe).delete(unsubscribe))
}

#[instrument(skip(state, query))]
pub async fn list_users(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    query: ListQuery,
) -> ApiResult<Json<Page<PublicUser>>> {
    let window = query.window(state.config.page_size)?;
    let count = repo::count_users(&state.db).await?;
    let rows = repo::list_profiles(&state.db, viewer, window.size, window.offset()).await?;

    let mut users = Vec::with_capacity(rows.len());
    for row in rows {
        users.push(public_user(&state, row).await?);
    }
    Ok(Json(Page::build(&query, window, count, users)?))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<CreatedUser>)> {
    if let Err(e) = validate_registration(&mut payload) {
        warn!(error = %e, "registration rejected");
        return Err(e);
    }

    let (email_taken, username_taken) =
        User::email_or_username_taken(&state.db, &payload.email, &payload.username).await?;
    if email_taken {
        return Err(ApiError::validation("A user with this email already exists."));
    }
    if username_taken {
        return Err(ApiError::validation("A user with this username already exists."));
    }

    let hash = hash_password(&payload.password)?;
    let new = NewUser {
        email: &payload.email,
        username: &payload.username,
        first_name: &payload.first_name,
        last_name: &payload.last_name,
        password_hash: &hash,
    };
    let user = match User::create(&state.db, &new).await {
        Ok(u) => u,
        // lost a race against a concurrent registration
        Err(e) if is_unique_violation(&e, "users_email_key") => {
            return Err(ApiError::validation("A user with this email already exists."))
        }
        Err(e) if is_unique_violation(&e, "users_username_key") => {
            return Err(ApiError::validation("A user with this username already exists."))
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(CreatedUser {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<PublicUser>> {
    let row = repo::profile(&state.db, viewer, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found."))?;
    Ok(Json(public_user(&state, row).await?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<PublicUser>> {
    let row = repo::profile(&state.db, Some(user_id), user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;
    Ok(Json(public_user(&state, row).await?))
}

#[instrument(skip(state, payload))]
pub async fn set_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<SetPasswordRequest>,
) -> ApiResult<StatusCode> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        warn!(user_id, "set_password with wrong current password");
        return Err(ApiError::validation("Current password is incorrect."));
    }
    validate_password(&payload.new_password)?;

    let hash = hash_password(&payload.new_password)?;
    User::set_password_hash(&state.db, user_id, &hash).await?;
    info!(user_id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn set_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<AvatarRequest>,
) -> ApiResult<Json<AvatarResponse>> {
    let raw = payload
        .avatar
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| ApiError::validation("Field 'avatar' is required."))?;
    let image = decode_data_uri(&raw)?;

    let key = upload_image(&state, &format!("users/{user_id}"), &image).await?;
    let previous = match User::set_avatar(&state.db, user_id, Some(&key)).await {
        Ok(prev) => prev,
        Err(e) => {
            discard(&state, &key).await;
            return Err(e.into());
        }
    };
    if let Some(old) = previous {
        discard(&state, &old).await;
    }

    info!(user_id, key = %key, "avatar updated");
    Ok(Json(AvatarResponse {
        avatar: media_url(&state, &key).await?,
    }))
}

#[instrument(skip(state))]
pub async fn delete_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<StatusCode> {
    if let Some(old) = User::set_avatar(&state.db, user_id, None).await? {
        discard(&state, &old).await;
    }
    info!(user_id, "avatar removed");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, query))]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    query: ListQuery,
) -> ApiResult<Json<Page<UserWithRecipes>>> {
    let window = query.window(state.config.page_size)?;
    let count = repo::count_subscriptions(&state.db, user_id).await?;
    let rows = repo::list_subscriptions(&state.db, user_id, window.size, window.offset()).await?;
    let authors = with_recipes(&state, rows, query.positive("recipes_limit")).await?;
    Ok(Json(Page::build(&query, window, count, authors)?))
}

#[instrument(skip(state, query))]
pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(author_id): Path<i64>,
    query: ListQuery,
) -> ApiResult<(StatusCode, Json<UserWithRecipes>)> {
    if !User::exists_by_id(&state.db, author_id).await? {
        return Err(ApiError::not_found("User not found."));
    }
    ensure_not_self(user_id, author_id)?;

    if !repo::insert_subscription(&state.db, user_id, author_id).await? {
        warn!(user_id, author_id, "duplicate subscription");
        return Err(ApiError::validation("You are already subscribed to this author."));
    }
    info!(user_id, author_id, "subscribed");

    let row = repo::subscription(&state.db, user_id, author_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found."))?;
    let mut authors = with_recipes(&state, vec![row], query.positive("recipes_limit")).await?;
    let author = authors
        .pop()
        .ok_or_else(|| ApiError::not_found("User not found."))?;
    Ok((StatusCode::CREATED, Json(author)))
}

#[instrument(skip(state))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(author_id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !User::exists_by_id(&state.db, author_id).await? {
        return Err(ApiError::not_found("User not found."));
    }
    if !repo::delete_subscription(&state.db, user_id, author_id).await? {
        return Err(ApiError::validation("Subscription not found."));
    }
    info!(user_id, author_id, "unsubscribed");
    Ok(StatusCode::NO_CONTENT)
}
