use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod relations;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod shopping_list;
pub mod short_hash;

pub fn router() -> Router<AppState> {
    handlers::recipe_routes()
}
