//! Reference data: tags and ingredients.

use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod repo;
pub mod seed;

pub fn router() -> Router<AppState> {
    handlers::catalog_routes()
}
