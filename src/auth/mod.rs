use crate::state::AppState;
use axum::Router;

mod claims;
mod cookies;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod memory;
mod password;
pub mod repo;
pub mod repo_types;
pub mod services;
mod validation;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
