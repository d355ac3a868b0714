use crate::state::AppState;
use axum::Router;

pub mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod password;
pub mod session;
pub mod store;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
