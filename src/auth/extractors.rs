use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::Redirect,
};
use tracing::debug;
use uuid::Uuid;

use super::session::token_from_headers;
use crate::state::AppState;

/// Resolves the session cookie to the acting user's id, once per request.
/// Rejection is the redirect to the login page.
pub struct SessionUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or_else(|| {
            debug!("no session cookie on gated route");
            Redirect::to("/")
        })?;

        let user_id = state.sessions.resolve(&token).ok_or_else(|| {
            debug!("session cookie does not resolve");
            Redirect::to("/")
        })?;

        Ok(SessionUser(user_id))
    }
}
