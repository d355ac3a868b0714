use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{ChangePasswordForm, LoginForm, RegisterForm},
        extractors::SessionUser,
        password::{hash_password, verify_password},
        session::{clear_session_cookie, session_cookie, token_from_headers},
        store::DEFAULT_PROFILE_PICTURE,
    },
    error::ApiError,
    notify::Event,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(login_page).post(login))
        .route("/profile", get(profile))
        .route("/register", get(register_page).post(register))
        .route(
            "/change_password",
            get(change_password_page).post(change_password),
        )
        .route("/logout", get(logout))
}

const LOGIN_PAGE: &str = r#"<!doctype html>
<title>Login</title>
<h1>Login</h1>
<form method="post" action="/">
  <input name="username" placeholder="username" required>
  <input name="password" type="password" placeholder="password" required>
  <button type="submit">Log in</button>
</form>
<a href="/register">Register</a>
"#;

const REGISTER_PAGE: &str = r#"<!doctype html>
<title>Register</title>
<h1>Register</h1>
<form method="post" action="/register">
  <input name="username" placeholder="username" required>
  <input name="password" type="password" placeholder="password" required>
  <button type="submit">Register</button>
</form>
<a href="/">Login</a>
"#;

const CHANGE_PASSWORD_PAGE: &str = r#"<!doctype html>
<title>Change password</title>
<h1>Change password</h1>
<form method="post" action="/change_password">
  <input name="old_password" type="password" placeholder="old password" required>
  <input name="new_password" type="password" placeholder="new password" required>
  <button type="submit">Change</button>
</form>
<a href="/profile">Back</a>
"#;

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

pub async fn register_page() -> Html<&'static str> {
    Html(REGISTER_PAGE)
}

pub async fn change_password_page(_user: SessionUser) -> Html<&'static str> {
    Html(CHANGE_PASSWORD_PAGE)
}

/// `POST /` — verify credentials and establish a session. Unknown username
/// and wrong password share one response, so usernames cannot be enumerated.
#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let user = match state.users.find_by_username(&form.username).await? {
        Some(u) => u,
        None => {
            warn!(username = %form.username, "login unknown username");
            return Err(ApiError::InvalidCredentials);
        }
    };

    if !verify_password(&form.password, &user.password_hash) {
        warn!(user_id = %user.id, username = %user.username, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.sessions.create(user.id);
    let cookie = session_cookie(&token, state.config.cookie_secure)
        .map_err(|e| ApiError::Internal(e.into()))?;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(([(SET_COOKIE, cookie)], Redirect::to("/profile")).into_response())
}

/// `POST /register` — create the account and broadcast `new_user`. The
/// pre-check gives the friendly error; the store's uniqueness constraint
/// still catches a racing duplicate.
#[instrument(skip(state, form))]
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Redirect, ApiError> {
    if state
        .users
        .find_by_username(&form.username)
        .await?
        .is_some()
    {
        warn!(username = %form.username, "username already registered");
        return Err(ApiError::DuplicateUsername);
    }

    let hash = hash_password(&form.password)?;
    let user = state
        .users
        .insert(&form.username, &hash, DEFAULT_PROFILE_PICTURE)
        .await?;

    state.notifier.publish(Event::NewUser {
        username: user.username.clone(),
    });

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(Redirect::to("/"))
}

/// `GET /profile` — gated; renders the acting user's name.
#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
) -> Result<Html<String>, ApiError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Html(format!(
        "<!doctype html>\n<title>Profile</title>\n<h1>Welcome, {}!</h1>\n\
         <img src=\"/{}\" alt=\"profile picture\">\n\
         <a href=\"/change_password\">Change password</a>\n<a href=\"/logout\">Logout</a>\n",
        escape_html(&user.username),
        escape_html(&user.profile_picture),
    )))
}

/// `POST /change_password` — gated; re-verifies the old password before
/// persisting the new hash.
#[instrument(skip(state, form))]
pub async fn change_password(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
    Form(form): Form<ChangePasswordForm>,
) -> Result<&'static str, ApiError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !verify_password(&form.old_password, &user.password_hash) {
        warn!(user_id = %user.id, "change_password wrong old password");
        return Err(ApiError::WrongOldPassword);
    }

    let hash = hash_password(&form.new_password)?;
    state.users.update_password_hash(user.id, &hash).await?;

    info!(user_id = %user.id, "password changed");
    Ok("Password updated successfully!")
}

/// `GET /logout` — idempotent; always clears the cookie.
#[instrument(skip(state, headers))]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(token) = token_from_headers(&headers) {
        state.sessions.destroy(&token);
    }

    let cookie = clear_session_cookie(state.config.cookie_secure)
        .map_err(|e| ApiError::Internal(e.into()))?;
    Ok(([(SET_COOKIE, cookie)], Redirect::to("/")).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escape_covers_markup() {
        assert_eq!(
            escape_html(r#"<b>&"x"</b>"#),
            "&lt;b&gt;&amp;&quot;x&quot;&lt;/b&gt;"
        );
        assert_eq!(escape_html("alice"), "alice");
    }
}
