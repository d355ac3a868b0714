use serde::Deserialize;

/// Form body for login.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Form body for registration.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
}

/// Form body for password change.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordForm {
    pub old_password: String,
    pub new_password: String,
}
