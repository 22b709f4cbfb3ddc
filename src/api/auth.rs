use super::{error_response, internal_error, TOKEN_COOKIE};
use crate::config::AppConfig;
use crate::entities::{auth_token, user, AuthToken, User};
use crate::notifications::Mailer;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tower_cookies::{Cookie, Cookies};

pub const MIN_PASSWORD_LENGTH: usize = 6;
const RESET_TOKEN_TTL_HOURS: i64 = 24;

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Random token used for login keys and one-time links.
pub fn new_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

#[derive(serde::Deserialize)]
pub struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    repeated_password: Option<String>,
}

/// Field errors in the `{"field": ["message"]}` shape clients expect.
#[derive(Default)]
struct FieldErrors(Map<String, Value>);

impl FieldErrors {
    fn add(&mut self, field: &str, message: &str) {
        let entry = self
            .0
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(vec![]));
        if let Value::Array(messages) = entry {
            messages.push(Value::String(message.to_string()));
        }
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(Value::Object(self.0))).into_response()
    }
}

fn required<'a>(errors: &mut FieldErrors, field: &str, value: &'a Option<String>) -> Option<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            errors.add(field, "This field is required.");
            None
        }
    }
}

pub async fn register(
    Extension(db): Extension<DatabaseConnection>,
    Extension(mailer): Extension<Mailer>,
    Extension(config): Extension<Arc<AppConfig>>,
    Json(payload): Json<RegisterRequest>,
) -> Response {
    let mut errors = FieldErrors::default();
    let email = required(&mut errors, "email", &payload.email).map(str::to_lowercase);
    let password = required(&mut errors, "password", &payload.password);
    let repeated = required(&mut errors, "repeated_password", &payload.repeated_password);

    if let Some(email) = &email {
        if !is_valid_email(email) {
            errors.add("email", "Enter a valid email address.");
        }
    }
    for (field, value) in [("password", password), ("repeated_password", repeated)] {
        if value.is_some_and(|v| v.chars().count() < MIN_PASSWORD_LENGTH) {
            errors.add(field, "Ensure this field has at least 6 characters.");
        }
    }
    if let (Some(p), Some(r)) = (password, repeated) {
        if p != r {
            errors.add("repeated_password", "Passwords do not match.");
        }
    }
    if !errors.is_empty() {
        return errors.into_response();
    }

    // All three are present once the error map is empty.
    let (Some(email), Some(password)) = (email, password) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid registration data");
    };

    match User::find()
        .filter(user::Column::Email.eq(email.clone()))
        .one(&db)
        .await
    {
        Ok(Some(_)) => {
            let mut errors = FieldErrors::default();
            errors.add("email", "This e-mail address is already in use.");
            return errors.into_response();
        }
        Ok(None) => {}
        Err(e) => return internal_error(e),
    }

    let password_hash = match hash_password(password) {
        Ok(hash) => hash,
        Err(_) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password")
        }
    };

    let now = chrono::Utc::now().naive_utc();
    let activation_token = new_token();
    let new_user = user::ActiveModel {
        email: Set(email),
        password_hash: Set(password_hash),
        is_active: Set(false),
        activation_token: Set(Some(activation_token.clone())),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let user = match new_user.insert(&db).await {
        Ok(user) => user,
        Err(e) => {
            let error_msg = e.to_string();
            if error_msg.contains("duplicate key value violates unique constraint")
                || error_msg.contains("UNIQUE constraint failed")
            {
                let mut errors = FieldErrors::default();
                errors.add("email", "This e-mail address is already in use.");
                return errors.into_response();
            }
            return internal_error(e);
        }
    };

    tracing::Span::current()
        .record("table", "users")
        .record("action", "register_user")
        .record("user_id", user.id)
        .record("business_event", "User registered");
    crate::metrics::increment_users_registered();

    let link = format!(
        "{}/api/activate/{}/{}",
        config.backend_url.trim_end_matches('/'),
        user.id,
        activation_token
    );
    if let Err(e) = mailer.send_activation(&user.email, &link).await {
        tracing::error!(user_id = user.id, error = %e, "activation mail not delivered");
    }

    (
        StatusCode::CREATED,
        Json(json!({
            "message": "Please check your mailbox and confirm your e-mail address.",
            "user_id": user.id,
            "email": user.email,
        })),
    )
        .into_response()
}

pub async fn activate(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<Arc<AppConfig>>,
    Path((uid, token)): Path<(String, String)>,
) -> Response {
    let frontend = config.frontend_url.trim_end_matches('/');
    let redirect = |query: &str| Redirect::to(&format!("{frontend}/login?{query}")).into_response();

    let Ok(user_id) = uid.parse::<i32>() else {
        return redirect("error=invalid_link");
    };

    let user = match User::find_by_id(user_id).one(&db).await {
        Ok(Some(u)) => u,
        Ok(None) => return redirect("error=invalid_link"),
        Err(e) => return internal_error(e),
    };

    if user.activation_token.as_deref() != Some(token.as_str()) {
        return redirect("error=invalid_token");
    }

    let mut active_user = user.into_active_model();
    active_user.is_active = Set(true);
    active_user.activation_token = Set(None);
    active_user.updated_at = Set(chrono::Utc::now().naive_utc());

    match active_user.update(&db).await {
        Ok(u) => {
            tracing::info!(user_id = u.id, "account activated");
            redirect("success=account_activated")
        }
        Err(e) => internal_error(e),
    }
}

#[derive(serde::Deserialize)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

pub async fn login(
    Extension(db): Extension<DatabaseConnection>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Response {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": ["Email and password are required."]})),
        )
            .into_response();
    };
    let invalid = || {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": ["Invalid credentials."]})),
        )
            .into_response()
    };

    let user = match User::find()
        .filter(user::Column::Email.eq(email.trim().to_lowercase()))
        .one(&db)
        .await
    {
        Ok(Some(u)) => u,
        Ok(None) => return invalid(),
        Err(e) => return internal_error(e),
    };

    if !verify_password(&password, &user.password_hash) {
        tracing::Span::current()
            .record("table", "users")
            .record("action", "login_user_failed")
            .record("error", "invalid_credentials");
        return invalid();
    }

    if !user.is_active {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"detail": "Please confirm your e-mail address first."})),
        )
            .into_response();
    }

    let token = match get_or_create_token(&db, user.id).await {
        Ok(t) => t,
        Err(e) => return internal_error(e),
    };

    let mut cookie = Cookie::new(TOKEN_COOKIE, token.key.clone());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookies.add(cookie);

    tracing::Span::current()
        .record("table", "users")
        .record("action", "login_user")
        .record("user_id", user.id)
        .record("business_event", "User logged in successfully");

    (
        StatusCode::OK,
        Json(json!({"token": token.key, "user_id": user.id, "email": user.email})),
    )
        .into_response()
}

async fn get_or_create_token(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<auth_token::Model, sea_orm::DbErr> {
    if let Some(existing) = AuthToken::find()
        .filter(auth_token::Column::UserId.eq(user_id))
        .one(db)
        .await?
    {
        return Ok(existing);
    }

    auth_token::ActiveModel {
        key: Set(new_token()),
        user_id: Set(user_id),
        created_at: Set(chrono::Utc::now().naive_utc()),
    }
    .insert(db)
    .await
}

#[derive(serde::Deserialize)]
pub struct PasswordResetRequest {
    email: Option<String>,
}

/// Always answers 200 for a syntactically present address so the endpoint
/// cannot be used to probe which accounts exist.
pub async fn request_password_reset(
    Extension(db): Extension<DatabaseConnection>,
    Extension(mailer): Extension<Mailer>,
    Extension(config): Extension<Arc<AppConfig>>,
    Json(payload): Json<PasswordResetRequest>,
) -> Response {
    let Some(email) = payload
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Please enter an e-mail address."})),
        )
            .into_response();
    };

    let user = match User::find()
        .filter(user::Column::Email.eq(email))
        .one(&db)
        .await
    {
        Ok(u) => u,
        Err(e) => return internal_error(e),
    };

    if let Some(user) = user {
        let token = new_token();
        let now = chrono::Utc::now().naive_utc();
        let address = user.email.clone();
        let user_id = user.id;

        let mut active_user = user.into_active_model();
        active_user.password_reset_token = Set(Some(token.clone()));
        active_user.password_reset_expires_at =
            Set(Some(now + chrono::Duration::hours(RESET_TOKEN_TTL_HOURS)));
        active_user.updated_at = Set(now);
        if let Err(e) = active_user.update(&db).await {
            return internal_error(e);
        }

        let link = format!(
            "{}/reset-password/{}/{}/",
            config.frontend_url.trim_end_matches('/'),
            user_id,
            token
        );
        if let Err(e) = mailer.send_password_reset(&address, &link).await {
            tracing::error!(user_id, error = %e, "password reset mail not delivered");
        }
    }

    (
        StatusCode::OK,
        Json(json!({"message": "A password reset email has been sent to the provided email address."})),
    )
        .into_response()
}

#[derive(serde::Deserialize)]
pub struct PasswordResetConfirm {
    password: Option<String>,
}

pub async fn confirm_password_reset(
    Extension(db): Extension<DatabaseConnection>,
    Path((uid, token)): Path<(String, String)>,
    Json(payload): Json<PasswordResetConfirm>,
) -> Response {
    let bad_request = |message: &str| {
        (StatusCode::BAD_REQUEST, Json(json!({"message": message}))).into_response()
    };

    let Ok(user_id) = uid.parse::<i32>() else {
        return bad_request("Invalid link.");
    };
    let user = match User::find_by_id(user_id).one(&db).await {
        Ok(Some(u)) => u,
        Ok(None) => return bad_request("Invalid link."),
        Err(e) => return internal_error(e),
    };

    let now = chrono::Utc::now().naive_utc();
    let token_valid = user.password_reset_token.as_deref() == Some(token.as_str())
        && user.password_reset_expires_at.is_some_and(|expires| expires > now);
    if !token_valid {
        return bad_request("Invalid or expired link.");
    }

    let Some(password) = payload.password.filter(|p| !p.is_empty()) else {
        return bad_request("New password is required.");
    };
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return bad_request("Ensure the password has at least 6 characters.");
    }

    let password_hash = match hash_password(&password) {
        Ok(hash) => hash,
        Err(_) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password")
        }
    };

    let mut active_user = user.into_active_model();
    active_user.password_hash = Set(password_hash);
    active_user.password_reset_token = Set(None);
    active_user.password_reset_expires_at = Set(None);
    active_user.updated_at = Set(now);

    match active_user.update(&db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({"message": "Password successfully reset. You can log in now."})),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("anna@example.com"));
        assert!(!is_valid_email("anna.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("anna@example"));
        assert!(!is_valid_email("anna@@example.com"));
        assert!(!is_valid_email("an na@example.com"));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("secret123").unwrap();
        assert!(verify_password("secret123", &hash));
        assert!(!verify_password("secret124", &hash));
        assert!(!verify_password("secret123", "not-a-hash"));
    }

    #[test]
    fn tokens_are_unique_hex() {
        let a = new_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, new_token());
    }
}
