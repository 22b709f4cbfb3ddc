use super::{error_response, TOKEN_COOKIE};
use crate::entities::AuthToken;
use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
    Extension,
};
use sea_orm::{DatabaseConnection, EntityTrait};
use tower_cookies::Cookies;

/// Resolves `Authorization: Token <key>` (or the token cookie) to a user id
/// and stores it as an `i32` request extension.
pub async fn auth_middleware(
    Extension(db): Extension<DatabaseConnection>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Response {
    let key = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Token "))
        .map(|v| v.trim().to_string())
        .or_else(|| cookies.get(TOKEN_COOKIE).map(|c| c.value().to_string()));

    let Some(key) = key else {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    match AuthToken::find_by_id(key).one(&db).await {
        Ok(Some(token)) => {
            tracing::Span::current().record("user_id", token.user_id);
            request.extensions_mut().insert(token.user_id);
            next.run(request).await
        }
        Ok(None) => error_response(StatusCode::UNAUTHORIZED, "Unauthorized"),
        Err(e) => super::internal_error(e),
    }
}
