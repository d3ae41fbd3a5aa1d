// Request extractors that turn the session cookie into an explicit auth context

use super::error::ApiError;
use super::AppState;
use crate::auth::{token_from_cookie_header, AuthContext};
use crate::entities::User;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::COOKIE, request::Parts, HeaderMap},
};

/// The session token carried by the request's `Cookie` headers, if any.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(token_from_cookie_header)
        .map(str::to_string)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers) else {
            return Ok(AuthContext::anonymous());
        };

        let secret = state.settings.secret_key.clone();
        state
            .with_conn(move |conn| {
                Ok(AuthContext::from_token(conn, &secret, Some(token.as_str()))?)
            })
            .await
    }
}

/// An authenticated admin. Rejects everyone else with 403.
#[derive(Debug, Clone)]
pub struct AdminContext(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;
        match auth.user() {
            Some(user) if user.is_admin() => Ok(AdminContext(user.clone())),
            _ => Err(ApiError::admin_required()),
        }
    }
}
