use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::CookieJar;
use tracing::warn;

use super::{
    cookies::ACCESS_COOKIE,
    dto::PublicUser,
    jwt::{JwtKeys, TokenError},
    repo::UserStore,
};
use crate::{error::AppError, state::AppState};

/// Pulls the access token from the `accessToken` cookie, falling back to the
/// `Authorization` header with an optional `Bearer ` prefix.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(ACCESS_COOKIE) {
        let value = cookie.value().trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    let header = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .unwrap_or(header)
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Resolves an access token to a live user. Read-only.
#[derive(Clone)]
pub struct Authenticator {
    users: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl FromRef<AppState> for Authenticator {
    fn from_ref(state: &AppState) -> Self {
        Self {
            users: state.users.clone(),
            keys: state.keys.clone(),
        }
    }
}

impl Authenticator {
    pub async fn authenticate(&self, token: Option<&str>) -> Result<PublicUser, AppError> {
        let token = token.ok_or_else(|| AppError::auth("Unauthorized Request"))?;

        let claims = self.keys.verify_access(token).map_err(|e| match e {
            TokenError::Expired => AppError::auth("Access token expired"),
            TokenError::Invalid => {
                warn!("invalid access token");
                AppError::auth("Invalid access token")
            }
        })?;

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "access token for unknown user");
                AppError::auth("User not found")
            })?;

        Ok(user.into())
    }
}

/// The authenticated principal. Handlers taking this never run for
/// unauthenticated requests.
#[derive(Debug, Clone)]
pub struct AuthUser(pub PublicUser);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Authenticator: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers);
        let user = Authenticator::from_ref(state)
            .authenticate(token.as_deref())
            .await?;
        Ok(AuthUser(user))
    }
}
