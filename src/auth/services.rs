use std::sync::Arc;

use axum::extract::FromRef;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{PublicUser, SignInRequest, SignInResponse, SignUpRequest, TokenPair},
        jwt::JwtKeys,
        password,
        repo::{StoreError, UserStore},
        repo_types::User,
        validation::{validate_sign_in, validate_sign_up},
    },
    error::AppError,
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_REFRESH: &str = "Invalid refresh token";
const STALE_REFRESH: &str = "Refresh token is expired or used";

/// Sign-up, sign-in, logout and refresh-token rotation.
///
/// Each user has at most one live refresh token, stored on the user record.
/// Sign-in overwrites it, refresh swaps it for a new one only if the presented
/// token still matches, logout clears it.
#[derive(Clone)]
pub struct SessionManager {
    users: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl FromRef<AppState> for SessionManager {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.keys.clone())
    }
}

impl SessionManager {
    pub fn new(users: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    pub async fn sign_up(&self, req: SignUpRequest) -> Result<PublicUser, AppError> {
        let input = validate_sign_up(req)?;

        if let Some(existing) = self.users.find_conflict(&input.username, &input.email).await? {
            let message = if existing.email == input.email {
                "Email already registered"
            } else {
                "Username already taken"
            };
            warn!(username = %input.username, "sign-up conflict: {message}");
            return Err(AppError::conflict(message));
        }

        let hash = password::hash_password_blocking(input.password.clone()).await?;
        let user = match self.users.create(input.into_new_user(hash)).await {
            Ok(u) => u,
            Err(StoreError::Duplicate) => {
                warn!("sign-up lost a uniqueness race");
                return Err(AppError::conflict("Username or email already exists"));
            }
            Err(StoreError::Backend(e)) => return Err(e.into()),
        };

        info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user.into())
    }

    pub async fn sign_in(&self, req: SignInRequest) -> Result<SignInResponse, AppError> {
        let (username, plain) = validate_sign_in(req)?;

        let Some(user) = self.users.find_by_username(&username).await? else {
            password::verify_dummy_blocking(plain).await?;
            warn!(%username, "sign-in for unknown username");
            return Err(AppError::auth(INVALID_CREDENTIALS));
        };

        if !password::verify_password_blocking(plain, user.password_hash.clone()).await? {
            warn!(user_id = %user.id, "sign-in with wrong password");
            return Err(AppError::auth(INVALID_CREDENTIALS));
        }

        let tokens = self.mint(&user)?;
        let now = OffsetDateTime::now_utc();
        if !self
            .users
            .store_refresh_token(user.id, &tokens.refresh_token, now)
            .await?
        {
            // deleted between lookup and write
            return Err(AppError::auth(INVALID_CREDENTIALS));
        }

        info!(user_id = %user.id, "user signed in");
        let mut public = PublicUser::from(user);
        public.last_login = Some(now);
        Ok(SignInResponse {
            user: public,
            tokens,
        })
    }

    /// Clears the stored refresh token. Safe to call with no active session.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        self.users.clear_refresh_token(user_id).await?;
        info!(%user_id, "user logged out");
        Ok(())
    }

    pub async fn refresh(&self, incoming: Option<&str>) -> Result<TokenPair, AppError> {
        let incoming = incoming
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::auth("Unauthorized request"))?;

        let claims = self.keys.verify_refresh(incoming).map_err(|e| {
            warn!(reason = %e, "refresh token rejected");
            AppError::auth(INVALID_REFRESH)
        })?;

        let Some(user) = self.users.find_by_id(claims.sub).await? else {
            warn!(user_id = %claims.sub, "refresh token for unknown user");
            return Err(AppError::auth(INVALID_REFRESH));
        };

        if user.refresh_token.as_deref() != Some(incoming) {
            warn!(user_id = %user.id, "stale or replayed refresh token");
            return Err(AppError::auth(STALE_REFRESH));
        }

        let tokens = self.mint(&user)?;
        let rotated = self
            .users
            .rotate_refresh_token(user.id, incoming, &tokens.refresh_token, OffsetDateTime::now_utc())
            .await?;
        if !rotated {
            warn!(user_id = %user.id, "concurrent refresh already rotated the token");
            return Err(AppError::auth(STALE_REFRESH));
        }

        info!(user_id = %user.id, "refresh token rotated");
        Ok(tokens)
    }

    fn mint(&self, user: &User) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.keys.sign_access(user.id, &user.username, &user.email)?,
            refresh_token: self.keys.sign_refresh(user.id)?,
        })
    }
}
