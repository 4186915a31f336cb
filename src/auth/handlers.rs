use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use serde_json::json;
use tracing::instrument;

use crate::{
    auth::{
        cookies::{self, REFRESH_COOKIE},
        dto::{PublicUser, RefreshRequest, SignInRequest, SignUpRequest},
        extractors::AuthUser,
        jwt::JwtKeys,
        services::SessionManager,
    },
    error::AppError,
    response::ApiResponse,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/logout", post(logout))
        .route("/auth/refresh-token", post(refresh_token))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/users/me", get(get_me))
}

#[instrument(skip(sessions, payload))]
pub async fn sign_up(
    State(sessions): State<SessionManager>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let user = sessions.sign_up(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            StatusCode::CREATED,
            "User created successfully",
            user,
        )),
    ))
}

#[instrument(skip(sessions, keys, jar, payload))]
pub async fn sign_in(
    State(sessions): State<SessionManager>,
    State(keys): State<JwtKeys>,
    jar: CookieJar,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let session = sessions.sign_in(payload).await?;
    let jar = cookies::with_tokens(jar, &session.tokens, &keys);
    Ok((
        jar,
        Json(ApiResponse::new(
            StatusCode::OK,
            "User logged in successfully",
            session,
        )),
    ))
}

#[instrument(skip(sessions, jar, user), fields(user_id = %user.id))]
pub async fn logout(
    State(sessions): State<SessionManager>,
    AuthUser(user): AuthUser,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    sessions.logout(user.id).await?;
    Ok((
        cookies::cleared(jar),
        Json(ApiResponse::new(
            StatusCode::OK,
            "User logged out successfully",
            json!({}),
        )),
    ))
}

#[instrument(skip(sessions, keys, jar, payload))]
pub async fn refresh_token(
    State(sessions): State<SessionManager>,
    State(keys): State<JwtKeys>,
    jar: CookieJar,
    payload: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let incoming = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| payload.and_then(|Json(body)| body.refresh_token));

    let tokens = sessions.refresh(incoming.as_deref()).await?;
    let jar = cookies::with_tokens(jar, &tokens, &keys);
    Ok((
        jar,
        Json(ApiResponse::new(
            StatusCode::OK,
            "Access token refreshed successfully",
            tokens,
        )),
    ))
}

#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<ApiResponse<PublicUser>> {
    Json(ApiResponse::new(StatusCode::OK, "Current user", user))
}
