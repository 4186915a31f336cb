use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::User;

/// Request body for sign-up. Required fields are optional here so that a
/// missing field is reported as a validation error, not a JSON rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
}

/// Request body for sign-in.
#[derive(Debug, Default, Deserialize)]
pub struct SignInRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Request body for token refresh, used when the cookie is absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Returned by sign-in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub user: PublicUser,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// User without `password_hash` and `refresh_token`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            age: u.age,
            last_login: u.last_login,
            created_at: u.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            first_name: Some("Alice".into()),
            last_name: None,
            age: None,
            refresh_token: Some("refresh-secret-value".into()),
            last_login: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn public_user_drops_sensitive_fields() {
        let json = serde_json::to_value(PublicUser::from(stored_user())).unwrap();
        let text = json.to_string();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["firstName"], "Alice");
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password").is_none());
        assert!(json.get("refreshToken").is_none());
        assert!(!text.contains("argon2"));
        assert!(!text.contains("refresh-secret-value"));
    }

    #[test]
    fn sign_in_response_flattens_tokens() {
        let body = SignInResponse {
            user: PublicUser::from(stored_user()),
            tokens: TokenPair {
                access_token: "a".into(),
                refresh_token: "r".into(),
            },
        };
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
        assert!(json["user"].get("refreshToken").is_none());
    }

    #[test]
    fn sign_up_request_accepts_camel_case() {
        let req: SignUpRequest = serde_json::from_str(
            r#"{"username":"alice","email":"a@b.co","password":"secret1","firstName":"Al"}"#,
        )
        .unwrap();
        assert_eq!(req.first_name.as_deref(), Some("Al"));
        assert!(req.last_name.is_none());
    }
}
