use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the credential store. Never serialized; see `PublicUser`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,                         // lower-cased
    pub password_hash: String,                 // argon2 PHC string
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub refresh_token: Option<String>,         // set only while a session is active
    pub last_login: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Normalized input for `UserStore::create`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
}
