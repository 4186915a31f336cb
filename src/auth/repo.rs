use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, age, \
                            refresh_token, last_login, created_at";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("username or email already exists")]
    Duplicate,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence of user records. Every write touches a single row atomically.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    /// Case-insensitive username lookup.
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;

    /// First user whose username (case-insensitive) or email collides.
    async fn find_conflict(&self, username: &str, email: &str) -> anyhow::Result<Option<User>>;

    async fn create(&self, new: NewUser) -> Result<User, StoreError>;

    /// Overwrites the stored refresh token and stamps `last_login`.
    /// Returns `false` if the user does not exist.
    async fn store_refresh_token(
        &self,
        id: Uuid,
        token: &str,
        at: OffsetDateTime,
    ) -> anyhow::Result<bool>;

    /// Replaces the refresh token only if the stored value still equals
    /// `current`. Returns `false` when the swap did not happen.
    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        current: &str,
        next: &str,
        at: OffsetDateTime,
    ) -> anyhow::Result<bool>;

    async fn clear_refresh_token(&self, id: Uuid) -> anyhow::Result<()>;

    async fn close(&self) {}
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;
        info!("postgres user store ready");
        Ok(Self::from_pool(db))
    }

    /// Wraps an already migrated pool.
    pub fn from_pool(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(username) = lower($1)"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    async fn find_conflict(&self, username: &str, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE lower(username) = lower($1) OR email = $2
            ORDER BY (email = $2) DESC
            LIMIT 1
            "#
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find conflicting user")?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let result = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, first_name, last_name, age)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(new.age)
        .fetch_one(&self.db)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::Duplicate)
            }
            Err(e) => Err(StoreError::Backend(anyhow::Error::new(e).context("insert user"))),
        }
    }

    async fn store_refresh_token(
        &self,
        id: Uuid,
        token: &str,
        at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let done = sqlx::query("UPDATE users SET refresh_token = $2, last_login = $3 WHERE id = $1")
            .bind(id)
            .bind(token)
            .bind(at)
            .execute(&self.db)
            .await
            .context("store refresh token")?;
        Ok(done.rows_affected() == 1)
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        current: &str,
        next: &str,
        at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let done = sqlx::query(
            r#"
            UPDATE users
               SET refresh_token = $3, last_login = $4
             WHERE id = $1 AND refresh_token = $2
            "#,
        )
        .bind(id)
        .bind(current)
        .bind(next)
        .bind(at)
        .execute(&self.db)
        .await
        .context("rotate refresh token")?;
        Ok(done.rows_affected() == 1)
    }

    async fn clear_refresh_token(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET refresh_token = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("clear refresh token")?;
        Ok(())
    }

    async fn close(&self) {
        self.db.close().await;
        info!("postgres pool closed");
    }
}

// Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "$argon2id$stub".into(),
            first_name: None,
            last_name: None,
            age: None,
        }
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn rotation_swaps_only_from_the_current_token(pool: PgPool) {
        let store = PgUserStore::from_pool(pool);
        let user = store.create(new_user("alice", "alice@example.com")).await.unwrap();
        let now = OffsetDateTime::now_utc();

        assert!(store.store_refresh_token(user.id, "r0", now).await.unwrap());
        assert!(store.rotate_refresh_token(user.id, "r0", "r1", now).await.unwrap());
        // r0 is spent
        assert!(!store.rotate_refresh_token(user.id, "r0", "r2", now).await.unwrap());

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("r1"));
        assert!(stored.last_login.is_some());

        store.clear_refresh_token(user.id).await.unwrap();
        assert!(!store.rotate_refresh_token(user.id, "r1", "r3", now).await.unwrap());
        assert!(!store.rotate_refresh_token(Uuid::new_v4(), "r1", "r3", now).await.unwrap());
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn unique_indexes_map_to_duplicate(pool: PgPool) {
        let store = PgUserStore::from_pool(pool);
        store.create(new_user("alice", "alice@example.com")).await.unwrap();

        let same_name = store.create(new_user("ALICE", "other@example.com")).await;
        assert!(matches!(same_name, Err(StoreError::Duplicate)));

        let same_email = store.create(new_user("bob", "alice@example.com")).await;
        assert!(matches!(same_email, Err(StoreError::Duplicate)));

        let found = store.find_by_username("Alice").await.unwrap().unwrap();
        assert_eq!(found.username, "alice");
        let conflict = store.find_conflict("ALICE", "alice@example.com").await.unwrap();
        assert_eq!(conflict.map(|u| u.email).as_deref(), Some("alice@example.com"));
    }
}
