use crate::auth::{
    jwt::JwtKeys,
    memory::MemoryUserStore,
    repo::{PgUserStore, UserStore},
};
use crate::config::AppConfig;
use axum::extract::FromRef;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub keys: JwtKeys,
    pub config: Arc<AppConfig>,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl AppState {
    /// Opens the credential store and loads signing keys.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let users: Arc<dyn UserStore> = match &config.database_url {
            Some(url) => Arc::new(PgUserStore::connect(url).await?),
            None => {
                warn!("DATABASE_URL not set; users are kept in memory and lost on restart");
                Arc::new(MemoryUserStore::new())
            }
        };
        Ok(Self::from_parts(users, Arc::new(config)))
    }

    pub fn from_parts(users: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        let keys = JwtKeys::new(&config.jwt);
        Self {
            users,
            keys,
            config,
        }
    }

    /// Closes the credential store.
    pub async fn teardown(&self) {
        self.users.close().await;
        info!("state torn down");
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: crate::auth::jwt::tests::test_config(),
            cors_origin: None,
            bind_addr: ([127, 0, 0, 1], 0).into(),
        });
        Self::from_parts(Arc::new(MemoryUserStore::new()), config)
    }
}
