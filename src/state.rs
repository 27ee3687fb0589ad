use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::{
    jwt::JwtKeys,
    repo::{JsonFileStore, UserStore},
    services::AuthService,
};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = JsonFileStore::new(&config.users_file);
        // Creates the file when missing and fails fast on a corrupt one.
        let existing = store.load().await?;
        tracing::info!(path = %store.path().display(), users = existing.len(), "user store ready");

        Ok(Self::from_parts(config, Arc::new(store)))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn UserStore>) -> Self {
        let keys = JwtKeys::new(&config.jwt);
        Self {
            auth: Arc::new(AuthService::new(store, keys)),
            config,
        }
    }

    #[cfg(test)]
    pub fn fake(frontend_url: Option<&str>) -> Self {
        use crate::auth::repo::memory::MemoryStore;

        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            users_file: "unused.json".into(),
            frontend_url: frontend_url.map(str::to_string),
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                ttl_minutes: 60,
            },
        });
        Self::from_parts(config, Arc::new(MemoryStore::default()))
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}
