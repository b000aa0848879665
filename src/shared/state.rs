use crate::config::AppConfig;
use crate::notifications::Notifier;
use crate::security::jwt::JwtManager;
use crate::shared::utils::DbPool;
use std::sync::Arc;

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub jwt: Arc<JwtManager>,
    pub notifier: Notifier,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            config: self.config.clone(),
            jwt: Arc::clone(&self.jwt),
            notifier: self.notifier.clone(),
        }
    }
}
