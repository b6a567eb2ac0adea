pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod utils;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::auth::TokenKeys;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub tokens: TokenKeys,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let secret = match config.auth.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => secret.to_string(),
            None => {
                tracing::warn!(
                    "No JWT secret configured, generated a random one; tokens will not survive a restart"
                );
                auth::generate_secret()
            }
        };

        let tokens = TokenKeys::new(
            secret.as_bytes(),
            chrono::Duration::hours(config.auth.token_ttl_hours),
        );
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

        Self {
            config,
            db,
            tokens,
            rate_limiter,
        }
    }
}
