use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::{config::Config, error::ApiError, jwt::SessionKeys, media::MediaStore};

/// Everything a request handler needs, cloned into each route.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub media: Arc<MediaStore>,
    pub sessions: Arc<SessionKeys>,
    pub public_url: Arc<str>,
}

impl AppState {
    pub fn new(pool: Pool<Postgres>, config: &Config) -> Result<Self, ApiError> {
        Ok(Self {
            pool,
            media: Arc::new(MediaStore::new(&config.media_root, &config.media_url)),
            sessions: Arc::new(SessionKeys::new(
                &config.jwt_secret,
                config.session_lifetime_hours,
            )?),
            public_url: Arc::from(config.public_url.as_str()),
        })
    }

    /// Absolute URL for an API path such as `/api/recipes/`.
    pub fn absolute(&self, path: &str) -> String {
        format!("{}{}", self.public_url, path)
    }
}

pub async fn connect(config: &Config) -> Result<Pool<Postgres>, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
}
