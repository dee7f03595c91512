use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::{
    auth::repo::{PgUserRepo, UserRepo},
    config::AppConfig,
    entries::repo::{EntryRepo, PgEntryRepo},
    images::host::{Cloudinary, ImageHost},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub entries: Arc<dyn EntryRepo>,
    pub images: Arc<dyn ImageHost>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            warn!(error = %e, "migration failed; continuing");
        } else {
            info!("migrations applied");
        }

        let images = Arc::new(Cloudinary::new(config.cloudinary.clone())?) as Arc<dyn ImageHost>;

        Ok(Self {
            config: Arc::new(config),
            users: Arc::new(PgUserRepo::new(db.clone())),
            entries: Arc::new(PgEntryRepo::new(db)),
            images,
        })
    }

    /// In-memory stores and a fake image host.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::{
            auth::repo::MemoryUserRepo, entries::repo::MemoryEntryRepo,
            images::services::FakeImageHost,
        };

        Self {
            config: Arc::new(AppConfig::for_tests()),
            users: Arc::new(MemoryUserRepo::default()),
            entries: Arc::new(MemoryEntryRepo::default()),
            images: Arc::new(FakeImageHost),
        }
    }
}
