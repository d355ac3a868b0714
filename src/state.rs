use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::auth::session::SessionManager;
use crate::auth::store::{MemoryUserStore, PgUserStore, UserStore};
use crate::config::AppConfig;
use crate::notify::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub sessions: SessionManager,
    pub notifier: Notifier,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let users: Arc<dyn UserStore> = match &config.database_url {
            Some(url) => {
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                info!("using postgres user store");
                Arc::new(PgUserStore::new(db))
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory user store");
                Arc::new(MemoryUserStore::new())
            }
        };

        Ok(Self {
            users,
            sessions: SessionManager::new(),
            notifier: Notifier::new(),
            config,
        })
    }

    /// State backed entirely by in-process fakes, for tests.
    pub fn in_memory() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            host: "127.0.0.1".into(),
            port: 0,
            cookie_secure: false,
        });
        Self {
            users: Arc::new(MemoryUserStore::new()),
            sessions: SessionManager::new(),
            notifier: Notifier::new(),
            config,
        }
    }
}
