//! MySQL-backed [`EpisodeStore`].
//!
//! Schema:
//!
//! ```sql
//! keywords(id, keyword, topic, requirements, priority)
//! episodes(id, press, title, link, mp3_path, keyword_id, created_at)
//! ```
//!
//! `episodes.keyword_id` was added after the first deployments; bootstrap
//! looks it up in `information_schema` and only then alters the table.

use super::EpisodeStore;
use crate::error::StoreError;
use crate::models::{Episode, Keyword};
use async_trait::async_trait;
use sqlx::MySqlPool;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use std::fmt;
use std::time::Duration;
use tracing::{info, instrument, warn};

const CREATE_KEYWORDS: &str = r#"
CREATE TABLE IF NOT EXISTS keywords (
    id INT AUTO_INCREMENT PRIMARY KEY,
    keyword VARCHAR(100) NOT NULL,
    topic VARCHAR(100),
    requirements TEXT,
    priority INT NOT NULL DEFAULT 0
)"#;

const CREATE_EPISODES: &str = r#"
CREATE TABLE IF NOT EXISTS episodes (
    id INT AUTO_INCREMENT PRIMARY KEY,
    press VARCHAR(100),
    title VARCHAR(255),
    link TEXT,
    mp3_path VARCHAR(255),
    keyword_id INT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    INDEX idx_keyword (keyword_id),
    INDEX idx_created (created_at)
)"#;

const KEYWORD_ID_EXISTS: &str = r#"
SELECT COUNT(*) FROM information_schema.COLUMNS
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = 'episodes' AND COLUMN_NAME = 'keyword_id'"#;

/// Connection settings, usually from the environment.
#[derive(Clone)]
pub struct DbSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl fmt::Debug for DbSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Build a lazily connecting pool; nothing touches the network until the
    /// first query.
    pub fn connect_lazy(settings: &DbSettings) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .database(&settings.database)
            .charset("utf8mb4");
        let pool = MySqlPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy_with(options);
        Self { pool }
    }
}

#[async_trait]
impl EpisodeStore for MySqlStore {
    #[instrument(level = "info", skip_all)]
    async fn bootstrap(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_KEYWORDS).execute(&self.pool).await?;
        sqlx::query(CREATE_EPISODES).execute(&self.pool).await?;

        let has_keyword_id: i64 = sqlx::query_scalar(KEYWORD_ID_EXISTS)
            .fetch_one(&self.pool)
            .await?;
        if has_keyword_id == 0 {
            sqlx::query("ALTER TABLE episodes ADD COLUMN keyword_id INT")
                .execute(&self.pool)
                .await?;
            sqlx::query("ALTER TABLE episodes ADD INDEX idx_keyword (keyword_id)")
                .execute(&self.pool)
                .await?;
            info!("Added keyword_id column to episodes");
        }
        info!("Schema bootstrap complete");
        Ok(())
    }

    async fn is_duplicate(&self, link: &str) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM episodes WHERE link = ?")
            .bind(link)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    #[instrument(level = "info", skip_all, fields(title = %episode.title))]
    async fn insert_episode(&self, episode: &Episode, stored_path: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO episodes (press, title, link, mp3_path, keyword_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&episode.press)
        .bind(&episode.title)
        .bind(&episode.link)
        .bind(stored_path)
        .bind(episode.keyword_id)
        .execute(&self.pool)
        .await?;
        info!(id = result.last_insert_id(), "Episode recorded");
        Ok(result.last_insert_id())
    }

    async fn active_keywords(&self) -> Result<Vec<Keyword>, StoreError> {
        let keywords = sqlx::query_as::<_, Keyword>(
            "SELECT id, keyword, topic, requirements, priority FROM keywords \
             WHERE priority > 0 ORDER BY priority DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| warn!(error = %e, "Keyword query failed"))?;
        Ok(keywords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_debug_hides_password() {
        let settings = DbSettings {
            host: "db".into(),
            port: 3306,
            user: "news".into(),
            password: "hunter2".into(),
            database: "news_db".into(),
        };
        let shown = format!("{settings:?}");
        assert!(shown.contains("news_db"));
        assert!(!shown.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_lazy_pool_does_not_connect() {
        let store = MySqlStore::connect_lazy(&DbSettings {
            host: "127.0.0.1".into(),
            port: 1,
            user: "u".into(),
            password: "p".into(),
            database: "d".into(),
        });
        assert_eq!(store.pool.size(), 0);
    }
}
