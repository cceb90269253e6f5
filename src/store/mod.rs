//! Keyword and episode persistence.
//!
//! The [`EpisodeStore`] trait is the seam between the dispatcher and the
//! database; [`mysql::MySqlStore`] is the production implementation.

pub mod mysql;

use crate::error::StoreError;
use crate::models::{Episode, Keyword};
use async_trait::async_trait;

/// Persistent state the pipeline reads and writes.
#[async_trait]
pub trait EpisodeStore: Send + Sync {
    /// Create missing tables and columns. Safe to run on every trigger.
    async fn bootstrap(&self) -> Result<(), StoreError>;

    /// Whether an episode with this link was already published.
    async fn is_duplicate(&self, link: &str) -> Result<bool, StoreError>;

    /// Record a published episode; returns the new row id.
    async fn insert_episode(&self, episode: &Episode, stored_path: &str) -> Result<u64, StoreError>;

    /// Keywords with positive priority, highest first, ties in table order.
    async fn active_keywords(&self) -> Result<Vec<Keyword>, StoreError>;
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory store for dispatcher tests.

    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub struct EpisodeRow {
        pub press: String,
        pub title: String,
        pub link: String,
        pub mp3_path: Option<String>,
        pub keyword_id: Option<i32>,
    }

    #[derive(Default)]
    pub struct MemoryStore {
        pub keywords: Mutex<Vec<Keyword>>,
        pub episodes: Mutex<Vec<EpisodeRow>>,
        pub bootstraps: Mutex<u32>,
        pub fail_inserts: bool,
        pub fail_lookups: bool,
        pub fail_keywords: bool,
    }

    impl MemoryStore {
        pub fn with_keywords(keywords: Vec<Keyword>) -> Self {
            Self {
                keywords: Mutex::new(keywords),
                ..Self::default()
            }
        }

        pub fn rows(&self) -> Vec<EpisodeRow> {
            self.episodes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EpisodeStore for MemoryStore {
        async fn bootstrap(&self) -> Result<(), StoreError> {
            *self.bootstraps.lock().unwrap() += 1;
            Ok(())
        }

        async fn is_duplicate(&self, link: &str) -> Result<bool, StoreError> {
            if self.fail_lookups {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(self.episodes.lock().unwrap().iter().any(|e| e.link == link))
        }

        async fn insert_episode(&self, episode: &Episode, stored_path: &str) -> Result<u64, StoreError> {
            if self.fail_inserts {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            let mut rows = self.episodes.lock().unwrap();
            rows.push(EpisodeRow {
                press: episode.press.clone(),
                title: episode.title.clone(),
                link: episode.link.clone(),
                mp3_path: Some(stored_path.to_string()),
                keyword_id: episode.keyword_id,
            });
            Ok(rows.len() as u64)
        }

        async fn active_keywords(&self) -> Result<Vec<Keyword>, StoreError> {
            if self.fail_keywords {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            let mut active: Vec<Keyword> = self
                .keywords
                .lock()
                .unwrap()
                .iter()
                .filter(|k| k.priority > 0)
                .cloned()
                .collect();
            active.sort_by(|a, b| b.priority.cmp(&a.priority));
            Ok(active)
        }
    }
}
