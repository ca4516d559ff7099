//! Persisted login token
//!
//! Short-circuits login on restart: read once at startup, written on login,
//! cleared on logout. A missing or unreadable file just means "not logged
//! in".

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    login_user: String,
}

pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The remembered username, if any.
    pub async fn load(&self) -> Option<String> {
        let json = fs::read_to_string(&self.path).await.ok()?;
        match serde_json::from_str::<TokenFile>(&json) {
            Ok(token) if !token.login_user.trim().is_empty() => Some(token.login_user),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("[TokenCache] Ignoring unreadable token file: {}", e);
                None
            }
        }
    }

    pub async fn save(&self, username: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create token directory")?;
        }
        let json = serde_json::to_string_pretty(&TokenFile {
            login_user: username.to_string(),
        })
        .context("Failed to serialize token")?;
        fs::write(&self.path, json)
            .await
            .context("Failed to write token file")?;
        tracing::debug!("[TokenCache] Stored token for '{}'", username);
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .await
                .context("Failed to remove token file")?;
            tracing::debug!("[TokenCache] Token cleared");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn save_load_clear_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = TokenCache::new(dir.path().join("session.json"));

        assert!(cache.load().await.is_none());

        cache.save("ravi").await.unwrap();
        assert_eq!(cache.load().await.as_deref(), Some("ravi"));

        cache.clear().await.unwrap();
        assert!(cache.load().await.is_none());
    }

    #[tokio::test]
    async fn garbage_file_reads_as_logged_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        let cache = TokenCache::new(path);
        assert!(cache.load().await.is_none());
    }
}
