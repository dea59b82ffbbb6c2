use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
    /// Either the whole content lands at `path` or nothing does.
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;
}

pub struct NativeStorage;

impl NativeStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for NativeStorage {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path))
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let target = Path::new(path);
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let partial = format!("{}.part", path);
        if let Err(e) = tokio::fs::write(&partial, content).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e).with_context(|| format!("Failed to write {}", path));
        }
        if let Err(e) = tokio::fs::rename(&partial, target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e).with_context(|| format!("Failed to move {} into place", path));
        }
        Ok(())
    }
}
