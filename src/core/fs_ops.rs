// src/core/fs_ops.rs
//! File system helpers for the database directory and run staging files

use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

use crate::app_log;

pub struct FsOps;

impl FsOps {
    pub async fn ensure_dir_exists(path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() || path.exists() {
            return Ok(());
        }
        fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
        app_log!(info, "Created directory: {}", path.display());
        Ok(())
    }

    /// Write `content`, creating parent directories first
    pub async fn write_file_safe(path: &Path, content: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            Self::ensure_dir_exists(parent).await?;
        }

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write file: {}", path.display()))?;

        app_log!(debug, "Written file: {}", path.display());
        Ok(())
    }

    /// Returns whether a file was actually removed
    pub async fn remove_file_if_exists(path: &Path) -> Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => {
                app_log!(debug, "Removed file: {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove file: {}", path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_remove() {
        let dir = std::env::temp_dir().join(format!("jobharvest-fs-{}", uuid::Uuid::new_v4()));
        let file = dir.join("nested").join("run.csv");

        FsOps::write_file_safe(&file, b"a,b\n").await.unwrap();
        assert!(file.exists());

        assert!(FsOps::remove_file_if_exists(&file).await.unwrap());
        assert!(!FsOps::remove_file_if_exists(&file).await.unwrap());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
