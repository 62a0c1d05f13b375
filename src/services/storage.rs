use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncRead;

pub struct SaveResult {
    pub size: i64,
}

/// Media blob store. Rows in the database hold only the storage key;
/// the bytes live behind this trait.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn save_stream<'a>(
        &self,
        key: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<SaveResult>;
    async fn get_file(&self, key: &str) -> Result<Vec<u8>>;
    async fn delete_file(&self, key: &str) -> Result<()>;
    async fn file_exists(&self, key: &str) -> Result<bool>;
}

/// Filesystem-backed storage rooted at a single media directory.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Resolve a storage key below the media root. Keys are relative
    /// date-sharded paths; anything that could escape the root is rejected.
    fn key_to_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key.starts_with('/')
            || key.contains('\\')
            || key.split('/').any(|part| part == "..")
        {
            return Err(anyhow!("invalid storage key: {}", key));
        }
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn save_stream<'a>(
        &self,
        key: &str,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<SaveResult> {
        let path = self.key_to_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&path).await?;
        let size = tokio::io::copy(&mut reader, &mut file).await?;
        file.sync_all().await?;

        tracing::debug!("💾 Stored {} ({} bytes)", key, size);

        Ok(SaveResult { size: size as i64 })
    }

    async fn get_file(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.key_to_path(key)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(anyhow!("file not found: {}", key));
        }
        Ok(fs::read(&path).await?)
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        let path = self.key_to_path(key)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }
        fs::remove_file(&path).await?;
        Ok(())
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_save_and_read_back() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let data = b"jpeg bytes".to_vec();
        let reader = Box::new(std::io::Cursor::new(data.clone()));
        let result = storage
            .save_stream("return_media/2026/01/15/test.jpg", reader)
            .await
            .unwrap();

        assert_eq!(result.size, data.len() as i64);
        let read_back = storage
            .get_file("return_media/2026/01/15/test.jpg")
            .await
            .unwrap();
        assert_eq!(read_back, data);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        assert!(storage.get_file("../../../etc/passwd").await.is_err());
        assert!(storage.get_file("/etc/passwd").await.is_err());
        assert!(
            storage
                .get_file("return_media/../../secret.txt")
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let reader = Box::new(std::io::Cursor::new(b"x".to_vec()));
        storage.save_stream("a/b.png", reader).await.unwrap();

        assert!(storage.file_exists("a/b.png").await.unwrap());
        storage.delete_file("a/b.png").await.unwrap();
        assert!(!storage.file_exists("a/b.png").await.unwrap());
        storage.delete_file("a/b.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_stream_has_zero_size() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let reader = Box::new(std::io::Cursor::new(Vec::new()));
        let result = storage.save_stream("empty.bin", reader).await.unwrap();
        assert_eq!(result.size, 0);
    }
}
