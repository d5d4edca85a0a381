//! 持久化快照
//!
//! 每次构建开始时读取一次、结束时写入一次。读写失败都不会中断构建。

use crate::model::ServiceEntry;
use infrastructure_common::{SnapshotError, SnapshotResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 快照文件名
pub const CACHE_FILE_NAME: &str = "ProviderClasses.txt";

/// 快照存储
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// 在临时目录下创建快照存储
    pub fn in_dir<P: AsRef<Path>>(temp_dir: P) -> Self {
        Self {
            path: temp_dir.as_ref().join(CACHE_FILE_NAME),
        }
    }

    /// 快照文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取快照，失败时视为冷缓存
    pub async fn load(&self) -> Vec<ServiceEntry> {
        match self.try_load().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("读取快照失败，使用空注册表: {}", e);
                Vec::new()
            }
        }
    }

    /// 读取快照，文件不存在时返回空
    pub async fn try_load(&self) -> SnapshotResult<Vec<ServiceEntry>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("快照文件不存在: {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        // 历史版本可能写入 `null`
        let entries: Option<Vec<ServiceEntry>> = serde_json::from_slice(&content)?;
        let entries = entries.unwrap_or_default();
        debug!("读取快照 {} 条记录", entries.len());
        Ok(entries)
    }

    /// 写入快照，失败时仅记录警告
    pub async fn store(&self, entries: &[ServiceEntry]) {
        if let Err(e) = self.try_store(entries).await {
            warn!("写入快照失败: {}", e);
        }
    }

    /// 写入快照
    pub async fn try_store(&self, entries: &[ServiceEntry]) -> SnapshotResult<()> {
        let content = serde_json::to_vec(entries)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SnapshotError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|source| SnapshotError::Io {
                path: self.path.clone(),
                source,
            })?;
        debug!("写入快照 {} 条记录: {}", entries.len(), self.path.display());
        Ok(())
    }

    /// 删除快照文件
    pub async fn delete(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("删除快照文件: {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("删除快照文件失败: {}, 原因: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(key: &str, single: bool, values: &[&str]) -> ServiceEntry {
        let mut entry = ServiceEntry::new(key);
        entry.single_policy = single;
        for value in values {
            entry.add_implementation(*value);
        }
        entry
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::in_dir(dir.path());
        let entries = vec![
            entry("com.example.IBar", false, &["com.example.FooFactory"]),
            entry("com.example.ISingle", true, &["com.example.B", "com.example.A"]),
        ];

        store.try_store(&entries).await.unwrap();
        assert!(store.path().ends_with(CACHE_FILE_NAME));
        assert_eq!(store.try_load().await.unwrap(), entries);
    }

    #[tokio::test]
    async fn test_missing_file_is_cold_cache() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::in_dir(dir.path());
        assert!(store.try_load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_falls_back_to_empty() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::in_dir(dir.path());
        tokio::fs::write(store.path(), b"{not json").await.unwrap();

        assert!(matches!(
            store.try_load().await,
            Err(SnapshotError::Serialization { .. })
        ));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_null_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::in_dir(dir.path());
        tokio::fs::write(store.path(), b"null").await.unwrap();
        assert!(store.try_load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_format() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::in_dir(dir.path());
        tokio::fs::write(
            store.path(),
            br#"[{"key":"com.example.IBar","isSingle":false,"values":["com.example.FooFactory"]}]"#,
        )
        .await
        .unwrap();

        let entries = store.load().await;
        assert_eq!(entries, vec![entry("com.example.IBar", false, &["com.example.FooFactory"])]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::in_dir(dir.path());
        store.store(&[entry("IBar", false, &["Foo"])]).await;
        assert!(store.path().exists());

        store.delete().await;
        assert!(!store.path().exists());
        store.delete().await;
    }

    #[tokio::test]
    async fn test_store_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        // 以普通文件占据目录位置，使写入失败
        let blocker = dir.path().join("blocked");
        tokio::fs::write(&blocker, b"").await.unwrap();
        let store = SnapshotStore::in_dir(&blocker);

        assert!(store.try_store(&[entry("IBar", false, &["Foo"])]).await.is_err());
        store.store(&[entry("IBar", false, &["Foo"])]).await;
    }
}
