//! 类目录来源与输出
//!
//! 来源遍历编译输出目录；给定变更表时按表标记状态，其余文件视为未变更。
//! 目录中的归档作为资源整体复制，其中的类条目继承归档的状态参与扫描。
//! 输出端把单元镜像到另一个目录，归档内的单元通过改写已复制的归档写入。

use crate::archive;
use async_trait::async_trait;
use infrastructure_common::{TransformError, TransformResult};
use registry_abstractions::{CompiledUnit, UnitLocation, UnitSink, UnitSource, UnitStatus};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// 类目录来源
#[derive(Debug, Clone)]
pub struct DirectoryUnitSource {
    root: PathBuf,
    changes: Option<HashMap<String, UnitStatus>>,
}

impl DirectoryUnitSource {
    /// 全量模式：每个单元都标记为新增
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            changes: None,
        }
    }

    /// 变更表模式：键为相对路径
    pub fn with_changes<I, P>(root: impl Into<PathBuf>, changes: I) -> Self
    where
        I: IntoIterator<Item = (P, UnitStatus)>,
        P: Into<String>,
    {
        let changes = changes
            .into_iter()
            .map(|(path, status)| (UnitLocation::loose(path).path, status))
            .collect();
        Self {
            root: root.into(),
            changes: Some(changes),
        }
    }

    /// 根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 是否为增量来源
    pub fn is_incremental(&self) -> bool {
        self.changes.is_some()
    }

    /// 列出根目录下所有文件的相对路径，按名称排序
    fn walk(&self) -> TransformResult<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.root).to_path_buf();
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("目录遍历失败"));
                TransformError::io(path, source)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative.to_string_lossy().to_string();
            files.push((UnitLocation::loose(relative).path, entry.into_path()));
        }
        Ok(files)
    }

    fn status_of(&self, relative: &str) -> UnitStatus {
        match &self.changes {
            None => UnitStatus::Added,
            Some(changes) => changes
                .get(relative)
                .copied()
                .unwrap_or(UnitStatus::Unchanged),
        }
    }
}

#[async_trait]
impl UnitSource for DirectoryUnitSource {
    fn name(&self) -> &str {
        "DirectoryUnitSource"
    }

    async fn units(&self) -> Result<Vec<CompiledUnit>, TransformError> {
        let mut units = Vec::new();
        for (relative, path) in self.walk()? {
            let location = UnitLocation::loose(relative.as_str());
            let in_archive = archive::is_archive(&relative);
            if !location.is_unit() && !in_archive {
                continue;
            }
            let status = match self.status_of(&relative) {
                UnitStatus::Removed => {
                    warn!("变更表标记为删除但文件仍存在，按变更处理: {}", relative);
                    UnitStatus::Changed
                }
                status => status,
            };
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| TransformError::io(&path, e))?;
            if in_archive {
                units.extend(archived_units(&relative, &path, &bytes, status)?);
            } else {
                units.push(CompiledUnit::new(location, status, bytes));
            }
        }

        if let Some(changes) = &self.changes {
            let mut removed: Vec<&String> = changes
                .iter()
                .filter(|(_, status)| **status == UnitStatus::Removed)
                .map(|(path, _)| path)
                .filter(|path| !self.root.join(path.as_str()).exists())
                .collect();
            removed.sort();
            for path in removed {
                let location = UnitLocation::loose(path.as_str());
                if location.is_unit() {
                    units.push(CompiledUnit::removed(location));
                } else if archive::is_archive(path) {
                    warn!("归档已删除，其中的注册需要全量构建才能清除: {}", path);
                }
            }

            for (path, status) in changes {
                if matches!(status, UnitStatus::Added | UnitStatus::Changed)
                    && !self.root.join(path.as_str()).exists()
                {
                    warn!("变更表中的文件不存在，忽略: {}", path);
                }
            }
        }

        debug!("从 {} 枚举到 {} 个编译单元", self.root.display(), units.len());
        Ok(units)
    }

    async fn resources(&self) -> Result<Vec<(UnitLocation, Vec<u8>)>, TransformError> {
        let mut resources = Vec::new();
        for (relative, path) in self.walk()? {
            let location = UnitLocation::loose(relative);
            if location.is_unit() {
                continue;
            }
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| TransformError::io(&path, e))?;
            resources.push((location, bytes));
        }
        Ok(resources)
    }
}

/// 读取归档中的类条目，条目继承归档的状态
fn archived_units(
    relative: &str,
    path: &Path,
    bytes: &[u8],
    status: UnitStatus,
) -> TransformResult<Vec<CompiledUnit>> {
    let entries = archive::read_entries(bytes, |name| UnitLocation::loose(name).is_unit())
        .map_err(|e| {
            TransformError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
    debug!("归档 {} 中有 {} 个类条目", relative, entries.len());
    Ok(entries
        .into_iter()
        .map(|(entry, content)| {
            CompiledUnit::new(UnitLocation::archived(relative, entry), status, content)
        })
        .collect())
}

fn output_error(
    location: &UnitLocation,
    source: impl std::error::Error + Send + Sync + 'static,
) -> TransformError {
    TransformError::Output {
        location: location.to_string(),
        source: Box::new(source),
    }
}

/// 类目录输出端
#[derive(Debug, Clone)]
pub struct DirectoryUnitSink {
    root: PathBuf,
}

impl DirectoryUnitSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 改写输出目录中已复制的归档，只替换或删除给定条目
    ///
    /// 归档需先作为资源复制到输出目录
    async fn rewrite_archive(
        &self,
        archive_path: &Path,
        location: &UnitLocation,
        replacement: Option<&[u8]>,
    ) -> TransformResult<()> {
        let target = self.root.join(archive_path);
        let bytes = match tokio::fs::read(&target).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && replacement.is_none() => {
                return Ok(());
            }
            Err(e) => return Err(output_error(location, e)),
        };
        let rewritten = archive::replace_entry(&bytes, &location.path, replacement)
            .map_err(|e| output_error(location, e))?;
        tokio::fs::write(&target, rewritten)
            .await
            .map_err(|e| output_error(location, e))?;
        debug!("已改写归档条目: {}", location);
        Ok(())
    }
}

#[async_trait]
impl UnitSink for DirectoryUnitSink {
    async fn write_unit(
        &mut self,
        location: &UnitLocation,
        bytes: &[u8],
    ) -> Result<(), TransformError> {
        if let Some(archive_path) = &location.archive {
            return self.rewrite_archive(archive_path, location, Some(bytes)).await;
        }
        let target = self.root.join(&location.path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransformError::io(parent, e))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| output_error(location, e))
    }

    async fn remove_unit(&mut self, location: &UnitLocation) -> Result<(), TransformError> {
        if let Some(archive_path) = &location.archive {
            return self.rewrite_archive(archive_path, location, None).await;
        }
        let target = self.root.join(&location.path);
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TransformError::io(target, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write(root: &Path, relative: &str, bytes: &[u8]) {
        let path = root.join(relative);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(path, bytes).await.unwrap();
    }

    #[tokio::test]
    async fn test_full_mode_marks_units_added() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "com/example/B.class", b"b").await;
        write(dir.path(), "com/example/A.class", b"a").await;
        write(dir.path(), "META-INF/services.txt", b"text").await;

        let source = DirectoryUnitSource::new(dir.path());
        let units = source.units().await.unwrap();

        let paths: Vec<&str> = units.iter().map(|u| u.location.path.as_str()).collect();
        assert_eq!(paths, vec!["com/example/A.class", "com/example/B.class"]);
        assert!(units.iter().all(|u| u.status == UnitStatus::Added));

        let resources = source.resources().await.unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].0.path, "META-INF/services.txt");
        assert_eq!(resources[0].1, b"text");
    }

    #[tokio::test]
    async fn test_change_map_mode() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a/Changed.class", b"c").await;
        write(dir.path(), "a/Same.class", b"s").await;

        let source = DirectoryUnitSource::with_changes(
            dir.path(),
            [
                ("a/Changed.class", UnitStatus::Changed),
                ("a/Gone.class", UnitStatus::Removed),
                ("a/Missing.class", UnitStatus::Added),
            ],
        );
        assert!(source.is_incremental());

        let units = source.units().await.unwrap();
        let summary: Vec<(&str, UnitStatus)> = units
            .iter()
            .map(|u| (u.location.path.as_str(), u.status))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("a/Changed.class", UnitStatus::Changed),
                ("a/Same.class", UnitStatus::Unchanged),
                ("a/Gone.class", UnitStatus::Removed),
            ]
        );
        assert!(units[2].bytes.is_none());
    }

    #[tokio::test]
    async fn test_sink_writes_and_removes() {
        let dir = TempDir::new().unwrap();
        let mut sink = DirectoryUnitSink::new(dir.path());
        let location = UnitLocation::loose("a/b/C.class");

        sink.write_unit(&location, b"bytes").await.unwrap();
        assert_eq!(
            tokio::fs::read(dir.path().join("a/b/C.class")).await.unwrap(),
            b"bytes"
        );

        sink.remove_unit(&location).await.unwrap();
        assert!(!dir.path().join("a/b/C.class").exists());
        sink.remove_unit(&location).await.unwrap();
    }

    #[tokio::test]
    async fn test_archive_entries_inherit_status() {
        let dir = TempDir::new().unwrap();
        let jar = archive::build_archive(&[
            ("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n"),
            ("lib/Registry.class", "r"),
            ("lib/Impl.class", "i"),
        ]);
        write(dir.path(), "libs/core.jar", &jar).await;
        write(dir.path(), "libs/other.jar", &archive::build_archive(&[("o/O.class", "o")])).await;

        let source = DirectoryUnitSource::with_changes(
            dir.path(),
            [("libs/core.jar", UnitStatus::Changed)],
        );
        let units = source.units().await.unwrap();
        let summary: Vec<(String, UnitStatus)> = units
            .iter()
            .map(|u| (u.location.to_string(), u.status))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("libs/core.jar!/lib/Registry.class".to_string(), UnitStatus::Changed),
                ("libs/core.jar!/lib/Impl.class".to_string(), UnitStatus::Changed),
                ("libs/other.jar!/o/O.class".to_string(), UnitStatus::Unchanged),
            ]
        );
        assert_eq!(units[1].bytes.as_deref(), Some(&b"i"[..]));
        assert_eq!(
            units[0].location.qualified_name_hint().as_deref(),
            Some("lib.Registry")
        );

        // 归档本身仍作为资源整体复制
        let resources = source.resources().await.unwrap();
        let paths: Vec<&str> = resources.iter().map(|(l, _)| l.path.as_str()).collect();
        assert_eq!(paths, vec!["libs/core.jar", "libs/other.jar"]);
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_io_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "libs/broken.jar", b"not a zip").await;

        let result = DirectoryUnitSource::new(dir.path()).units().await;
        assert!(matches!(result, Err(TransformError::Io { .. })));
    }

    #[tokio::test]
    async fn test_sink_rewrites_only_the_archived_entry() {
        let dir = TempDir::new().unwrap();
        let jar = archive::build_archive(&[
            ("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n"),
            ("lib/Registry.class", "old"),
            ("lib/Impl.class", "i"),
        ]);
        let mut sink = DirectoryUnitSink::new(dir.path());
        sink.write_unit(&UnitLocation::loose("libs/core.jar"), &jar)
            .await
            .unwrap();

        let location = UnitLocation::archived("libs/core.jar", "lib/Registry.class");
        sink.write_unit(&location, b"patched").await.unwrap();

        let bytes = tokio::fs::read(dir.path().join("libs/core.jar")).await.unwrap();
        let entries = archive::read_entries(&bytes, |_| true).unwrap();
        assert_eq!(
            entries,
            vec![
                ("META-INF/MANIFEST.MF".to_string(), b"Manifest-Version: 1.0\n".to_vec()),
                ("lib/Registry.class".to_string(), b"patched".to_vec()),
                ("lib/Impl.class".to_string(), b"i".to_vec()),
            ]
        );

        sink.remove_unit(&UnitLocation::archived("libs/core.jar", "lib/Impl.class"))
            .await
            .unwrap();
        let bytes = tokio::fs::read(dir.path().join("libs/core.jar")).await.unwrap();
        assert_eq!(archive::read_entries(&bytes, |_| true).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sink_archive_failure_keeps_cause() {
        let dir = TempDir::new().unwrap();
        let mut sink = DirectoryUnitSink::new(dir.path());
        let location = UnitLocation::archived("libs/app.jar", "a/C.class");

        match sink.write_unit(&location, b"x").await {
            Err(TransformError::Output { location, source }) => {
                assert_eq!(location, "libs/app.jar!/a/C.class");
                let io = source.downcast_ref::<std::io::Error>().unwrap();
                assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("期望输出错误，实际为 {:?}", other),
        }

        sink.remove_unit(&location).await.unwrap();

        write(dir.path(), "libs/app.jar", b"not a zip").await;
        assert!(matches!(
            sink.write_unit(&location, b"x").await,
            Err(TransformError::Output { .. })
        ));
    }
}
