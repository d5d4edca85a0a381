//! 编译单元输入契约

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 编译单元文件扩展名
pub const UNIT_EXTENSION: &str = ".class";

/// 编译单元的变更状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    /// 新增
    Added,
    /// 内容变更
    Changed,
    /// 已删除
    Removed,
    /// 未变更
    Unchanged,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnitStatus::Added => "added",
            UnitStatus::Changed => "changed",
            UnitStatus::Removed => "removed",
            UnitStatus::Unchanged => "unchanged",
        };
        f.write_str(text)
    }
}

/// 编译单元位置
///
/// 松散单元只有相对路径；归档内单元额外记录所属归档
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitLocation {
    /// 所属归档
    pub archive: Option<PathBuf>,
    /// 相对路径或归档条目路径，分隔符为 `/`
    pub path: String,
}

impl UnitLocation {
    /// 创建松散单元位置
    pub fn loose(path: impl Into<String>) -> Self {
        Self {
            archive: None,
            path: normalize(path.into()),
        }
    }

    /// 创建归档内单元位置
    pub fn archived(archive: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        Self {
            archive: Some(archive.into()),
            path: normalize(entry.into()),
        }
    }

    /// 是否为编译单元（`.class` 文件）
    pub fn is_unit(&self) -> bool {
        self.path.ends_with(UNIT_EXTENSION)
    }

    /// 由路径推导限定名：`a/b/C.class` -> `a.b.C`
    pub fn qualified_name_hint(&self) -> Option<String> {
        let stem = self.path.strip_suffix(UNIT_EXTENSION)?;
        if stem.is_empty() {
            return None;
        }
        Some(stem.replace('/', "."))
    }
}

impl fmt::Display for UnitLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.archive {
            Some(archive) => write!(f, "{}!/{}", archive.display(), self.path),
            None => f.write_str(&self.path),
        }
    }
}

fn normalize(path: String) -> String {
    let path = path.replace('\\', "/");
    path.trim_start_matches('/').to_string()
}

/// 带变更状态的编译单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    /// 单元位置
    pub location: UnitLocation,
    /// 变更状态
    pub status: UnitStatus,
    /// 单元字节，仅删除的单元为空
    pub bytes: Option<Vec<u8>>,
}

impl CompiledUnit {
    /// 创建带字节的单元
    pub fn new(location: UnitLocation, status: UnitStatus, bytes: Vec<u8>) -> Self {
        Self {
            location,
            status,
            bytes: Some(bytes),
        }
    }

    /// 创建已删除的单元
    pub fn removed(location: UnitLocation) -> Self {
        Self {
            location,
            status: UnitStatus::Removed,
            bytes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name_hint() {
        let location = UnitLocation::loose("com/example/FooFactory.class");
        assert_eq!(
            location.qualified_name_hint().as_deref(),
            Some("com.example.FooFactory")
        );
        assert!(location.is_unit());

        let windows = UnitLocation::loose("com\\example\\Outer$Inner.class");
        assert_eq!(
            windows.qualified_name_hint().as_deref(),
            Some("com.example.Outer$Inner")
        );

        assert_eq!(UnitLocation::loose("META-INF/MANIFEST.MF").qualified_name_hint(), None);
        assert_eq!(UnitLocation::loose(".class").qualified_name_hint(), None);
    }

    #[test]
    fn test_location_display() {
        let location = UnitLocation::archived("libs/runtime.jar", "/a/B.class");
        assert_eq!(location.path, "a/B.class");
        assert_eq!(location.to_string(), "libs/runtime.jar!/a/B.class");
        assert_eq!(UnitLocation::loose("a/B.class").to_string(), "a/B.class");
    }
}
