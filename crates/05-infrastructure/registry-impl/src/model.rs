//! 服务注册表模型
//!
//! 服务接口键到实现集合的有序映射

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// 服务条目
///
/// 持久化字段名与历史快照文件保持一致（`key` / `isSingle` / `values`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// 服务接口限定名
    pub key: String,
    /// 是否只允许一个实现
    #[serde(rename = "isSingle", default)]
    pub single_policy: bool,
    /// 实现类型限定名，按插入顺序去重
    #[serde(rename = "values", default)]
    pub implementations: IndexSet<String>,
}

impl ServiceEntry {
    /// 创建空条目
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            single_policy: false,
            implementations: IndexSet::new(),
        }
    }

    /// 添加实现，返回是否为新加入
    pub fn add_implementation(&mut self, name: impl Into<String>) -> bool {
        self.implementations.insert(name.into())
    }

    /// 是否存在实现
    pub fn has_implementations(&self) -> bool {
        !self.implementations.is_empty()
    }
}

/// 注册表模型
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryModel {
    entries: IndexMap<String, ServiceEntry>,
}

impl RegistryModel {
    /// 创建空模型
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取或按首次出现顺序创建条目
    pub fn get_or_create(&mut self, key: &str) -> &mut ServiceEntry {
        self.entries
            .entry(key.to_string())
            .or_insert_with(|| ServiceEntry::new(key))
    }

    /// 获取条目
    pub fn get(&self, key: &str) -> Option<&ServiceEntry> {
        self.entries.get(key)
    }

    /// 从所有条目中移除指定实现，返回受影响的条目数
    ///
    /// 重复移除是空操作
    pub fn remove_implementation(&mut self, name: &str) -> usize {
        self.entries
            .values_mut()
            .filter_map(|entry| entry.implementations.shift_remove(name).then_some(()))
            .count()
    }

    /// 至少有一个实现的条目，按创建顺序
    pub fn non_empty_entries(&self) -> impl Iterator<Item = &ServiceEntry> {
        self.entries.values().filter(|entry| entry.has_implementations())
    }

    /// 合并持久化快照
    ///
    /// 已存在的键合并策略与实现，不存在的键按快照顺序追加
    pub fn load(&mut self, snapshot: Vec<ServiceEntry>) {
        for record in snapshot {
            let entry = self.get_or_create(&record.key);
            entry.single_policy |= record.single_policy;
            entry.implementations.extend(record.implementations);
        }
    }

    /// 生成可持久化的快照
    pub fn snapshot(&self) -> Vec<ServiceEntry> {
        self.non_empty_entries().cloned().collect()
    }

    /// 清空模型
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// 条目数量（包括空条目）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否没有任何条目
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
