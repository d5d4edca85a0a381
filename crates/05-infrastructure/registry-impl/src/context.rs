//! 扫描上下文
//!
//! 一次构建调用独占的全部可变状态

use crate::cache::TypeModelCache;
use crate::model::RegistryModel;
use registry_abstractions::{TypeIntrospector, UnitLocation};
use std::sync::Arc;
use tracing::{info, warn};

/// 注册表哨兵
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySentinel {
    /// 限定名
    pub qualified_name: String,
    /// 单元位置（归档内时为条目路径）
    pub location: UnitLocation,
    /// 原始单元字节
    pub bytes: Vec<u8>,
}

/// 扫描上下文
#[derive(Debug)]
pub struct ScanContext {
    /// 类型模型缓存
    pub cache: TypeModelCache,
    /// 注册表模型
    pub model: RegistryModel,
    /// 本次构建找到的注册表哨兵
    pub sentinel: Option<RegistrySentinel>,
}

impl ScanContext {
    /// 创建空上下文
    pub fn new(introspector: Arc<dyn TypeIntrospector>) -> Self {
        Self {
            cache: TypeModelCache::new(introspector),
            model: RegistryModel::new(),
            sentinel: None,
        }
    }

    /// 丢弃全部状态
    pub fn reset(&mut self) {
        self.cache.clear();
        self.model.clear();
        self.sentinel = None;
    }

    /// 记录注册表哨兵，每次构建只记录一次
    pub fn record_sentinel(
        &mut self,
        qualified_name: &str,
        location: &UnitLocation,
        bytes: &[u8],
    ) -> bool {
        if let Some(existing) = &self.sentinel {
            if existing.location != *location {
                warn!(
                    "重复的注册表类 {}，忽略 {}，保留 {}",
                    qualified_name, location, existing.location
                );
            }
            return false;
        }

        info!("找到注册表类: {} ({})", qualified_name, location);
        self.sentinel = Some(RegistrySentinel {
            qualified_name: qualified_name.to_string(),
            location: location.clone(),
            bytes: bytes.to_vec(),
        });
        true
    }
}
