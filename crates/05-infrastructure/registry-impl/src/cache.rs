//! 类型模型缓存
//!
//! 按限定名缓存编译单元的类型描述符。变更或删除的单元必须显式驱逐。

use infrastructure_common::{IntrospectionResult, TypeDescriptor};
use registry_abstractions::TypeIntrospector;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// 类型模型缓存
pub struct TypeModelCache {
    introspector: Arc<dyn TypeIntrospector>,
    descriptors: HashMap<String, Arc<TypeDescriptor>>,
}

impl std::fmt::Debug for TypeModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeModelCache")
            .field("introspector", &self.introspector.name())
            .field("cached", &self.descriptors.len())
            .finish()
    }
}

impl TypeModelCache {
    /// 创建新的缓存
    pub fn new(introspector: Arc<dyn TypeIntrospector>) -> Self {
        Self {
            introspector,
            descriptors: HashMap::new(),
        }
    }

    /// 加载编译单元
    ///
    /// 同名描述符仍在缓存中时直接返回缓存值
    pub fn load(&mut self, bytes: &[u8]) -> IntrospectionResult<Arc<TypeDescriptor>> {
        let descriptor = self.introspector.introspect(bytes)?;
        if let Some(cached) = self.descriptors.get(&descriptor.qualified_name) {
            return Ok(Arc::clone(cached));
        }

        let descriptor = Arc::new(descriptor);
        self.descriptors
            .insert(descriptor.qualified_name.clone(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// 重新解析编译单元，丢弃同名的旧描述符
    pub fn reload(&mut self, bytes: &[u8]) -> IntrospectionResult<Arc<TypeDescriptor>> {
        let descriptor = self.introspector.introspect(bytes)?;
        self.evict(&descriptor.qualified_name);
        Ok(self.insert(descriptor))
    }

    /// 直接放入描述符，覆盖同名缓存
    pub fn insert(&mut self, descriptor: TypeDescriptor) -> Arc<TypeDescriptor> {
        let descriptor = Arc::new(descriptor);
        self.descriptors
            .insert(descriptor.qualified_name.clone(), Arc::clone(&descriptor));
        descriptor
    }

    /// 获取缓存的描述符
    pub fn get(&self, qualified_name: &str) -> Option<Arc<TypeDescriptor>> {
        self.descriptors.get(qualified_name).cloned()
    }

    /// 驱逐描述符，返回是否存在
    pub fn evict(&mut self, qualified_name: &str) -> bool {
        let evicted = self.descriptors.remove(qualified_name).is_some();
        if evicted {
            debug!("驱逐类型缓存: {}", qualified_name);
        }
        evicted
    }

    /// 清空缓存
    pub fn clear(&mut self) {
        self.descriptors.clear();
    }

    /// 缓存数量
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// 缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// 判断描述符是否为指定接口的子类型
    ///
    /// 沿父类与接口链查找；链上未加载的类型视为不匹配
    pub fn is_subtype_of(&self, descriptor: &TypeDescriptor, interface: &str) -> bool {
        if descriptor.qualified_name == interface {
            return true;
        }

        let mut visited = HashSet::new();
        let mut pending: Vec<String> = descriptor.supertypes().map(str::to_string).collect();
        while let Some(name) = pending.pop() {
            if name == interface {
                return true;
            }
            if !visited.insert(name.clone()) {
                continue;
            }
            if let Some(parent) = self.descriptors.get(&name) {
                pending.extend(parent.supertypes().map(str::to_string));
            }
        }
        false
    }
}
