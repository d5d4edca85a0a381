//! 类型内省抽象接口

use infrastructure_common::{IntrospectionError, TypeDescriptor};

/// 类型内省器 trait
///
/// 解析一个编译单元的字节，返回其结构元数据
pub trait TypeIntrospector: Send + Sync {
    /// 解析编译单元
    fn introspect(&self, bytes: &[u8]) -> Result<TypeDescriptor, IntrospectionError>;

    /// 获取内省器名称
    fn name(&self) -> &str;
}
