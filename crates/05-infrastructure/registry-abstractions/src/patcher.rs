//! 静态初始化块注入抽象接口

use crate::unit::UnitLocation;
use infrastructure_common::PatchError;
use std::fmt;

/// 一条注册语句：以新建的实现实例注册服务接口
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationStatement {
    /// 服务接口限定名
    pub interface: String,
    /// 实现类型限定名
    pub implementation: String,
}

impl RegistrationStatement {
    /// 创建注册语句
    pub fn new(interface: impl Into<String>, implementation: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            implementation: implementation.into(),
        }
    }
}

impl fmt::Display for RegistrationStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "register({}.class, new {}());",
            self.interface, self.implementation
        )
    }
}

/// 初始化块注入器 trait
///
/// 把注册语句追加到单元已有的静态初始化块之后（不存在时创建），
/// 并重新生成该单元的字节
pub trait InitializerPatcher: Send + Sync {
    /// 追加注册语句并返回新的单元字节
    fn append_static_initializer(
        &self,
        unit_bytes: &[u8],
        statements: &[RegistrationStatement],
    ) -> Result<Vec<u8>, PatchError>;

    /// 获取注入器名称
    fn name(&self) -> &str;
}

/// 注入后的输出单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedUnit {
    /// 单元位置
    pub location: UnitLocation,
    /// 新的单元字节
    pub bytes: Vec<u8>,
    /// 注入的语句数量
    pub statement_count: usize,
}
