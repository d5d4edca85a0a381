//! # Infrastructure Common
//!
//! 这个 crate 提供了 Service Builder 各层共享的数据模型和错误类型。
//!
//! ## 核心类型
//!
//! - [`TypeDescriptor`] - 编译单元的结构元数据
//! - [`AnnotationInfo`] / [`MemberValue`] - 注解及其成员值
//! - [`MarkerConventions`] - 标记注解与注册表类名约定
//! - [`ProviderPolicy`] - 服务提供者策略
//!
//! ## 设计原则
//!
//! - 与具体字节码库解耦，只描述分类所需的信息
//! - 所有失败通过类型化错误返回
//! - 约定可配置，默认值与运行时库一致

pub mod conventions;
pub mod errors;
pub mod metadata;

pub use conventions::*;
pub use errors::*;
pub use metadata::*;
