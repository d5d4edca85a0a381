//! # Registry Abstractions
//!
//! 服务注册抽象层，定义扫描引擎与外部协作者之间的接口。
//!
//! ## 核心接口
//!
//! - [`TypeIntrospector`] - 从编译单元字节中读取类型描述符
//! - [`InitializerPatcher`] - 向注册表静态初始化块追加注册代码
//! - [`UnitSource`] - 枚举带变更状态的编译单元
//! - [`UnitSink`] - 接收输出编译单元

pub mod introspector;
pub mod patcher;
pub mod source;
pub mod unit;

pub use introspector::*;
pub use patcher::*;
pub use source::*;
pub use unit::*;
