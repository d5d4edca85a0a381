//! # Classfile Tools
//!
//! JVM 类文件读写工具，为扫描引擎提供具体的内省器与注入器。
//!
//! ## 核心类型
//!
//! - [`ClassFile`] - 完整类文件结构，可逐字节回写
//! - [`ClassFileIntrospector`] - [`TypeIntrospector`](registry_abstractions::TypeIntrospector) 实现
//! - [`ClassFilePatcher`] - [`InitializerPatcher`](registry_abstractions::InitializerPatcher) 实现
//! - [`ClassFileBuilder`] - 生成最小类文件

pub mod annotations;
pub mod builder;
pub mod class_file;
pub mod code;
pub mod constant_pool;
pub mod introspector;
pub mod patcher;
pub mod reader;

pub use builder::ClassFileBuilder;
pub use class_file::{AttributeInfo, ClassFile, MemberInfo};
pub use code::{CodeAttribute, ExceptionEntry};
pub use constant_pool::{Constant, ConstantPool};
pub use introspector::ClassFileIntrospector;
pub use patcher::ClassFilePatcher;
