//! 错误类型定义

use std::path::PathBuf;
use thiserror::Error;

/// 编译单元解析错误类型
#[derive(Error, Debug)]
pub enum IntrospectionError {
    #[error("编译单元数据被截断: 偏移 {offset}, 需要 {needed} 字节")]
    Truncated { offset: usize, needed: usize },

    #[error("无效的类文件魔数: {magic:#010x}")]
    BadMagic { magic: u32 },

    #[error("常量池索引无效: {index}")]
    InvalidConstantIndex { index: u16 },

    #[error("不支持的常量池标签: {tag}, 位置 {index}")]
    UnsupportedConstantTag { tag: u8, index: u16 },

    #[error("常量池字符串无法解码: 索引 {index}")]
    InvalidUtf8 { index: u16 },

    #[error("常量类型不匹配: 索引 {index}, 期望 {expected}")]
    ConstantTypeMismatch { index: u16, expected: &'static str },

    #[error("注解数据格式错误: {message}")]
    MalformedAnnotation { message: String },

    #[error("无法识别的字节码指令: {opcode:#04x}, 位置 {pc}")]
    UnknownOpcode { opcode: u8, pc: usize },

    #[error("类文件尾部存在多余数据: {remaining} 字节")]
    TrailingBytes { remaining: usize },
}

impl IntrospectionError {
    /// 创建注解格式错误
    pub fn malformed_annotation(message: impl Into<String>) -> Self {
        Self::MalformedAnnotation {
            message: message.into(),
        }
    }
}

/// 静态初始化块注入错误类型
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("不支持的静态初始化块结构: {message}")]
    UnsupportedInitializer { message: String },

    #[error("方法字节码超出上限: {length} 字节")]
    CodeTooLarge { length: usize },

    #[error("常量池已满，无法追加常量")]
    ConstantPoolOverflow,

    #[error("编译单元解析失败: {source}")]
    Introspection {
        #[from]
        source: IntrospectionError,
    },
}

impl PatchError {
    /// 创建不支持的初始化块错误
    pub fn unsupported_initializer(message: impl Into<String>) -> Self {
        Self::UnsupportedInitializer {
            message: message.into(),
        }
    }
}

/// 服务注册表错误类型
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("服务 {key} 的策略为 SINGLE，但存在多个实现: {implementations:?}")]
    ConstraintViolation {
        key: String,
        implementations: Vec<String>,
    },

    #[error("类型 {type_name} 的注解 {annotation} 格式错误: {message}")]
    MalformedAnnotation {
        type_name: String,
        annotation: String,
        message: String,
    },

    #[error("编译单元解析失败: {source}")]
    Introspection {
        #[from]
        source: IntrospectionError,
    },

    #[error("注册代码注入失败: {source}")]
    Patch {
        #[from]
        source: PatchError,
    },
}

/// 持久化快照错误类型
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("快照文件读写失败: {path}, 原因: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("快照序列化失败: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

/// 构建转换错误类型
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("文件读写失败: {path}, 原因: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("输出单元写入失败: {location}, 原因: {source}")]
    Output {
        location: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("配置错误: {message}")]
    Config { message: String },

    #[error("转换初始化失败: {message}")]
    Bootstrap { message: String },

    #[error("服务注册失败: {source}")]
    Registry {
        #[from]
        source: RegistryError,
    },
}

impl TransformError {
    /// 创建文件读写错误
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// 创建配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// 结果类型别名
pub type IntrospectionResult<T> = Result<T, IntrospectionError>;
pub type PatchResult<T> = Result<T, PatchError>;
pub type RegistryResult<T> = Result<T, RegistryError>;
pub type SnapshotResult<T> = Result<T, SnapshotError>;
pub type TransformResult<T> = Result<T, TransformError>;
