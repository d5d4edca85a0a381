//! # 构建管线组合层
//!
//! 这个 crate 把扫描引擎、类文件工具与文件系统组合成可直接调用的构建转换。
//!
//! ## 主要功能
//!
//! - **转换配置**: TOML 文件与环境变量叠加的 [`TransformConfig`]
//! - **类目录来源与输出**: [`DirectoryUnitSource`] / [`DirectoryUnitSink`]，目录中的 jar 归档同样参与扫描
//! - **转换构建器**: 使用构建者模式组装 [`ServiceBuilderTransform`]
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use infrastructure_composition::{DirectoryUnitSink, DirectoryUnitSource, TransformBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut transform = TransformBuilder::new()
//!         .temp_dir("build/tmp/service-builder")
//!         .build()?;
//!
//!     let source = DirectoryUnitSource::new("build/classes");
//!     let mut sink = DirectoryUnitSink::new("build/transformed");
//!     let report = transform.transform(&source, &mut sink).await?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod directory;
pub mod logging;
pub mod settings;
pub mod transform;


pub use directory::{DirectoryUnitSink, DirectoryUnitSource};
pub use logging::LoggingConfig;
pub use settings::{LoggingSettings, TransformConfig, ENV_PREFIX, ENV_SEPARATOR};
pub use transform::{ServiceBuilderTransform, TransformBuilder, TransformReport};

// 重新导出错误类型
pub use infrastructure_common::TransformError;
