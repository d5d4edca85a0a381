//! # Registry Impl
//!
//! 增量服务注册扫描引擎。
//!
//! ## 工作流程
//!
//! 1. [`IncrementalOrchestrator::begin`] 载入或丢弃上次构建的快照
//! 2. [`IncrementalOrchestrator::process_unit`] 按变更状态分类每个编译单元
//! 3. [`IncrementalOrchestrator::finish`] 写入快照，校验约束并注入注册代码
//!
//! ## 示例
//!
//! ```rust,ignore
//! let mut orchestrator = IncrementalOrchestrator::new(
//!     introspector,
//!     patcher,
//!     MarkerConventions::default(),
//!     SnapshotStore::in_dir("build/tmp"),
//! );
//! orchestrator.begin(true).await;
//! orchestrator.process_units(&units)?;
//! if let Some(patched) = orchestrator.finish().await? {
//!     sink.write_unit(&patched.location, &patched.bytes).await?;
//! }
//! ```

pub mod cache;
pub mod classifier;
pub mod context;
pub mod model;
pub mod orchestrator;
pub mod snapshot;
pub mod synthesizer;

pub use cache::TypeModelCache;
pub use classifier::{Classifier, IgnoreReason, UnitCategory};
pub use context::{RegistrySentinel, ScanContext};
pub use model::{RegistryModel, ServiceEntry};
pub use orchestrator::{IncrementalOrchestrator, ScanStats};
pub use snapshot::{SnapshotStore, CACHE_FILE_NAME};
pub use synthesizer::RegistrationSynthesizer;
