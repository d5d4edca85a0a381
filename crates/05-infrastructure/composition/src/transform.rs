//! 服务注册转换
//!
//! 把单元来源、扫描引擎与输出端组装为一次完整的构建转换。

use crate::logging::LoggingConfig;
use crate::settings::TransformConfig;
use classfile_tools::{ClassFileIntrospector, ClassFilePatcher};
use infrastructure_common::{MarkerConventions, TransformError, TransformResult};
use registry_abstractions::{
    InitializerPatcher, TypeIntrospector, UnitSink, UnitSource, UnitStatus,
};
use registry_impl::{IncrementalOrchestrator, SnapshotStore};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// 转换报告
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub added: usize,
    pub changed: usize,
    pub removed: usize,
    pub unchanged: usize,
    /// 复制的非编译单元文件数
    pub resources: usize,
    pub builders: usize,
    pub providers: usize,
    /// 有实现的服务数
    pub services: usize,
    /// 注入的注册语句数
    pub statements: usize,
    /// 被改写的注册表单元
    pub patched: Option<String>,
}

impl fmt::Display for TransformReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "单元: 新增 {} / 变更 {} / 删除 {} / 未变更 {}，资源 {}；构建器 {}，提供者 {}；服务 {}，注册语句 {}",
            self.added,
            self.changed,
            self.removed,
            self.unchanged,
            self.resources,
            self.builders,
            self.providers,
            self.services,
            self.statements
        )?;
        match &self.patched {
            Some(location) => write!(f, "；已改写 {}", location),
            None => write!(f, "；未找到注册表类"),
        }
    }
}

/// 转换构建器
pub struct TransformBuilder {
    config: TransformConfig,
    introspector: Option<Arc<dyn TypeIntrospector>>,
    patcher: Option<Arc<dyn InitializerPatcher>>,
    logging: Option<LoggingConfig>,
}

impl TransformBuilder {
    /// 使用默认配置创建构建器
    pub fn new() -> Self {
        Self::from_config(TransformConfig::default())
    }

    /// 使用已加载的配置创建构建器
    pub fn from_config(config: TransformConfig) -> Self {
        Self {
            config,
            introspector: None,
            patcher: None,
            logging: None,
        }
    }

    /// 设置快照目录
    pub fn temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = temp_dir.into();
        self
    }

    /// 设置是否增量构建
    pub fn incremental(mut self, incremental: bool) -> Self {
        self.config.incremental = incremental;
        self
    }

    /// 设置标记约定
    pub fn conventions(mut self, conventions: MarkerConventions) -> Self {
        self.config.conventions = conventions;
        self
    }

    /// 替换类型内省器
    pub fn introspector(mut self, introspector: Arc<dyn TypeIntrospector>) -> Self {
        self.introspector = Some(introspector);
        self
    }

    /// 替换初始化块注入器
    pub fn patcher(mut self, patcher: Arc<dyn InitializerPatcher>) -> Self {
        self.patcher = Some(patcher);
        self
    }

    /// 构建时安装日志订阅器
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = Some(config);
        self
    }

    /// 构建转换
    pub fn build(self) -> TransformResult<ServiceBuilderTransform> {
        if let Some(logging) = &self.logging {
            logging.init()?;
        }

        if self.config.conventions.registry_class.is_empty() {
            return Err(TransformError::config("注册表类名不能为空"));
        }

        let introspector: Arc<dyn TypeIntrospector> = match self.introspector {
            Some(introspector) => introspector,
            None => Arc::new(ClassFileIntrospector::new()),
        };
        let patcher: Arc<dyn InitializerPatcher> = match self.patcher {
            Some(patcher) => patcher,
            None => Arc::new(ClassFilePatcher::new(self.config.conventions.clone())),
        };

        info!(
            "创建服务注册转换，快照目录: {}，增量: {}",
            self.config.temp_dir.display(),
            self.config.incremental
        );
        let orchestrator = IncrementalOrchestrator::new(
            introspector,
            patcher,
            self.config.conventions.clone(),
            SnapshotStore::in_dir(&self.config.temp_dir),
        );
        Ok(ServiceBuilderTransform {
            orchestrator,
            incremental: self.config.incremental,
        })
    }
}

impl Default for TransformBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 服务注册转换
#[derive(Debug)]
pub struct ServiceBuilderTransform {
    orchestrator: IncrementalOrchestrator,
    incremental: bool,
}

impl ServiceBuilderTransform {
    /// 执行一次转换
    ///
    /// 配置为非增量时先完全重置；全部单元分类完成后才合成注册代码。
    /// 注册表位于归档内时，输出端改写已复制的归档
    pub async fn transform(
        &mut self,
        source: &dyn UnitSource,
        sink: &mut dyn UnitSink,
    ) -> TransformResult<TransformReport> {
        info!("开始转换: {}", source.name());
        self.orchestrator.begin(self.incremental).await;

        let units = source.units().await?;
        self.orchestrator.process_units(&units)?;

        // 归档内的单元随归档资源整体复制
        for unit in units.iter().filter(|unit| unit.location.archive.is_none()) {
            match (&unit.bytes, unit.status) {
                (_, UnitStatus::Removed) | (None, _) => sink.remove_unit(&unit.location).await?,
                (Some(bytes), _) => sink.write_unit(&unit.location, bytes).await?,
            }
        }

        let resources = source.resources().await?;
        for (location, bytes) in &resources {
            debug!("复制资源: {}", location);
            sink.write_unit(location, bytes).await?;
        }

        let patched = self.orchestrator.finish().await?;
        if let Some(patched) = &patched {
            sink.write_unit(&patched.location, &patched.bytes).await?;
        }

        let stats = self.orchestrator.stats();
        let report = TransformReport {
            added: stats.added,
            changed: stats.changed,
            removed: stats.removed,
            unchanged: stats.unchanged,
            resources: resources.len(),
            builders: stats.builders,
            providers: stats.providers,
            services: self.orchestrator.model().non_empty_entries().count(),
            statements: patched.as_ref().map_or(0, |patched| patched.statement_count),
            patched: patched.map(|patched| patched.location.to_string()),
        };
        info!("转换完成: {}", report);
        Ok(report)
    }

    /// 扫描引擎
    pub fn orchestrator(&self) -> &IncrementalOrchestrator {
        &self.orchestrator
    }
}
