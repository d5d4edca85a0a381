//! 增量编排器
//!
//! 先把本次构建的全部单元载入类型缓存，再按变更状态驱动分类：
//! 新增直接分类；变更先驱逐再以变更模式分类；删除只驱逐并清除注册；
//! 未变更的单元只参与父类型查找，不参与分类。

use crate::classifier::{Classifier, UnitCategory};
use crate::context::ScanContext;
use crate::model::RegistryModel;
use crate::snapshot::SnapshotStore;
use crate::synthesizer::RegistrationSynthesizer;
use infrastructure_common::{MarkerConventions, RegistryResult, TypeDescriptor};
use registry_abstractions::{
    CompiledUnit, InitializerPatcher, PatchedUnit, TypeIntrospector, UnitStatus,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 扫描统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// 新增单元数
    pub added: usize,
    /// 变更单元数
    pub changed: usize,
    /// 删除单元数
    pub removed: usize,
    /// 未变更单元数
    pub unchanged: usize,
    /// 识别到的构建器数
    pub builders: usize,
    /// 识别到的服务提供者数
    pub providers: usize,
}

/// 增量编排器
#[derive(Debug)]
pub struct IncrementalOrchestrator {
    context: ScanContext,
    classifier: Classifier,
    snapshot: SnapshotStore,
    synthesizer: RegistrationSynthesizer,
    stats: ScanStats,
}

impl IncrementalOrchestrator {
    /// 创建编排器
    pub fn new(
        introspector: Arc<dyn TypeIntrospector>,
        patcher: Arc<dyn InitializerPatcher>,
        conventions: MarkerConventions,
        snapshot: SnapshotStore,
    ) -> Self {
        Self {
            context: ScanContext::new(introspector),
            classifier: Classifier::new(conventions),
            snapshot,
            synthesizer: RegistrationSynthesizer::new(patcher),
            stats: ScanStats::default(),
        }
    }

    /// 开始一次构建
    ///
    /// 增量构建载入上次的快照；否则执行完全重置
    pub async fn begin(&mut self, incremental: bool) {
        self.stats = ScanStats::default();
        if !incremental {
            self.full_reset().await;
            return;
        }

        self.context.reset();
        let entries = self.snapshot.load().await;
        info!("载入快照 {} 条服务记录", entries.len());
        self.context.model.load(entries);
    }

    /// 完全重置：丢弃缓存、注册表、哨兵以及磁盘快照
    pub async fn full_reset(&mut self) {
        info!("执行完全重置");
        self.context.reset();
        self.snapshot.delete().await;
    }

    /// 处理一个编译单元，返回其是否为注册表哨兵
    pub fn process_unit(&mut self, unit: &CompiledUnit) -> RegistryResult<bool> {
        self.process_units(std::iter::once(unit))
    }

    /// 依次处理所有编译单元，返回是否找到注册表哨兵
    ///
    /// 先把全部单元（包括未变更的）载入类型缓存，再逐个分类，
    /// 子类型判定因此不依赖单元顺序
    pub fn process_units<'a, I>(&mut self, units: I) -> RegistryResult<bool>
    where
        I: IntoIterator<Item = &'a CompiledUnit>,
    {
        let units: Vec<&CompiledUnit> = units.into_iter().collect();
        let mut descriptors = Vec::with_capacity(units.len());
        for unit in &units {
            descriptors.push(self.load_descriptor(unit)?);
        }
        debug!("类型缓存已载入 {} 个描述符", self.context.cache.len());

        let mut found = false;
        for (unit, descriptor) in units.into_iter().zip(descriptors) {
            debug!("扫描单元: {} 状态: {}", unit.location, unit.status);
            let sentinel = match unit.status {
                UnitStatus::Added => {
                    self.stats.added += 1;
                    match descriptor {
                        Some(descriptor) => self.classify(unit, &descriptor, false)?,
                        None => false,
                    }
                }
                UnitStatus::Changed => {
                    self.stats.changed += 1;
                    match descriptor {
                        Some(descriptor) => self.classify(unit, &descriptor, true)?,
                        None => false,
                    }
                }
                UnitStatus::Removed => {
                    self.stats.removed += 1;
                    self.remove(unit);
                    false
                }
                UnitStatus::Unchanged => {
                    self.stats.unchanged += 1;
                    self.observe_unchanged(unit)
                }
            };
            found = sentinel || found;
        }
        Ok(found)
    }

    /// 结束构建：写入快照，再合成注册代码
    pub async fn finish(&mut self) -> RegistryResult<Option<PatchedUnit>> {
        let entries = self.context.model.snapshot();
        self.snapshot.store(&entries).await;
        self.synthesizer
            .synthesize(&self.context.model, self.context.sentinel.as_ref())
    }

    /// 获取扫描上下文
    pub fn context(&self) -> &ScanContext {
        &self.context
    }

    /// 获取注册表模型
    pub fn model(&self) -> &RegistryModel {
        &self.context.model
    }

    /// 获取扫描统计
    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// 获取快照存储
    pub fn snapshot_store(&self) -> &SnapshotStore {
        &self.snapshot
    }

    /// 第一阶段：按状态更新类型缓存
    ///
    /// 删除的单元被驱逐；变更的单元重新解析；未变更单元解析失败时只记录警告
    fn load_descriptor(
        &mut self,
        unit: &CompiledUnit,
    ) -> RegistryResult<Option<Arc<TypeDescriptor>>> {
        if matches!(unit.status, UnitStatus::Removed | UnitStatus::Changed) {
            if let Some(name) = unit.location.qualified_name_hint() {
                self.context.cache.evict(&name);
            }
        }
        if unit.status == UnitStatus::Removed {
            return Ok(None);
        }

        let Some(bytes) = unit.bytes.as_deref() else {
            warn!("单元缺少内容，跳过: {}", unit.location);
            return Ok(None);
        };
        match unit.status {
            UnitStatus::Changed => Ok(Some(self.context.cache.reload(bytes)?)),
            UnitStatus::Unchanged => match self.context.cache.load(bytes) {
                Ok(descriptor) => Ok(Some(descriptor)),
                Err(e) => {
                    warn!("未变更单元解析失败，不参与父类型查找: {}, 原因: {}", unit.location, e);
                    Ok(None)
                }
            },
            _ => Ok(Some(self.context.cache.load(bytes)?)),
        }
    }

    fn classify(
        &mut self,
        unit: &CompiledUnit,
        descriptor: &TypeDescriptor,
        changed: bool,
    ) -> RegistryResult<bool> {
        let category = self.classifier.process(
            descriptor,
            changed,
            &self.context.cache,
            &mut self.context.model,
        )?;

        match &category {
            UnitCategory::Builder { .. } => self.stats.builders += 1,
            UnitCategory::Provider { .. } => self.stats.providers += 1,
            UnitCategory::RegistrySentinel => {
                if let Some(bytes) = unit.bytes.as_deref() {
                    self.context
                        .record_sentinel(&descriptor.qualified_name, &unit.location, bytes);
                }
            }
            UnitCategory::Ignored(_) => {}
        }
        Ok(category.is_sentinel())
    }

    fn remove(&mut self, unit: &CompiledUnit) {
        let Some(name) = unit.location.qualified_name_hint() else {
            warn!("无法从路径推导类名，跳过删除: {}", unit.location);
            return;
        };
        let purged = self.context.model.remove_implementation(&name);
        debug!("删除单元 {}，清除 {} 个服务中的注册", name, purged);
    }

    /// 未变更的单元不参与分类，但仍需按名称识别注册表哨兵
    fn observe_unchanged(&mut self, unit: &CompiledUnit) -> bool {
        let Some(name) = unit.location.qualified_name_hint() else {
            return false;
        };
        if !self.classifier.conventions().is_registry(&name) {
            return false;
        }
        match unit.bytes.as_deref() {
            Some(bytes) => {
                self.context.record_sentinel(&name, &unit.location, bytes);
                true
            }
            None => false,
        }
    }
}
