//! 注册代码合成器
//!
//! 校验单实现约束，生成有序注册语句，并注入注册表的静态初始化块

use crate::context::RegistrySentinel;
use crate::model::RegistryModel;
use infrastructure_common::{RegistryError, RegistryResult};
use registry_abstractions::{InitializerPatcher, PatchedUnit, RegistrationStatement};
use std::sync::Arc;
use tracing::{debug, info};

/// 注册代码合成器
pub struct RegistrationSynthesizer {
    patcher: Arc<dyn InitializerPatcher>,
}

impl std::fmt::Debug for RegistrationSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationSynthesizer")
            .field("patcher", &self.patcher.name())
            .finish()
    }
}

impl RegistrationSynthesizer {
    /// 创建合成器
    pub fn new(patcher: Arc<dyn InitializerPatcher>) -> Self {
        Self { patcher }
    }

    /// 生成注册语句
    ///
    /// 按条目创建顺序、实现插入顺序输出；单实现策略的键存在多个实现时失败
    pub fn statements(model: &RegistryModel) -> RegistryResult<Vec<RegistrationStatement>> {
        let mut statements = Vec::new();
        for entry in model.non_empty_entries() {
            if entry.single_policy && entry.implementations.len() > 1 {
                return Err(RegistryError::ConstraintViolation {
                    key: entry.key.clone(),
                    implementations: entry.implementations.iter().cloned().collect(),
                });
            }
            statements.extend(
                entry
                    .implementations
                    .iter()
                    .map(|implementation| RegistrationStatement::new(&entry.key, implementation)),
            );
        }
        Ok(statements)
    }

    /// 合成并注入注册代码
    ///
    /// 没有注册表哨兵时不产生输出
    pub fn synthesize(
        &self,
        model: &RegistryModel,
        sentinel: Option<&RegistrySentinel>,
    ) -> RegistryResult<Option<PatchedUnit>> {
        let statements = Self::statements(model)?;

        let Some(sentinel) = sentinel else {
            info!("未找到注册表类，跳过注册代码注入");
            return Ok(None);
        };

        for statement in &statements {
            debug!("{}", statement);
        }

        let bytes = self
            .patcher
            .append_static_initializer(&sentinel.bytes, &statements)?;
        info!(
            "注入 {} 条注册语句到 {}",
            statements.len(),
            sentinel.qualified_name
        );

        Ok(Some(PatchedUnit {
            location: sentinel.location.clone(),
            bytes,
            statement_count: statements.len(),
        }))
    }
}
