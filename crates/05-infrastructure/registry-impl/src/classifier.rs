//! 编译单元分类器
//!
//! 对单个编译单元计算其类别，再把类别应用到注册表模型。
//! 判定顺序（首个命中生效）：
//!
//! 1. 注解或枚举 -> 忽略
//! 2. 带服务提供者标记 -> 提供者，声明自身键的策略
//! 3. 接口 -> 忽略
//! 4. 带构建器标记且实现构建器能力接口 -> 构建器
//! 5. 限定名等于注册表类 -> 注册表哨兵
//! 6. 其余 -> 忽略

use crate::cache::TypeModelCache;
use crate::model::RegistryModel;
use infrastructure_common::{
    AnnotationInfo, MarkerConventions, MemberValue, ProviderPolicy, RegistryError,
    RegistryResult, TypeDescriptor, TypeKind,
};
use tracing::debug;

/// 忽略原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// 注解或枚举类型
    AnnotationOrEnum,
    /// 未带提供者标记的接口
    Interface,
    /// 没有任何标记
    Unmarked,
}

/// 编译单元类别
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitCategory {
    /// 服务提供者：以自身限定名为键声明策略
    Provider {
        key: String,
        policy: ProviderPolicy,
    },
    /// 构建器：为目标服务接口注册自身
    Builder {
        name: String,
        targets: Vec<String>,
    },
    /// 注册表哨兵
    RegistrySentinel,
    /// 忽略
    Ignored(IgnoreReason),
}

impl UnitCategory {
    /// 是否为注册表哨兵
    pub fn is_sentinel(&self) -> bool {
        matches!(self, UnitCategory::RegistrySentinel)
    }
}

/// 分类器
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    conventions: MarkerConventions,
}

impl Classifier {
    /// 使用指定约定创建分类器
    pub fn new(conventions: MarkerConventions) -> Self {
        Self { conventions }
    }

    /// 获取约定
    pub fn conventions(&self) -> &MarkerConventions {
        &self.conventions
    }

    /// 计算编译单元类别，不修改任何状态
    pub fn classify(
        &self,
        descriptor: &TypeDescriptor,
        cache: &TypeModelCache,
    ) -> RegistryResult<UnitCategory> {
        if descriptor.kind.is_annotation_or_enum() {
            return Ok(UnitCategory::Ignored(IgnoreReason::AnnotationOrEnum));
        }

        if let Some(annotation) = descriptor.annotation(&self.conventions.provider_annotation) {
            let policy = self.provider_policy(descriptor, annotation)?;
            return Ok(UnitCategory::Provider {
                key: descriptor.qualified_name.clone(),
                policy,
            });
        }

        if descriptor.kind == TypeKind::Interface {
            return Ok(UnitCategory::Ignored(IgnoreReason::Interface));
        }

        if let Some(annotation) = descriptor.annotation(&self.conventions.builder_annotation) {
            if cache.is_subtype_of(descriptor, &self.conventions.builder_interface) {
                let targets = self.builder_targets(descriptor, annotation)?;
                return Ok(UnitCategory::Builder {
                    name: descriptor.qualified_name.clone(),
                    targets,
                });
            }
        }

        if self.conventions.is_registry(&descriptor.qualified_name) {
            return Ok(UnitCategory::RegistrySentinel);
        }

        Ok(UnitCategory::Ignored(IgnoreReason::Unmarked))
    }

    /// 把类别应用到模型
    ///
    /// 变更的单元先从所有条目中清除（清除阶段），再按新类别插入（插入阶段）
    pub fn apply(
        &self,
        qualified_name: &str,
        category: &UnitCategory,
        changed: bool,
        model: &mut RegistryModel,
    ) {
        if changed {
            let purged = model.remove_implementation(qualified_name);
            if purged > 0 {
                debug!("清除 {} 的旧注册: {} 个服务", qualified_name, purged);
            }
        }

        match category {
            UnitCategory::Provider { key, policy } => {
                debug!("发现服务提供者: {} ({})", key, policy);
                model.get_or_create(key).single_policy = policy.is_single();
            }
            UnitCategory::Builder { name, targets } => {
                debug!("发现服务构建器: {} -> {:?}", name, targets);
                for target in targets {
                    model.get_or_create(target).add_implementation(name.as_str());
                }
            }
            UnitCategory::RegistrySentinel | UnitCategory::Ignored(_) => {}
        }
    }

    /// 分类并应用，返回类别
    pub fn process(
        &self,
        descriptor: &TypeDescriptor,
        changed: bool,
        cache: &TypeModelCache,
        model: &mut RegistryModel,
    ) -> RegistryResult<UnitCategory> {
        let category = self.classify(descriptor, cache)?;
        self.apply(&descriptor.qualified_name, &category, changed, model);
        Ok(category)
    }

    fn provider_policy(
        &self,
        descriptor: &TypeDescriptor,
        annotation: &AnnotationInfo,
    ) -> RegistryResult<ProviderPolicy> {
        match annotation.member(&self.conventions.provider_policy_member) {
            None => Ok(ProviderPolicy::default()),
            Some(MemberValue::Enum { constant, .. }) => ProviderPolicy::from_constant(constant)
                .ok_or_else(|| {
                    self.malformed(
                        descriptor,
                        annotation,
                        format!("未知的策略常量: {}", constant),
                    )
                }),
            Some(other) => Err(self.malformed(
                descriptor,
                annotation,
                format!("策略成员应为枚举，实际为 {}", other.shape()),
            )),
        }
    }

    fn builder_targets(
        &self,
        descriptor: &TypeDescriptor,
        annotation: &AnnotationInfo,
    ) -> RegistryResult<Vec<String>> {
        let values = match annotation.member(&self.conventions.builder_targets_member) {
            // 未写出的成员取注解声明的默认值：空数组
            None => return Ok(Vec::new()),
            Some(MemberValue::Array(values)) => values,
            Some(other) => {
                return Err(self.malformed(
                    descriptor,
                    annotation,
                    format!("目标成员应为数组，实际为 {}", other.shape()),
                ))
            }
        };

        values
            .iter()
            .map(|value| match value {
                MemberValue::Class(name) => Ok(name.clone()),
                other => Err(self.malformed(
                    descriptor,
                    annotation,
                    format!("目标数组元素应为类引用，实际为 {}", other.shape()),
                )),
            })
            .collect()
    }

    fn malformed(
        &self,
        descriptor: &TypeDescriptor,
        annotation: &AnnotationInfo,
        message: String,
    ) -> RegistryError {
        RegistryError::MalformedAnnotation {
            type_name: descriptor.qualified_name.clone(),
            annotation: annotation.type_name.clone(),
            message,
        }
    }
}
