//! 约定规范定义
//!
//! 分类器依赖的标记注解、能力接口与注册表类名

use serde::{Deserialize, Serialize};
use std::fmt;

/// 运行时库的默认包名
pub const DEFAULT_PACKAGE: &str = "com.tablebird.serviceproviderbuilder";

/// 服务提供者策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProviderPolicy {
    /// 只允许一个实现
    Single,
    /// 允许多个实现
    #[default]
    Multiple,
}

impl ProviderPolicy {
    /// 从枚举常量名解析
    pub fn from_constant(constant: &str) -> Option<Self> {
        match constant {
            "SINGLE" => Some(Self::Single),
            "MULTIPLE" => Some(Self::Multiple),
            _ => None,
        }
    }

    /// 是否为单实现策略
    pub fn is_single(self) -> bool {
        self == Self::Single
    }
}

impl fmt::Display for ProviderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "SINGLE"),
            Self::Multiple => write!(f, "MULTIPLE"),
        }
    }
}

/// 标记约定
///
/// 所有名称均为限定名。默认值与运行时库保持一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConventions {
    /// 构建器标记注解
    pub builder_annotation: String,
    /// 构建器注解中列出目标服务接口的数组成员
    pub builder_targets_member: String,
    /// 构建器必须实现的能力接口
    pub builder_interface: String,
    /// 服务提供者标记注解
    pub provider_annotation: String,
    /// 服务提供者注解中的策略成员
    pub provider_policy_member: String,
    /// 注册表哨兵类
    pub registry_class: String,
    /// 注册表上的静态注册方法名
    pub register_method: String,
}

impl Default for MarkerConventions {
    fn default() -> Self {
        Self {
            builder_annotation: format!("{}.Build", DEFAULT_PACKAGE),
            builder_targets_member: "serviceProviders".to_string(),
            builder_interface: format!("{}.ServiceBuilder", DEFAULT_PACKAGE),
            provider_annotation: format!("{}.ServiceProvider", DEFAULT_PACKAGE),
            provider_policy_member: "value".to_string(),
            registry_class: format!("{}.ServiceBuilderRegistry", DEFAULT_PACKAGE),
            register_method: "register".to_string(),
        }
    }
}

impl MarkerConventions {
    /// 使用自定义包名创建约定（类名保持默认）
    pub fn for_package(package: &str) -> Self {
        Self {
            builder_annotation: format!("{}.Build", package),
            builder_interface: format!("{}.ServiceBuilder", package),
            provider_annotation: format!("{}.ServiceProvider", package),
            registry_class: format!("{}.ServiceBuilderRegistry", package),
            ..Self::default()
        }
    }

    /// 是否为注册表哨兵
    pub fn is_registry(&self, qualified_name: &str) -> bool {
        self.registry_class == qualified_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!(ProviderPolicy::from_constant("SINGLE"), Some(ProviderPolicy::Single));
        assert_eq!(
            ProviderPolicy::from_constant("MULTIPLE"),
            Some(ProviderPolicy::Multiple)
        );
        assert_eq!(ProviderPolicy::from_constant("single"), None);
        assert_eq!(ProviderPolicy::default(), ProviderPolicy::Multiple);
        assert_eq!(ProviderPolicy::Single.to_string(), "SINGLE");
    }

    #[test]
    fn test_default_conventions() {
        let conventions = MarkerConventions::default();
        assert!(conventions.is_registry("com.tablebird.serviceproviderbuilder.ServiceBuilderRegistry"));
        assert_eq!(conventions.builder_targets_member, "serviceProviders");

        let custom = MarkerConventions::for_package("org.acme.spi");
        assert_eq!(custom.builder_annotation, "org.acme.spi.Build");
        assert_eq!(custom.register_method, "register");
    }

    #[test]
    fn test_partial_deserialization() {
        let conventions: MarkerConventions =
            serde_json::from_str(r#"{"registry_class": "org.acme.Registry"}"#).unwrap();
        assert_eq!(conventions.registry_class, "org.acme.Registry");
        assert_eq!(conventions.builder_annotation, MarkerConventions::default().builder_annotation);
    }
}
