//! 转换配置
//!
//! 由可选的 TOML 文件与 `SERVICE_BUILDER` 前缀的环境变量叠加而成，
//! 环境变量优先。嵌套键使用 `__` 分隔，例如
//! `SERVICE_BUILDER_CONVENTIONS__REGISTRY_CLASS`。

use crate::logging::LoggingConfig;
use infrastructure_common::{MarkerConventions, TransformError, TransformResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "SERVICE_BUILDER";
/// 嵌套键分隔符
pub const ENV_SEPARATOR: &str = "__";

/// 转换配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// 快照文件所在目录
    pub temp_dir: PathBuf,
    /// 为 false 时每次构建都完全重置
    pub incremental: bool,
    /// 标记约定
    pub conventions: MarkerConventions,
    /// 日志设置
    pub logging: LoggingSettings,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("build/tmp/service-builder"),
            incremental: true,
            conventions: MarkerConventions::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// 日志设置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// 过滤规则，接受级别或 `info,registry_impl=debug` 形式的指令
    pub level: String,
    /// 是否输出 JSON
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingSettings {
    /// 转换为日志配置，过滤规则无效时失败
    pub fn to_logging_config(&self) -> TransformResult<LoggingConfig> {
        let base = if self.json {
            LoggingConfig::structured()
        } else {
            LoggingConfig::default()
        };
        let config = LoggingConfig {
            filter: self.level.clone(),
            ..base
        };
        config.env_filter()?;
        Ok(config)
    }
}

impl TransformConfig {
    /// 加载配置
    ///
    /// 指定的配置文件必须存在
    pub fn load(path: Option<&Path>) -> TransformResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(TransformError::config(format!(
                    "配置文件不存在: {}",
                    path.display()
                )));
            }
            debug!("加载配置文件: {}", path.display());
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| TransformError::config(format!("配置构建失败: {}", e)))?;

        settings
            .try_deserialize()
            .map_err(|e| TransformError::config(format!("配置绑定失败: {}", e)))
    }

    /// 从 TOML 文本解析，不读取环境变量
    pub fn from_toml_str(text: &str) -> TransformResult<Self> {
        config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| TransformError::config(format!("配置解析失败: {}", e)))
    }
}
