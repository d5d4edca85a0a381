//! 日志初始化
//!
//! 过滤规则使用 `EnvFilter` 语法，例如 `info` 或
//! `info,registry_impl=debug`。

use infrastructure_common::{TransformError, TransformResult};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// 过滤规则
    pub filter: String,
    /// 输出 JSON 行
    pub json: bool,
    /// 是否显示目标模块
    pub show_target: bool,
    /// 是否显示源文件与行号
    pub show_source: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            show_target: true,
            show_source: false,
        }
    }
}

impl LoggingConfig {
    /// 使用指定过滤规则创建配置
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Self::default()
        }
    }

    /// 排查问题时使用：扫描引擎输出 debug 并显示源位置
    pub fn verbose() -> Self {
        Self {
            filter: "info,registry_impl=debug,classfile_tools=debug".to_string(),
            show_source: true,
            ..Self::default()
        }
    }

    /// 构建服务器使用：JSON 输出
    pub fn structured() -> Self {
        Self {
            json: true,
            show_target: false,
            ..Self::default()
        }
    }

    /// 解析过滤规则
    pub fn env_filter(&self) -> TransformResult<EnvFilter> {
        EnvFilter::try_new(&self.filter).map_err(|e| {
            TransformError::config(format!("无效的日志过滤规则 '{}': {}", self.filter, e))
        })
    }

    /// 安装全局日志订阅器
    ///
    /// 只能安装一次，重复安装返回错误
    pub fn init(&self) -> TransformResult<()> {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(self.env_filter()?)
            .with_target(self.show_target)
            .with_file(self.show_source)
            .with_line_number(self.show_source);

        if self.json {
            subscriber.json().try_init()
        } else {
            subscriber.try_init()
        }
        .map_err(|e| TransformError::Bootstrap {
            message: format!("日志初始化失败: {}", e),
        })?;

        info!("日志系统初始化完成，过滤规则: {}", self.filter);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        assert!(LoggingConfig::default().env_filter().is_ok());
        assert!(LoggingConfig::verbose().env_filter().is_ok());
        assert!(LoggingConfig::with_filter("warn,registry_impl=trace")
            .env_filter()
            .is_ok());

        let result = LoggingConfig::with_filter("registry_impl=loud").env_filter();
        assert!(matches!(result, Err(TransformError::Config { .. })));
    }

    #[test]
    fn test_presets() {
        let structured = LoggingConfig::structured();
        assert!(structured.json);
        assert_eq!(structured.filter, "info");
        assert!(LoggingConfig::verbose().show_source);
    }
}
