//! 日志系统配置模块
//! 支持结构化日志（json）和文本日志，级别由 RUST_LOG 或配置决定

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LoggingConfig;

/// 初始化日志系统
///
/// 全局 subscriber 只能安装一次，重复调用返回错误而不是 panic
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    // 设置日志级别过滤器
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // 根据配置选择日志格式
    let registry = Registry::default().with(filter);
    if config.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error() {
        let config = LoggingConfig {
            level: "warn".into(),
            format: "text".into(),
        };
        // 其他测试可能已安装过 subscriber，第一次结果不做断言
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
