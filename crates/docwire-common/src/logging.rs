//! 日志初始化模块
//!
//! 编解码器内部只使用 `tracing` 宏，由调用方决定是否安装 subscriber。

use crate::config::LogConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化文本格式日志
///
/// # Brief
/// `RUST_LOG` 环境变量优先于传入的级别
///
/// # Arguments
/// * `level` - 默认日志级别，如 "info"、"debug"
pub fn init_logging(level: &str) {
    install(level, false);
}

/// 按配置初始化日志
///
/// # Brief
/// `config.json` 为 true 时每条事件输出为一行 JSON
pub fn init_from_config(config: &LogConfig) {
    install(&config.level, config.json);
}

fn install(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let text = (!json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });
    let json = json.then(|| fmt::layer().json().with_current_span(false));

    // 已安装过 subscriber 时保留原有的
    let _ = tracing_subscriber::registry()
        .with(text)
        .with(json)
        .with(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging("debug");
        init_from_config(&LogConfig {
            level: "trace".to_string(),
            json: true,
        });
        tracing::info!(buffer_size = 1024, "logging initialised");
    }
}
