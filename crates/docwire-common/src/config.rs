//! 编解码配置模块
//!
//! 本模块定义了 docwire 的配置选项:
//! - 流式读取缓冲区配置(初始大小、增长步长)
//! - 写入配置(是否跳过长度字段)
//! - 日志配置
//!
//! 支持从 TOML 文件加载配置。

use crate::error::{CommonError, CommonResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 编解码主配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// 流式读取配置
    #[serde(default)]
    pub stream: StreamConfig,

    /// 写入配置
    #[serde(default)]
    pub write: WriteConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 流式读取缓冲区配置
///
/// 缓冲区从 `buffer_size` 起步，单次读取超出剩余容量时按
/// `old + min(old, buffer_increment)` 增长，且从不缩小。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// 初始缓冲区大小(字节) (默认: 1 MiB)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// 单次增长的上限(字节) (默认: 1024)
    #[serde(default = "default_buffer_increment")]
    pub buffer_increment: usize,
}

/// 写入配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteConfig {
    /// 所有长度字段写 0 (默认: false)
    #[serde(default)]
    pub skip_sizes: bool,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别 (默认: info)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 以 JSON 行输出 (默认: false)
    #[serde(default)]
    pub json: bool,
}

fn default_buffer_size() -> usize {
    1024 * 1024
}

fn default_buffer_increment() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            buffer_increment: default_buffer_increment(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl CodecConfig {
    /// # Brief
    /// 从 TOML 文件加载配置
    ///
    /// # Arguments
    /// * `path` - 配置文件路径
    ///
    /// # Returns
    /// 解析后的配置实例
    pub fn load(path: &Path) -> CommonResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// # Brief
    /// 从 TOML 字符串解析配置，缺省字段使用默认值
    pub fn from_toml_str(content: &str) -> CommonResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| CommonError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// # Brief
    /// 将配置序列化为 TOML 字符串
    pub fn to_toml(&self) -> CommonResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CommonError::Config(format!("Failed to serialize config: {}", e)))
    }

    fn validate(&self) -> CommonResult<()> {
        // 缓冲区为 0 时增长公式无法前进
        if self.stream.buffer_size == 0 {
            return Err(CommonError::Config(
                "stream.buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.stream.buffer_increment == 0 {
            return Err(CommonError::Config(
                "stream.buffer_increment must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
