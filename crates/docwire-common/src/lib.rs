//! # docwire-common
//!
//! docwire 各 crate 共享的基础设施：
//!
//! - [`ObjectId`]：12 字节对象标识符
//! - [`config`]：编解码配置，支持从 TOML 加载
//! - [`logging`]：基于 tracing-subscriber 的日志初始化
//! - [`CommonError`]：统一错误类型

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{CodecConfig, LogConfig, StreamConfig, WriteConfig};
pub use error::{CommonError, CommonResult};
pub use types::*;
