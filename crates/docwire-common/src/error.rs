//! 错误类型定义模块
//!
//! 定义 docwire 公共层的错误类型 CommonError 和 Result 别名。

use thiserror::Error;

/// 公共层错误类型
#[derive(Error, Debug)]
pub enum CommonError {
    /// I/O 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 配置读取或解析失败
    #[error("Config error: {0}")]
    Config(String),

    /// ObjectId 无效
    #[error("Invalid ObjectId: {0}")]
    InvalidObjectId(String),
}

/// 公共层 Result 类型别名
pub type CommonResult<T> = Result<T, CommonError>;
