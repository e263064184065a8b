//! # docwire-bson
//!
//! 流式 BSON 编解码器。线上格式与 MongoDB 的 BSON 完全一致
//! （小端序、长度前缀、类型标记字节）。
//!
//! - **字节源**：[`SliceSource`] 对内存缓冲区零拷贝读取，
//!   [`StreamSource`] 对任意 `Read` 增量读取，二者都支持读取上限（ceiling）
//! - **解码**：递归解码文档与数组，边读边校验长度和数组键
//! - **编码**：预先计算长度（[`SizedEncoder`]，键排序，适合只进流）
//!   或先写占位再回填（[`PatchEncoder`]，保持插入顺序）
//! - **扩展 JSON**：[`json`] 模块提供与 `serde_json::Value` 的互转
//!
//! ## 快速开始
//!
//! ```rust,ignore
//! use docwire_bson::{doc, decode, encode, ReadOptions, WriteOptions};
//!
//! let doc = doc! { "name": "docwire", "version": 1 };
//! let bytes = encode(&doc, &WriteOptions::default()).unwrap();
//! let back = decode(&bytes, &ReadOptions::default()).unwrap();
//! assert_eq!(doc, back);
//! ```

pub mod codec;
pub mod decoder;
pub mod document;
pub mod encoder;
pub mod json;
pub mod size;
pub mod source;
pub mod spec;
pub mod value;

pub use codec::{
    decode, decode_from, decode_reader, decode_reader_with, encode, encode_to_sink,
    encode_to_writer, is_valid, ReadOptions, WriteOptions,
};
pub use decoder::Decoder;
pub use document::Document;
pub use docwire_common::ObjectId;
pub use encoder::{DocumentEncoder, PatchEncoder, PatchSink, SizedEncoder, Sink, WriteSink};
pub use size::{frame_size, sizes_of};
pub use source::{ByteSource, SliceSource, SourceError, StreamSource};
pub use spec::ElementType;
pub use value::{
    Binary, BinarySubtype, Bson, DateTime, DbPointer, Decimal128, JavaScriptCodeWithScope, Regex,
    RegexOptions, Timestamp,
};

use thiserror::Error;

/// BSON 编解码的错误类型
///
/// 所有错误对当前调用都是致命的：解码失败不会返回部分文档，
/// 编码失败时目标缓冲区的内容未定义，调用方应丢弃。
#[derive(Error, Debug)]
pub enum BsonError {
    /// 数据不足 5 字节，或声明的文档长度小于 5
    #[error("Data too small to contain a document")]
    DataTooSmall,

    /// 缓冲区长度与文档声明的长度不一致
    #[error("Data length does not match declared length: declared {declared}, actual {actual}")]
    DataLengthDoNotMatch { declared: usize, actual: usize },

    /// 帧实际消耗的字节数与声明长度不符，或读取越过了帧边界
    #[error("Invalid length")]
    InvalidLength,

    /// 未知的类型标记字节
    #[error("Invalid element type: 0x{0:02X}")]
    InvalidElementType(u8),

    /// 布尔值既不是 0 也不是 1
    #[error("Invalid boolean value: 0x{0:02X}")]
    InvalidBooleanValue(u8),

    /// 字符串不是有效的 UTF-8
    #[error("Invalid UTF-8 string ({} bytes)", .0.len())]
    InvalidString(Vec<u8>),

    /// 字符串结尾不是 NUL
    #[error("Invalid end of string: {0:?}")]
    InvalidEndOfString(Option<u8>),

    /// 数组键不是期望的下标
    #[error("Invalid array key {current:?} (previous key: {previous:?})")]
    InvalidArrayKey {
        current: String,
        previous: Option<String>,
    },

    /// 正则选项中出现不支持的字母
    #[error("Invalid regular expression options {options:?}: unexpected {invalid:?}")]
    InvalidRegularExpressionOptions { options: String, invalid: char },

    /// 正则表达式无法编译
    #[error("Invalid regular expression {pattern:?}: {message}")]
    InvalidRegularExpression { pattern: String, message: String },

    /// JavaScript-with-scope 的总长度与实际消耗不符
    #[error("Invalid javascript-with-scope length: expected {expected}, actual {actual}")]
    InvalidJSWithScopeLength { expected: usize, actual: usize },

    /// 嵌套层级过深
    #[error("Nesting too deep: max {0}")]
    NestingTooDeep(usize),

    /// 写入目标失败
    #[error("Cannot write to stream: {0:?}")]
    CannotWriteToStream(Option<std::io::Error>),

    /// 文档无法编码（长度超出 i32 范围等）
    #[error("Invalid BSON object: {0}")]
    InvalidBsonObject(String),

    /// 键或正则组件包含 NUL
    #[error("Unserializable cstring: {0:?}")]
    UnserializableCString(String),

    /// 字节源错误
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// 扩展 JSON 转换错误
    #[error("JSON error: {0}")]
    Json(String),

    /// 内部不变量被破坏
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// BSON 操作的 Result 类型别名
pub type BsonResult<T> = Result<T, BsonError>;
