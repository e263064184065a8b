//! 编解码入口
//!
//! 把字节源、解码器、编码器组合成常用的调用形式：
//!
//! - 缓冲区解码 [`decode`] 要求缓冲区长度与声明长度完全一致
//! - 流解码 [`decode_reader`] / [`decode_from`] 只读取声明长度，可在同一字节源上连续调用
//! - [`encode`] 使用回填策略，保持插入顺序
//! - [`encode_to_sink`] / [`encode_to_writer`] 使用预计算策略，按键排序单遍写出

use crate::decoder::Decoder;
use crate::document::Document;
use crate::encoder::{DocumentEncoder, PatchEncoder, SizedEncoder, Sink, WriteSink};
use crate::size::sizes_of;
use crate::source::{ByteSource, SliceSource, StreamSource};
use crate::spec::MIN_DOCUMENT_SIZE;
use crate::{BsonError, BsonResult};
use bytes::BytesMut;
use docwire_common::{StreamConfig, WriteConfig};
use std::io::{Read, Write};
use tracing::debug;

/// 解码选项，目前没有可调项
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {}

/// 编码选项
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// 所有长度字段写 0，输出不是合法文档，只用于测量写出开销
    pub skip_sizes: bool,
}

impl From<&WriteConfig> for WriteOptions {
    fn from(config: &WriteConfig) -> Self {
        Self {
            skip_sizes: config.skip_sizes,
        }
    }
}

/// 从完整缓冲区解码文档
///
/// # Brief
/// 缓冲区必须恰好包含一个文档，多余或缺少的字节都视为错误
///
/// # Arguments
/// * `data` - 文档字节
/// * `_options` - 解码选项
///
/// # Returns
/// 不足 5 字节返回 DataTooSmall；长度不符返回 DataLengthDoNotMatch
pub fn decode(data: &[u8], _options: &ReadOptions) -> BsonResult<Document> {
    if data.len() < MIN_DOCUMENT_SIZE {
        return Err(BsonError::DataTooSmall);
    }
    let declared = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if declared < MIN_DOCUMENT_SIZE as i32 {
        return Err(BsonError::DataTooSmall);
    }
    if declared as usize != data.len() {
        return Err(BsonError::DataLengthDoNotMatch {
            declared: declared as usize,
            actual: data.len(),
        });
    }

    let mut source = SliceSource::new(data);
    let doc = Decoder::new(&mut source).decode_document()?;
    debug!(bytes = data.len(), fields = doc.len(), "decoded document from buffer");
    Ok(doc)
}

/// 从任意 `Read` 解码一个文档，使用默认缓冲区配置
///
/// 读取恰好一个文档，reader 停在文档之后。
pub fn decode_reader<R: Read>(reader: R, options: &ReadOptions) -> BsonResult<Document> {
    decode_reader_with(reader, &StreamConfig::default(), options)
}

/// 从任意 `Read` 解码一个文档
///
/// # Arguments
/// * `reader` - 数据来源
/// * `config` - 初始缓冲区大小与增长步长
/// * `options` - 解码选项
pub fn decode_reader_with<R: Read>(
    reader: R,
    config: &StreamConfig,
    options: &ReadOptions,
) -> BsonResult<Document> {
    let mut source = StreamSource::with_config(reader, config);
    decode_from(&mut source, options)
}

/// 从字节源的当前位置解码一个文档
///
/// # Brief
/// 字节源停在文档末尾，可以继续读取下一个文档
pub fn decode_from<S: ByteSource>(source: &mut S, _options: &ReadOptions) -> BsonResult<Document> {
    let start = source.position();
    let doc = Decoder::new(source).decode_document()?;
    debug!(
        bytes = source.position() - start,
        fields = doc.len(),
        "decoded document from source"
    );
    Ok(doc)
}

/// 编码文档为字节向量
///
/// # Brief
/// 按插入顺序写出，帧长度先占位后回填
///
/// # Returns
/// 成功返回文档字节；键含 NUL 返回 UnserializableCString
pub fn encode(doc: &Document, options: &WriteOptions) -> BsonResult<Vec<u8>> {
    let mut buf = BytesMut::with_capacity(256);
    let written = PatchEncoder::new()
        .skip_sizes(options.skip_sizes)
        .encode(doc, &mut buf)?;
    debug!(bytes = written, "encoded document");
    Ok(buf.to_vec())
}

/// 编码文档到只进输出
///
/// # Brief
/// 先计算全部帧长度，再按键排序单遍写出，相同内容的文档输出相同
///
/// # Returns
/// 写出的字节数
pub fn encode_to_sink<S: Sink>(doc: &Document, sink: &mut S, options: &WriteOptions) -> BsonResult<usize> {
    let written = SizedEncoder::new()
        .skip_sizes(options.skip_sizes)
        .encode(doc, sink)?;
    debug!(bytes = written, "encoded document to sink");
    Ok(written)
}

/// 编码文档到 `Write`，结束后 flush
pub fn encode_to_writer<W: Write>(doc: &Document, writer: W, options: &WriteOptions) -> BsonResult<usize> {
    let mut sink = WriteSink::new(writer);
    let written = encode_to_sink(doc, &mut sink, options)?;
    sink.flush()?;
    Ok(written)
}

/// 文档能否被编码
pub fn is_valid(doc: &Document) -> bool {
    sizes_of(doc).is_ok()
}
