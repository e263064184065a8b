//! BSON 编码器
//!
//! 每个帧（文档、数组、带作用域的 JavaScript）前面都有自身的精确长度，
//! 而长度必须写在它描述的字节之前。两种策略获得这个长度：
//!
//! - [`SizedEncoder`]：先用 [`sizes_of`] 算出所有帧长度，再按键排序单遍写出，
//!   适用于任何只进的 [`Sink`]，输出确定
//! - [`PatchEncoder`]：按插入顺序写出，长度先写 0，结束后回填，
//!   需要可随机覆写的 [`PatchSink`]
//!
//! 两者共用同一套逐值写出逻辑 [`ElementWriter`]，区别只在 [`FrameLengths`]。

use crate::document::Document;
use crate::size::sizes_of;
use crate::spec::{END_OF_DOCUMENT, MAX_NESTING_DEPTH};
use crate::value::Bson;
use crate::{BsonError, BsonResult};
use bytes::{BufMut, BytesMut};
use std::io::Write;

/// 只进的字节输出
pub trait Sink {
    fn write_bytes(&mut self, bytes: &[u8]) -> BsonResult<()>;

    /// 已写出的字节数
    fn position(&self) -> usize;
}

/// 可在已写区域覆写 4 字节长度的输出
pub trait PatchSink: Sink {
    fn patch_i32(&mut self, offset: usize, value: i32) -> BsonResult<()>;
}

fn patch_slice(buf: &mut [u8], offset: usize, value: i32) -> BsonResult<()> {
    let target = buf.get_mut(offset..offset + 4).ok_or_else(|| {
        BsonError::InternalError(format!("patch offset {} outside written data", offset))
    })?;
    target.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

impl Sink for Vec<u8> {
    fn write_bytes(&mut self, bytes: &[u8]) -> BsonResult<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }

    fn position(&self) -> usize {
        self.len()
    }
}

impl PatchSink for Vec<u8> {
    fn patch_i32(&mut self, offset: usize, value: i32) -> BsonResult<()> {
        patch_slice(self, offset, value)
    }
}

impl Sink for BytesMut {
    fn write_bytes(&mut self, bytes: &[u8]) -> BsonResult<()> {
        self.put_slice(bytes);
        Ok(())
    }

    fn position(&self) -> usize {
        self.len()
    }
}

impl PatchSink for BytesMut {
    fn patch_i32(&mut self, offset: usize, value: i32) -> BsonResult<()> {
        patch_slice(self, offset, value)
    }
}

/// 包装 `std::io::Write` 的只进输出
#[derive(Debug)]
pub struct WriteSink<W> {
    writer: W,
    written: usize,
}

impl<W: Write> WriteSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn flush(&mut self) -> BsonResult<()> {
        self.writer
            .flush()
            .map_err(|e| BsonError::CannotWriteToStream(Some(e)))
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Sink for WriteSink<W> {
    fn write_bytes(&mut self, bytes: &[u8]) -> BsonResult<()> {
        self.writer
            .write_all(bytes)
            .map_err(|e| BsonError::CannotWriteToStream(Some(e)))?;
        self.written += bytes.len();
        Ok(())
    }

    fn position(&self) -> usize {
        self.written
    }
}

/// 文档编码策略
pub trait DocumentEncoder<S: Sink> {
    /// 把文档写入 `sink`
    ///
    /// # Returns
    /// 写出的字节数；失败时 `sink` 中的内容未定义
    fn encode(&mut self, doc: &Document, sink: &mut S) -> BsonResult<usize>;
}

/// 预计算长度策略
#[derive(Debug, Clone, Copy, Default)]
pub struct SizedEncoder {
    skip_sizes: bool,
}

impl SizedEncoder {
    pub fn new() -> Self {
        Self { skip_sizes: false }
    }

    /// 所有长度写 0，按插入顺序，不做计算
    pub fn skip_sizes(mut self, skip: bool) -> Self {
        self.skip_sizes = skip;
        self
    }
}

impl<S: Sink> DocumentEncoder<S> for SizedEncoder {
    fn encode(&mut self, doc: &Document, sink: &mut S) -> BsonResult<usize> {
        let start = sink.position();
        if self.skip_sizes {
            ElementWriter::new(sink, Zeroed).write_document(doc)?;
        } else {
            let sizes = sizes_of(doc)?;
            let mut writer = ElementWriter::new(sink, Precomputed::new(sizes));
            writer.write_document(doc)?;
            writer.lengths.finish()?;
        }
        Ok(sink.position() - start)
    }
}

/// 写后回填策略
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchEncoder {
    skip_sizes: bool,
}

impl PatchEncoder {
    pub fn new() -> Self {
        Self { skip_sizes: false }
    }

    /// 长度保持为 0，不回填
    pub fn skip_sizes(mut self, skip: bool) -> Self {
        self.skip_sizes = skip;
        self
    }
}

impl<S: PatchSink> DocumentEncoder<S> for PatchEncoder {
    fn encode(&mut self, doc: &Document, sink: &mut S) -> BsonResult<usize> {
        let start = sink.position();
        if self.skip_sizes {
            ElementWriter::new(sink, Zeroed).write_document(doc)?;
        } else {
            let mut writer = ElementWriter::new(sink, Deferred::default());
            writer.write_document(doc)?;
            let patches = writer.lengths.patches;
            for (offset, len) in patches {
                sink.patch_i32(offset, len)?;
            }
        }
        Ok(sink.position() - start)
    }
}

/// 帧长度的来源
trait FrameLengths {
    /// 遍历文档字段的顺序
    fn entries<'d>(&self, doc: &'d Document) -> Vec<(&'d str, &'d Bson)>;

    /// 帧开始，返回应写入长度字段的值
    fn open_frame(&mut self) -> BsonResult<i32>;

    /// 帧结束，`offset` 为长度字段位置，`len` 为实际长度
    fn close_frame(&mut self, offset: usize, len: usize) -> BsonResult<()>;
}

/// 从长度列表尾部弹出
struct Precomputed {
    sizes: Vec<usize>,
    open: Vec<usize>,
}

impl Precomputed {
    fn new(sizes: Vec<usize>) -> Self {
        Self {
            sizes,
            open: Vec::new(),
        }
    }

    fn finish(&self) -> BsonResult<()> {
        if !self.sizes.is_empty() {
            return Err(BsonError::InternalError(format!(
                "{} precomputed sizes left unused",
                self.sizes.len()
            )));
        }
        Ok(())
    }
}

impl FrameLengths for Precomputed {
    fn entries<'d>(&self, doc: &'d Document) -> Vec<(&'d str, &'d Bson)> {
        doc.sorted_entries()
    }

    fn open_frame(&mut self) -> BsonResult<i32> {
        let size = self
            .sizes
            .pop()
            .ok_or_else(|| BsonError::InternalError("size list exhausted".to_string()))?;
        self.open.push(size);
        frame_len(size)
    }

    fn close_frame(&mut self, _offset: usize, len: usize) -> BsonResult<()> {
        match self.open.pop() {
            Some(expected) if expected == len => Ok(()),
            Some(expected) => Err(BsonError::InternalError(format!(
                "precomputed size {} differs from written size {}",
                expected, len
            ))),
            None => Err(BsonError::InternalError("unbalanced frame".to_string())),
        }
    }
}

/// 先写 0，记录位置和长度
#[derive(Default)]
struct Deferred {
    patches: Vec<(usize, i32)>,
}

impl FrameLengths for Deferred {
    fn entries<'d>(&self, doc: &'d Document) -> Vec<(&'d str, &'d Bson)> {
        doc.iter().collect()
    }

    fn open_frame(&mut self) -> BsonResult<i32> {
        Ok(0)
    }

    fn close_frame(&mut self, offset: usize, len: usize) -> BsonResult<()> {
        self.patches.push((offset, frame_len(len)?));
        Ok(())
    }
}

/// 长度恒为 0
struct Zeroed;

impl FrameLengths for Zeroed {
    fn entries<'d>(&self, doc: &'d Document) -> Vec<(&'d str, &'d Bson)> {
        doc.iter().collect()
    }

    fn open_frame(&mut self) -> BsonResult<i32> {
        Ok(0)
    }

    fn close_frame(&mut self, _offset: usize, _len: usize) -> BsonResult<()> {
        Ok(())
    }
}

fn frame_len(len: usize) -> BsonResult<i32> {
    i32::try_from(len).map_err(|_| {
        BsonError::InvalidBsonObject(format!("frame of {} bytes exceeds the maximum length", len))
    })
}

/// 逐值写出，与解码器的类型分派一一对应
struct ElementWriter<'a, S, L> {
    sink: &'a mut S,
    lengths: L,
    depth: usize,
}

impl<'a, S: Sink, L: FrameLengths> ElementWriter<'a, S, L> {
    fn new(sink: &'a mut S, lengths: L) -> Self {
        Self {
            sink,
            lengths,
            depth: 0,
        }
    }

    fn enter(&mut self) -> BsonResult<()> {
        if self.depth > MAX_NESTING_DEPTH {
            return Err(BsonError::NestingTooDeep(MAX_NESTING_DEPTH));
        }
        self.depth += 1;
        Ok(())
    }

    fn open_frame(&mut self) -> BsonResult<usize> {
        let offset = self.sink.position();
        let len = self.lengths.open_frame()?;
        self.sink.write_bytes(&len.to_le_bytes())?;
        Ok(offset)
    }

    fn close_frame(&mut self, offset: usize) -> BsonResult<()> {
        let len = self.sink.position() - offset;
        self.lengths.close_frame(offset, len)
    }

    fn write_document(&mut self, doc: &Document) -> BsonResult<()> {
        self.enter()?;
        let offset = self.open_frame()?;
        for (key, value) in self.lengths.entries(doc) {
            self.write_element(key, value)?;
        }
        self.sink.write_bytes(&[END_OF_DOCUMENT])?;
        self.close_frame(offset)?;
        self.depth -= 1;
        Ok(())
    }

    fn write_array(&mut self, items: &[Bson]) -> BsonResult<()> {
        self.enter()?;
        let offset = self.open_frame()?;
        for (index, value) in items.iter().enumerate() {
            self.write_element(&index.to_string(), value)?;
        }
        self.sink.write_bytes(&[END_OF_DOCUMENT])?;
        self.close_frame(offset)?;
        self.depth -= 1;
        Ok(())
    }

    fn write_element(&mut self, key: &str, value: &Bson) -> BsonResult<()> {
        self.sink.write_bytes(&[value.element_type() as u8])?;
        self.write_cstring(key)?;
        self.write_value(value)
    }

    fn write_value(&mut self, value: &Bson) -> BsonResult<()> {
        match value {
            Bson::Null | Bson::MinKey | Bson::MaxKey => Ok(()),
            Bson::Boolean(b) => self.sink.write_bytes(&[*b as u8]),
            Bson::Int32(n) => self.sink.write_bytes(&n.to_le_bytes()),
            Bson::Int64(n) => self.sink.write_bytes(&n.to_le_bytes()),
            Bson::Double(n) => self.sink.write_bytes(&n.to_le_bytes()),
            Bson::Decimal128(d) => self.sink.write_bytes(&d.bytes()),
            Bson::DateTime(dt) => self.sink.write_bytes(&dt.timestamp_millis().to_le_bytes()),
            Bson::Regex(r) => {
                self.write_cstring(&r.pattern)?;
                self.write_cstring(&r.options.to_string())
            }
            Bson::String(s) | Bson::JavaScriptCode(s) | Bson::Symbol(s) => self.write_string(s),
            Bson::Document(doc) => self.write_document(doc),
            Bson::Array(items) => self.write_array(items),
            Bson::Timestamp(ts) => {
                self.sink.write_bytes(&ts.increment.to_le_bytes())?;
                self.sink.write_bytes(&ts.time.to_le_bytes())
            }
            Bson::Binary(b) => {
                let len = i32::try_from(b.bytes.len()).map_err(|_| {
                    BsonError::InvalidBsonObject(format!(
                        "binary of {} bytes exceeds the maximum length",
                        b.bytes.len()
                    ))
                })?;
                self.sink.write_bytes(&len.to_le_bytes())?;
                self.sink.write_bytes(&[b.subtype])?;
                self.sink.write_bytes(&b.bytes)
            }
            Bson::ObjectId(id) => self.sink.write_bytes(id.as_bytes()),
            Bson::JavaScriptCodeWithScope(js) => {
                let offset = self.open_frame()?;
                self.write_string(&js.code)?;
                self.write_document(&js.scope)?;
                self.close_frame(offset)
            }
            Bson::DbPointer(p) => {
                self.write_string(&p.namespace)?;
                self.sink.write_bytes(p.id.as_bytes())
            }
        }
    }

    fn write_cstring(&mut self, s: &str) -> BsonResult<()> {
        if s.as_bytes().contains(&0) {
            return Err(BsonError::UnserializableCString(s.to_string()));
        }
        self.sink.write_bytes(s.as_bytes())?;
        self.sink.write_bytes(&[0])
    }

    fn write_string(&mut self, s: &str) -> BsonResult<()> {
        let len = i32::try_from(s.len() + 1).map_err(|_| {
            BsonError::InvalidBsonObject(format!(
                "string of {} bytes exceeds the maximum length",
                s.len()
            ))
        })?;
        self.sink.write_bytes(&len.to_le_bytes())?;
        self.sink.write_bytes(s.as_bytes())?;
        self.sink.write_bytes(&[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{JavaScriptCodeWithScope, Regex};
    use crate::{bson, doc};

    fn sized(doc: &Document) -> Vec<u8> {
        let mut out = Vec::new();
        SizedEncoder::new().encode(doc, &mut out).unwrap();
        out
    }

    fn patched(doc: &Document) -> Vec<u8> {
        let mut out = Vec::new();
        PatchEncoder::new().encode(doc, &mut out).unwrap();
        out
    }

    fn hex_bytes(s: &str) -> Vec<u8> {
        hex::decode(s.replace(' ', "")).unwrap()
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(sized(&doc!()), hex_bytes("05 00 00 00 00"));
        assert_eq!(patched(&doc!()), hex_bytes("05 00 00 00 00"));
    }

    #[test]
    fn test_known_layouts() {
        let cases = [
            (
                doc! { "abc": "def" },
                "12 00 00 00 02 61 62 63 00 04 00 00 00 64 65 66 00 00",
            ),
            (
                doc! { "doc": { "abc": "def" } },
                "1C 00 00 00 03 64 6F 63 00 12 00 00 00 02 61 62 63 00 04 00 00 00 64 65 66 00 00 00",
            ),
            (
                doc! { "col": ["abc", "def", "ghi"] },
                "30 00 00 00 04 63 6F 6C 00 26 00 00 00 02 30 00 04 00 00 00 61 62 63 00 \
                 02 31 00 04 00 00 00 64 65 66 00 02 32 00 04 00 00 00 67 68 69 00 00 00",
            ),
        ];
        for (doc, expected) in cases.iter() {
            assert_eq!(sized(doc), hex_bytes(expected));
            assert_eq!(patched(doc), hex_bytes(expected));
        }
    }

    #[test]
    fn test_sized_sorts_keys_patched_keeps_order() {
        let doc = doc! { "b": 1, "a": 2 };
        let sorted = doc! { "a": 2, "b": 1 };
        assert_eq!(sized(&doc), sized(&sorted));
        assert_eq!(sized(&doc), patched(&sorted));
        assert_ne!(patched(&doc), patched(&sorted));
    }

    #[test]
    fn test_strategies_agree_on_nested_frames() {
        let doc = doc! {
            "a": { "y": null, "z": [1, { "deep": "x" }] },
            "b": [[], {}],
            "c": (JavaScriptCodeWithScope { code: "f()".to_string(), scope: doc! { "v": [true] } })
        };
        // 键已按序插入，两种策略输出相同
        assert_eq!(sized(&doc), patched(&doc));

        let reordered = doc! {
            "c": (JavaScriptCodeWithScope { code: "f()".to_string(), scope: doc! { "v": [true] } }),
            "b": [[], {}],
            "a": { "y": null, "z": [1, { "deep": "x" }] }
        };
        assert_eq!(sized(&reordered), sized(&doc));
    }

    #[test]
    fn test_javascript_with_scope_layout() {
        let js = JavaScriptCodeWithScope {
            code: "x".to_string(),
            scope: doc!(),
        };
        let bytes = sized(&doc! { "j": (js) });
        assert_eq!(
            bytes,
            hex_bytes("17 00 00 00 0F 6A 00 0F 00 00 00 02 00 00 00 78 00 05 00 00 00 00 00")
        );
    }

    #[test]
    fn test_skip_sizes() {
        let doc = doc! { "doc": { "abc": "def" } };
        let mut out = Vec::new();
        let written = PatchEncoder::new().skip_sizes(true).encode(&doc, &mut out).unwrap();
        assert_eq!(written, 28);
        assert_eq!(&out[0..4], &[0, 0, 0, 0]);
        assert_eq!(&out[9..13], &[0, 0, 0, 0]);

        let mut forward = WriteSink::new(Vec::new());
        SizedEncoder::new().skip_sizes(true).encode(&doc, &mut forward).unwrap();
        assert_eq!(forward.into_inner(), out);
    }

    #[test]
    fn test_nul_in_key() {
        let doc = doc! { "a\0b": 1 };
        let mut out = Vec::new();
        let err = PatchEncoder::new().encode(&doc, &mut out).unwrap_err();
        assert!(matches!(err, BsonError::UnserializableCString(ref s) if s == "a\0b"));
        let err = SizedEncoder::new().encode(&doc, &mut out).unwrap_err();
        assert!(matches!(err, BsonError::UnserializableCString(_)));
    }

    #[test]
    fn test_nul_in_regex_pattern() {
        let doc = doc! { "r": (Regex::parse("a\0", "i").unwrap()) };
        let mut out = Vec::new();
        let err = PatchEncoder::new().encode(&doc, &mut out).unwrap_err();
        assert!(matches!(err, BsonError::UnserializableCString(_)));
    }

    #[test]
    fn test_bytes_mut_sink() {
        let doc = doc! { "col": ["abc", "def", "ghi"] };
        let mut buf = BytesMut::new();
        let written = PatchEncoder::new().encode(&doc, &mut buf).unwrap();
        assert_eq!(written, 48);
        assert_eq!(buf.to_vec(), sized(&doc));
    }

    #[test]
    fn test_offsets_are_relative_to_existing_content() {
        let doc = doc! { "doc": { "abc": "def" } };
        let mut out = vec![0xEE, 0xEE];
        let written = PatchEncoder::new().encode(&doc, &mut out).unwrap();
        assert_eq!(written, 28);
        assert_eq!(&out[..2], &[0xEE, 0xEE]);
        assert_eq!(&out[2..], sized(&doc).as_slice());
    }

    #[test]
    fn test_write_failure() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut sink = WriteSink::new(Broken);
        let err = SizedEncoder::new().encode(&doc! { "a": 1 }, &mut sink).unwrap_err();
        match err {
            BsonError::CannotWriteToStream(Some(e)) => {
                assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_nesting_limit() {
        let mut value = bson!({});
        for _ in 0..=MAX_NESTING_DEPTH {
            value = bson!([(value)]);
        }
        let doc = doc! { "n": (value) };
        let mut out = Vec::new();
        let err = PatchEncoder::new().encode(&doc, &mut out).unwrap_err();
        assert!(matches!(err, BsonError::NestingTooDeep(_)));
    }
}
