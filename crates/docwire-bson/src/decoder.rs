//! BSON 解码器
//!
//! 基于 [`ByteSource`] 的递归流式解码。每进入一个帧都把字节源的上限收紧到
//! `min(外层上限, 帧起点 + 声明长度)`，退出时恢复，损坏的嵌套长度因此无法
//! 读出父帧的范围。

use crate::document::Document;
use crate::source::{ByteSource, SourceError};
use crate::spec::{ElementType, END_OF_DOCUMENT, MAX_NESTING_DEPTH, MIN_DOCUMENT_SIZE};
use crate::value::{
    Binary, Bson, DateTime, DbPointer, Decimal128, JavaScriptCodeWithScope, Regex, RegexOptions,
    Timestamp,
};
use crate::{BsonError, BsonResult};
use compact_str::CompactString;
use docwire_common::ObjectId;
use tracing::trace;

/// 越过帧上限视为长度错误，其余字节源错误原样返回
fn map_source(e: SourceError) -> BsonError {
    match e {
        SourceError::CeilingReached { .. } => BsonError::InvalidLength,
        other => BsonError::Source(other),
    }
}

/// BSON 解码器
///
/// 从字节源中读取恰好一个顶层文档，结束后字节源停在文档之后。
pub struct Decoder<'s, S: ByteSource> {
    source: &'s mut S,
    depth: usize,
}

impl<'s, S: ByteSource> Decoder<'s, S> {
    pub fn new(source: &'s mut S) -> Self {
        Self { source, depth: 0 }
    }

    /// 解码一个文档
    ///
    /// # Brief
    /// 从字节源当前位置读取一个完整的文档帧
    ///
    /// # Returns
    /// 成功返回 Document；任何错误都不会返回部分文档
    pub fn decode_document(&mut self) -> BsonResult<Document> {
        self.read_frame(|_, _| Ok(()))
    }

    /// 读取一个帧，`check_key` 收到当前键和同一帧内的上一个键
    fn read_frame<F>(&mut self, check_key: F) -> BsonResult<Document>
    where
        F: FnMut(&str, Option<&str>) -> BsonResult<()>,
    {
        if self.depth > MAX_NESTING_DEPTH {
            return Err(BsonError::NestingTooDeep(MAX_NESTING_DEPTH));
        }
        self.depth += 1;
        let outer = self.source.ceiling();
        let result = self.read_frame_within(outer, check_key);
        self.source.set_ceiling(outer);
        self.depth -= 1;
        result
    }

    fn read_frame_within<F>(&mut self, outer: Option<usize>, mut check_key: F) -> BsonResult<Document>
    where
        F: FnMut(&str, Option<&str>) -> BsonResult<()>,
    {
        let start = self.source.position();
        self.source.set_ceiling(Some(clamp(outer, start + 4)));
        let declared = self.source.read_i32_le().map_err(map_source)?;
        if declared < MIN_DOCUMENT_SIZE as i32 {
            return Err(BsonError::DataTooSmall);
        }
        let declared = declared as usize;
        self.source.set_ceiling(Some(clamp(outer, start + declared)));
        trace!("frame at {} declares {} bytes", start, declared);

        let mut doc = Document::new();
        let mut previous: Option<CompactString> = None;
        loop {
            let tag = self.source.read_u8().map_err(map_source)?;
            if tag == END_OF_DOCUMENT {
                break;
            }
            let element_type = ElementType::from_u8(tag).ok_or(BsonError::InvalidElementType(tag))?;
            let key = CompactString::from(self.read_cstring()?);
            check_key(&key, previous.as_deref())?;
            let value = self.read_value(element_type)?;
            doc.insert(key.clone(), value);
            previous = Some(key);
        }

        if self.source.position() - start != declared {
            return Err(BsonError::InvalidLength);
        }
        Ok(doc)
    }

    fn read_array(&mut self) -> BsonResult<Vec<Bson>> {
        let mut count = 0usize;
        let doc = self.read_frame(|key, previous| {
            if key != count.to_string() {
                return Err(BsonError::InvalidArrayKey {
                    current: key.to_string(),
                    previous: previous.map(str::to_string),
                });
            }
            count += 1;
            Ok(())
        })?;
        Ok(doc.into_iter().map(|(_, v)| v).collect())
    }

    fn read_value(&mut self, element_type: ElementType) -> BsonResult<Bson> {
        let value = match element_type {
            ElementType::Double => Bson::Double(self.source.read_f64_le().map_err(map_source)?),
            ElementType::String => Bson::String(self.read_string()?),
            ElementType::Document => Bson::Document(self.read_frame(|_, _| Ok(()))?),
            ElementType::Array => Bson::Array(self.read_array()?),
            ElementType::Binary => Bson::Binary(self.read_binary()?),
            ElementType::Undefined | ElementType::Null => Bson::Null,
            ElementType::ObjectId => Bson::ObjectId(self.read_object_id()?),
            ElementType::Boolean => match self.source.read_u8().map_err(map_source)? {
                0 => Bson::Boolean(false),
                1 => Bson::Boolean(true),
                other => return Err(BsonError::InvalidBooleanValue(other)),
            },
            ElementType::DateTime => {
                Bson::DateTime(DateTime::from_millis(self.source.read_i64_le().map_err(map_source)?))
            }
            ElementType::Regex => {
                let pattern = self.read_cstring()?;
                let letters = self.read_cstring()?;
                let options = RegexOptions::parse(&letters).map_err(|invalid| {
                    BsonError::InvalidRegularExpressionOptions {
                        options: letters.clone(),
                        invalid,
                    }
                })?;
                Bson::Regex(Regex::new(pattern, options))
            }
            ElementType::DbPointer => {
                let namespace = self.read_string()?;
                let id = self.read_object_id()?;
                Bson::DbPointer(DbPointer { namespace, id })
            }
            ElementType::JavaScriptCode => Bson::JavaScriptCode(self.read_string()?),
            ElementType::Symbol => Bson::Symbol(self.read_string()?),
            ElementType::JavaScriptCodeWithScope => {
                Bson::JavaScriptCodeWithScope(self.read_javascript_with_scope()?)
            }
            ElementType::Int32 => Bson::Int32(self.source.read_i32_le().map_err(map_source)?),
            ElementType::Timestamp => {
                let increment = self.source.read_u32_le().map_err(map_source)?;
                let time = self.source.read_u32_le().map_err(map_source)?;
                Bson::Timestamp(Timestamp { time, increment })
            }
            ElementType::Int64 => Bson::Int64(self.source.read_i64_le().map_err(map_source)?),
            ElementType::Decimal128 => {
                Bson::Decimal128(Decimal128::from_bytes(self.source.read_array().map_err(map_source)?))
            }
            ElementType::MaxKey => Bson::MaxKey,
            ElementType::MinKey => Bson::MinKey,
        };
        Ok(value)
    }

    fn read_cstring(&mut self) -> BsonResult<String> {
        let bytes = self.source.read_until(0).map_err(map_source)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| BsonError::InvalidString(e.into_bytes()))
    }

    /// 长度前缀字符串: i32 (字节数 + 1), 字节, NUL
    fn read_string(&mut self) -> BsonResult<String> {
        let len = self.source.read_i32_le().map_err(map_source)?;
        if len < 1 {
            return Err(BsonError::InvalidLength);
        }
        let bytes = self.source.read_exact_owned(len as usize - 1).map_err(map_source)?;
        match self.source.read_u8() {
            Ok(0) => {}
            Ok(other) => return Err(BsonError::InvalidEndOfString(Some(other))),
            Err(SourceError::EndOfInput { .. }) => return Err(BsonError::InvalidEndOfString(None)),
            Err(e) => return Err(map_source(e)),
        }
        String::from_utf8(bytes).map_err(|e| BsonError::InvalidString(e.into_bytes()))
    }

    fn read_binary(&mut self) -> BsonResult<Binary> {
        let len = self.source.read_i32_le().map_err(map_source)?;
        if len < 0 {
            return Err(BsonError::InvalidLength);
        }
        let subtype = self.source.read_u8().map_err(map_source)?;
        let bytes = self.source.read_exact_owned(len as usize).map_err(map_source)?;
        Ok(Binary::new(subtype, bytes))
    }

    fn read_object_id(&mut self) -> BsonResult<ObjectId> {
        Ok(ObjectId::from_bytes(self.source.read_array().map_err(map_source)?))
    }

    /// i32 总长度, 代码字符串, 作用域文档；总长度必须等于实际消耗
    fn read_javascript_with_scope(&mut self) -> BsonResult<JavaScriptCodeWithScope> {
        let start = self.source.position();
        let total = self.source.read_i32_le().map_err(map_source)?;
        if total < 0 {
            return Err(BsonError::InvalidLength);
        }
        let code = self.read_string()?;
        let scope = self.read_frame(|_, _| Ok(()))?;
        let actual = self.source.position() - start;
        if actual != total as usize {
            return Err(BsonError::InvalidJSWithScopeLength {
                expected: total as usize,
                actual,
            });
        }
        Ok(JavaScriptCodeWithScope { code, scope })
    }
}

fn clamp(outer: Option<usize>, limit: usize) -> usize {
    match outer {
        Some(c) => c.min(limit),
        None => limit,
    }
}
