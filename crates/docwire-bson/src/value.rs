//! BSON 值类型定义模块
//!
//! 定义线上格式可表示的全部值类型。类型集合是封闭的，
//! 编码、解码和长度计算都对 [`Bson`] 做穷尽匹配。

use crate::document::Document;
use crate::spec::ElementType;
use crate::{BsonError, BsonResult};
use chrono::{TimeZone, Utc};
use docwire_common::ObjectId;
use std::fmt;
use uuid::Uuid;

/// BSON 值的枚举类型
///
/// # 支持的类型
///
/// - **基础类型**: Null, Boolean, Int32/64, Double, Decimal128, String, Binary
/// - **标识类型**: ObjectId
/// - **时间类型**: DateTime(毫秒), Timestamp(复制时间戳)
/// - **复合类型**: Array, Document
/// - **特殊类型**: Regex, JavaScript, MinKey/MaxKey
/// - **历史类型**: DbPointer, Symbol
///
/// 相等比较是结构化的，不依赖重新编码：Int32 与 Int64 表示同一整数时相等，
/// 文档比较与键顺序无关，数组比较与顺序有关。
#[derive(Debug, Clone, Default)]
pub enum Bson {
    /// 空值（`undefined` 解码后也是 Null）
    #[default]
    Null,
    /// 布尔值
    Boolean(bool),
    /// 32位有符号整数
    Int32(i32),
    /// 64位有符号整数
    Int64(i64),
    /// 64位浮点数
    Double(f64),
    /// 128位十进制浮点数，按原始字节保存
    Decimal128(Decimal128),
    /// UTC 日期时间
    DateTime(DateTime),
    /// 正则表达式
    Regex(Regex),
    /// UTF-8 字符串
    String(String),
    /// 嵌套文档
    Document(Document),
    /// 值数组
    Array(Vec<Bson>),
    /// 复制时间戳
    Timestamp(Timestamp),
    /// 二进制数据
    Binary(Binary),
    /// 12字节对象标识符
    ObjectId(ObjectId),
    /// JavaScript 代码
    JavaScriptCode(String),
    /// 带作用域的 JavaScript 代码
    JavaScriptCodeWithScope(JavaScriptCodeWithScope),
    /// 小于所有值的哨兵
    MinKey,
    /// 大于所有值的哨兵
    MaxKey,
    /// 历史类型: 命名空间 + ObjectId
    DbPointer(DbPointer),
    /// 历史类型: 符号
    Symbol(String),
}

/// 128位十进制浮点数
///
/// 不做算术解释，仅保存 16 字节原始数据。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal128 {
    bytes: [u8; 16],
}

impl Decimal128 {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> [u8; 16] {
        self.bytes
    }
}

/// UTC 日期时间，单位为自 Unix 纪元起的毫秒
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateTime(i64);

impl DateTime {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.0
    }

    /// 转换为 chrono 时间
    ///
    /// # Returns
    /// 超出 chrono 可表示范围时返回 None
    pub fn to_chrono(&self) -> Option<chrono::DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }
}

impl From<chrono::DateTime<Utc>> for DateTime {
    fn from(dt: chrono::DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_chrono() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// 复制时间戳
///
/// 线上顺序为先 `increment` 后 `time`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    /// 秒级时间
    pub time: u32,
    /// 同一秒内的序号
    pub increment: u32,
}

/// 二进制子类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinarySubtype {
    Generic,
    Function,
    BinaryOld,
    UuidOld,
    Uuid,
    Md5,
    UserDefined(u8),
}

impl BinarySubtype {
    /// 0x06..0x7F 为保留值，返回 None
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Generic),
            0x01 => Some(Self::Function),
            0x02 => Some(Self::BinaryOld),
            0x03 => Some(Self::UuidOld),
            0x04 => Some(Self::Uuid),
            0x05 => Some(Self::Md5),
            b if b >= 0x80 => Some(Self::UserDefined(b)),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Generic => 0x00,
            Self::Function => 0x01,
            Self::BinaryOld => 0x02,
            Self::UuidOld => 0x03,
            Self::Uuid => 0x04,
            Self::Md5 => 0x05,
            Self::UserDefined(b) => b,
        }
    }
}

/// 带子类型的二进制数据
///
/// 子类型按原始字节保存，未知子类型也能无损往返。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binary {
    pub subtype: u8,
    pub bytes: Vec<u8>,
}

impl Binary {
    pub fn new(subtype: u8, bytes: Vec<u8>) -> Self {
        Self { subtype, bytes }
    }

    pub fn generic(bytes: Vec<u8>) -> Self {
        Self::new(BinarySubtype::Generic.to_u8(), bytes)
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self::new(BinarySubtype::Uuid.to_u8(), uuid.as_bytes().to_vec())
    }

    pub fn kind(&self) -> Option<BinarySubtype> {
        BinarySubtype::from_u8(self.subtype)
    }

    /// 子类型为 UUID 且长度为 16 时转换为 Uuid
    pub fn to_uuid(&self) -> Option<Uuid> {
        match self.kind() {
            Some(BinarySubtype::Uuid) | Some(BinarySubtype::UuidOld) => {
                Uuid::from_slice(&self.bytes).ok()
            }
            _ => None,
        }
    }
}

/// 正则表达式选项集合
///
/// 支持的字母: `i` 忽略大小写, `l` 本地化, `m` 多行,
/// `s` 点号匹配换行, `u` Unicode, `x` 忽略空白。
/// 文本形式总是按字母顺序输出。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegexOptions(u8);

impl RegexOptions {
    pub const CASE_INSENSITIVE: Self = Self(0x01);
    pub const LOCALE: Self = Self(0x02);
    pub const MULTILINE: Self = Self(0x04);
    pub const DOT_ALL: Self = Self(0x08);
    pub const UNICODE: Self = Self(0x10);
    pub const VERBOSE: Self = Self(0x20);

    /// 字母与选项的对照表，按字母顺序
    const TABLE: [(char, RegexOptions); 6] = [
        ('i', Self::CASE_INSENSITIVE),
        ('l', Self::LOCALE),
        ('m', Self::MULTILINE),
        ('s', Self::DOT_ALL),
        ('u', Self::UNICODE),
        ('x', Self::VERBOSE),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// 解析选项字母
    ///
    /// # Arguments
    /// * `letters` - 选项字母串，顺序任意，可重复
    ///
    /// # Returns
    /// 成功返回选项集合，遇到未知字母返回该字母
    pub fn parse(letters: &str) -> Result<Self, char> {
        let mut options = Self::empty();
        for c in letters.chars() {
            let (_, flag) = Self::TABLE
                .iter()
                .find(|(letter, _)| *letter == c)
                .ok_or(c)?;
            options.insert(*flag);
        }
        Ok(options)
    }
}

impl std::ops::BitOr for RegexOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for RegexOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (letter, flag) in Self::TABLE.iter() {
            if self.contains(*flag) {
                write!(f, "{}", letter)?;
            }
        }
        Ok(())
    }
}

/// 正则表达式描述: 模式 + 选项集合
///
/// 解码只校验选项字母，不编译模式，因此解码不会返回 InvalidRegularExpression；
/// 该错误只由 [`Regex::compile`] 产生。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Regex {
    pub pattern: String,
    pub options: RegexOptions,
}

impl Regex {
    pub fn new(pattern: impl Into<String>, options: RegexOptions) -> Self {
        Self {
            pattern: pattern.into(),
            options,
        }
    }

    /// 由模式和选项字母构造
    ///
    /// # Returns
    /// 选项含未知字母时返回 InvalidRegularExpressionOptions
    pub fn parse(pattern: impl Into<String>, letters: &str) -> BsonResult<Self> {
        let options = RegexOptions::parse(letters).map_err(|invalid| {
            BsonError::InvalidRegularExpressionOptions {
                options: letters.to_string(),
                invalid,
            }
        })?;
        Ok(Self::new(pattern, options))
    }

    /// 编译为可执行的正则表达式
    ///
    /// # Brief
    /// `i`、`m`、`s`、`x` 映射到对应的构建选项；`l` 没有对应项，被忽略
    ///
    /// # Returns
    /// 成功返回 `regex::Regex`，模式非法返回 InvalidRegularExpression
    pub fn compile(&self) -> BsonResult<regex::Regex> {
        regex::RegexBuilder::new(&self.pattern)
            .case_insensitive(self.options.contains(RegexOptions::CASE_INSENSITIVE))
            .multi_line(self.options.contains(RegexOptions::MULTILINE))
            .dot_matches_new_line(self.options.contains(RegexOptions::DOT_ALL))
            .ignore_whitespace(self.options.contains(RegexOptions::VERBOSE))
            .unicode(true)
            .build()
            .map_err(|e| BsonError::InvalidRegularExpression {
                pattern: self.pattern.clone(),
                message: e.to_string(),
            })
    }
}

/// 带作用域的 JavaScript 代码
#[derive(Debug, Clone, PartialEq)]
pub struct JavaScriptCodeWithScope {
    pub code: String,
    pub scope: Document,
}

/// 历史 DB 指针类型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DbPointer {
    pub namespace: String,
    pub id: ObjectId,
}

impl Bson {
    /// 获取值的类型名称
    ///
    /// # Returns
    /// 类型名称的静态字符串引用
    pub fn type_name(&self) -> &'static str {
        match self {
            Bson::Null => "null",
            Bson::Boolean(_) => "boolean",
            Bson::Int32(_) => "int32",
            Bson::Int64(_) => "int64",
            Bson::Double(_) => "double",
            Bson::Decimal128(_) => "decimal128",
            Bson::DateTime(_) => "dateTime",
            Bson::Regex(_) => "regex",
            Bson::String(_) => "string",
            Bson::Document(_) => "document",
            Bson::Array(_) => "array",
            Bson::Timestamp(_) => "timestamp",
            Bson::Binary(_) => "binary",
            Bson::ObjectId(_) => "objectId",
            Bson::JavaScriptCode(_) => "javascript",
            Bson::JavaScriptCodeWithScope(_) => "javascriptWithScope",
            Bson::MinKey => "minKey",
            Bson::MaxKey => "maxKey",
            Bson::DbPointer(_) => "dbPointer",
            Bson::Symbol(_) => "symbol",
        }
    }

    /// 获取值在线上格式中的类型标记
    pub fn element_type(&self) -> ElementType {
        match self {
            Bson::Null => ElementType::Null,
            Bson::Boolean(_) => ElementType::Boolean,
            Bson::Int32(_) => ElementType::Int32,
            Bson::Int64(_) => ElementType::Int64,
            Bson::Double(_) => ElementType::Double,
            Bson::Decimal128(_) => ElementType::Decimal128,
            Bson::DateTime(_) => ElementType::DateTime,
            Bson::Regex(_) => ElementType::Regex,
            Bson::String(_) => ElementType::String,
            Bson::Document(_) => ElementType::Document,
            Bson::Array(_) => ElementType::Array,
            Bson::Timestamp(_) => ElementType::Timestamp,
            Bson::Binary(_) => ElementType::Binary,
            Bson::ObjectId(_) => ElementType::ObjectId,
            Bson::JavaScriptCode(_) => ElementType::JavaScriptCode,
            Bson::JavaScriptCodeWithScope(_) => ElementType::JavaScriptCodeWithScope,
            Bson::MinKey => ElementType::MinKey,
            Bson::MaxKey => ElementType::MaxKey,
            Bson::DbPointer(_) => ElementType::DbPointer,
            Bson::Symbol(_) => ElementType::Symbol,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Bson::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Bson::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Bson::Int32(n) => Some(*n),
            _ => None,
        }
    }

    /// 尝试获取 i64 值
    ///
    /// # Brief
    /// Int32 和 Int64 都会转换为 i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Bson::Int32(n) => Some(*n as i64),
            Bson::Int64(n) => Some(*n),
            _ => None,
        }
    }

    /// 尝试获取 f64 值
    ///
    /// # Brief
    /// 整数类型也会转换为 f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Bson::Double(n) => Some(*n),
            Bson::Int32(n) => Some(*n as f64),
            Bson::Int64(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Bson::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Bson>> {
        match self {
            Bson::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Bson::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Bson::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Bson::ObjectId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime> {
        match self {
            Bson::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// 获取指定键的值
    ///
    /// # Brief
    /// 从文档中按键获取，或从数组中按下标字符串获取
    pub fn get(&self, key: &str) -> Option<&Bson> {
        match self {
            Bson::Document(doc) => doc.get(key),
            Bson::Array(arr) => key.parse::<usize>().ok().and_then(|i| arr.get(i)),
            _ => None,
        }
    }

    /// 按点分隔路径获取嵌套值，如 "user.tags.0"
    pub fn get_path(&self, path: &str) -> Option<&Bson> {
        let mut current = self;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }
}

impl PartialEq for Bson {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Bson::Null, Bson::Null) => true,
            (Bson::Boolean(a), Bson::Boolean(b)) => a == b,
            (Bson::Int32(a), Bson::Int32(b)) => a == b,
            (Bson::Int64(a), Bson::Int64(b)) => a == b,
            (Bson::Int32(a), Bson::Int64(b)) | (Bson::Int64(b), Bson::Int32(a)) => {
                *a as i64 == *b
            }
            (Bson::Double(a), Bson::Double(b)) => a == b,
            (Bson::Decimal128(a), Bson::Decimal128(b)) => a == b,
            (Bson::DateTime(a), Bson::DateTime(b)) => a == b,
            (Bson::Regex(a), Bson::Regex(b)) => a == b,
            (Bson::String(a), Bson::String(b)) => a == b,
            (Bson::Document(a), Bson::Document(b)) => a == b,
            (Bson::Array(a), Bson::Array(b)) => a == b,
            (Bson::Timestamp(a), Bson::Timestamp(b)) => a == b,
            (Bson::Binary(a), Bson::Binary(b)) => a == b,
            (Bson::ObjectId(a), Bson::ObjectId(b)) => a == b,
            (Bson::JavaScriptCode(a), Bson::JavaScriptCode(b)) => a == b,
            (Bson::JavaScriptCodeWithScope(a), Bson::JavaScriptCodeWithScope(b)) => a == b,
            (Bson::MinKey, Bson::MinKey) => true,
            (Bson::MaxKey, Bson::MaxKey) => true,
            (Bson::DbPointer(a), Bson::DbPointer(b)) => a == b,
            (Bson::Symbol(a), Bson::Symbol(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Bson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bson::Null => write!(f, "null"),
            Bson::Boolean(b) => write!(f, "{}", b),
            Bson::Int32(n) => write!(f, "{}", n),
            Bson::Int64(n) => write!(f, "NumberLong({})", n),
            Bson::Double(n) => write!(f, "{}", n),
            Bson::Decimal128(d) => {
                write!(f, "Decimal128(0x")?;
                for b in d.bytes().iter().rev() {
                    write!(f, "{:02x}", b)?;
                }
                write!(f, ")")
            }
            Bson::DateTime(dt) => write!(f, "DateTime(\"{}\")", dt),
            Bson::Regex(r) => write!(f, "/{}/{}", r.pattern, r.options),
            Bson::String(s) => write!(f, "\"{}\"", s),
            Bson::Document(doc) => write!(f, "{}", doc),
            Bson::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Bson::Timestamp(ts) => write!(f, "Timestamp({}, {})", ts.time, ts.increment),
            Bson::Binary(b) => write!(f, "BinData({}, <{} bytes>)", b.subtype, b.bytes.len()),
            Bson::ObjectId(id) => write!(f, "ObjectId(\"{}\")", id),
            Bson::JavaScriptCode(code) => write!(f, "JavaScript({})", code),
            Bson::JavaScriptCodeWithScope(js) => {
                write!(f, "JavaScript({}, scope: {})", js.code, js.scope)
            }
            Bson::MinKey => write!(f, "MinKey"),
            Bson::MaxKey => write!(f, "MaxKey"),
            Bson::DbPointer(p) => write!(f, "DBPointer(\"{}\", {})", p.namespace, p.id),
            Bson::Symbol(s) => write!(f, "Symbol(\"{}\")", s),
        }
    }
}

// ============================================================================
// From 特征实现 - 支持从各种 Rust 类型转换为 Bson
// ============================================================================

impl From<bool> for Bson {
    fn from(v: bool) -> Self {
        Bson::Boolean(v)
    }
}

impl From<i32> for Bson {
    fn from(v: i32) -> Self {
        Bson::Int32(v)
    }
}

impl From<i64> for Bson {
    fn from(v: i64) -> Self {
        Bson::Int64(v)
    }
}

impl From<f64> for Bson {
    fn from(v: f64) -> Self {
        Bson::Double(v)
    }
}

impl From<&str> for Bson {
    fn from(v: &str) -> Self {
        Bson::String(v.to_string())
    }
}

impl From<String> for Bson {
    fn from(v: String) -> Self {
        Bson::String(v)
    }
}

impl From<Document> for Bson {
    fn from(v: Document) -> Self {
        Bson::Document(v)
    }
}

impl From<ObjectId> for Bson {
    fn from(v: ObjectId) -> Self {
        Bson::ObjectId(v)
    }
}

impl From<DateTime> for Bson {
    fn from(v: DateTime) -> Self {
        Bson::DateTime(v)
    }
}

impl From<chrono::DateTime<Utc>> for Bson {
    fn from(v: chrono::DateTime<Utc>) -> Self {
        Bson::DateTime(v.into())
    }
}

impl From<Regex> for Bson {
    fn from(v: Regex) -> Self {
        Bson::Regex(v)
    }
}

impl From<Timestamp> for Bson {
    fn from(v: Timestamp) -> Self {
        Bson::Timestamp(v)
    }
}

impl From<Binary> for Bson {
    fn from(v: Binary) -> Self {
        Bson::Binary(v)
    }
}

impl From<Uuid> for Bson {
    fn from(v: Uuid) -> Self {
        Bson::Binary(Binary::from_uuid(v))
    }
}

impl From<Decimal128> for Bson {
    fn from(v: Decimal128) -> Self {
        Bson::Decimal128(v)
    }
}

impl From<JavaScriptCodeWithScope> for Bson {
    fn from(v: JavaScriptCodeWithScope) -> Self {
        Bson::JavaScriptCodeWithScope(v)
    }
}

impl From<DbPointer> for Bson {
    fn from(v: DbPointer) -> Self {
        Bson::DbPointer(v)
    }
}

impl<T: Into<Bson>> From<Option<T>> for Bson {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Bson::Null)
    }
}

impl<T: Into<Bson>> From<Vec<T>> for Bson {
    fn from(v: Vec<T>) -> Self {
        Bson::Array(v.into_iter().map(Into::into).collect())
    }
}

/// 构造 Bson 的便捷宏
///
/// # 示例
///
/// ```rust,ignore
/// use docwire_bson::bson;
///
/// let null = bson!(null);
/// let number = bson!(42);
/// let array = bson!([1, "two", (-3)]);
/// let doc = bson!({ "name": "test", "tags": ["a", "b"] });
/// ```
#[macro_export]
macro_rules! bson {
    (null) => {
        $crate::Bson::Null
    };
    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Bson::Array(vec![ $($crate::bson!($elem)),* ])
    };
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::Bson::Document($crate::doc! { $($key : $value),* })
    };
    ($e:expr) => {
        $crate::Bson::from($e)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_integer_widths_compare_equal() {
        assert_eq!(Bson::Int32(42), Bson::Int64(42));
        assert_eq!(Bson::Int64(-7), Bson::Int32(-7));
        assert_ne!(Bson::Int32(1), Bson::Int64(1 << 40));
        assert_ne!(Bson::Int32(1), Bson::Double(1.0));
    }

    #[test]
    fn test_sentinels_equal_only_themselves() {
        assert_eq!(Bson::MinKey, Bson::MinKey);
        assert_eq!(Bson::MaxKey, Bson::MaxKey);
        assert_ne!(Bson::MinKey, Bson::MaxKey);
        assert_ne!(Bson::MinKey, Bson::Null);
    }

    #[test]
    fn test_documents_compare_ignoring_key_order() {
        let a = doc! { "x": 1, "y": "two" };
        let b = doc! { "y": "two", "x": (1i64) };
        assert_eq!(Bson::Document(a), Bson::Document(b));
    }

    #[test]
    fn test_arrays_compare_in_order() {
        assert_eq!(bson!([1, 2]), bson!([1, 2]));
        assert_ne!(bson!([1, 2]), bson!([2, 1]));
    }

    #[test]
    fn test_regex_options_canonical_order() {
        let options = RegexOptions::parse("xmi").unwrap();
        assert_eq!(options.to_string(), "imx");
        assert_eq!(RegexOptions::parse("ilmsux").unwrap().to_string(), "ilmsux");
        assert_eq!(RegexOptions::parse("iq"), Err('q'));
    }

    #[test]
    fn test_regex_equality_uses_flag_set() {
        let a = Regex::parse("^a", "mi").unwrap();
        let b = Regex::parse("^a", "im").unwrap();
        assert_eq!(Bson::Regex(a), Bson::Regex(b));
        let c = Regex::parse("^a", "i").unwrap();
        assert_ne!(Bson::Regex(c), Bson::Regex(Regex::parse("^a", "im").unwrap()));
    }

    #[test]
    fn test_regex_parse_reports_bad_letter() {
        let err = Regex::parse("a", "iz").unwrap_err();
        match err {
            BsonError::InvalidRegularExpressionOptions { options, invalid } => {
                assert_eq!(options, "iz");
                assert_eq!(invalid, 'z');
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_regex_compile() {
        let re = Regex::parse("^hello", "i").unwrap().compile().unwrap();
        assert!(re.is_match("HELLO world"));

        let err = Regex::new("(unclosed", RegexOptions::empty()).compile().unwrap_err();
        assert!(matches!(err, BsonError::InvalidRegularExpression { .. }));
    }

    #[test]
    fn test_binary_subtypes() {
        assert_eq!(BinarySubtype::from_u8(0x04), Some(BinarySubtype::Uuid));
        assert_eq!(BinarySubtype::from_u8(0x80), Some(BinarySubtype::UserDefined(0x80)));
        assert_eq!(BinarySubtype::from_u8(0x10), None);

        let uuid = Uuid::new_v4();
        let bin = Binary::from_uuid(uuid);
        assert_eq!(bin.subtype, 0x04);
        assert_eq!(bin.to_uuid(), Some(uuid));
        assert_eq!(Binary::generic(vec![1, 2]).to_uuid(), None);
    }

    #[test]
    fn test_datetime_is_milliseconds() {
        let dt = DateTime::from_millis(1_500_000_000_123);
        let chrono_dt = dt.to_chrono().unwrap();
        assert_eq!(chrono_dt.timestamp(), 1_500_000_000);
        assert_eq!(chrono_dt.timestamp_subsec_millis(), 123);
        assert_eq!(DateTime::from(chrono_dt), dt);
    }

    #[test]
    fn test_get_path() {
        let value = bson!({ "user": { "tags": ["a", "b"] } });
        assert_eq!(value.get_path("user.tags.1").and_then(|v| v.as_str()), Some("b"));
        assert!(value.get_path("user.missing").is_none());
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Bson::from(None::<i32>), Bson::Null);
        assert_eq!(Bson::from(Some("x")), Bson::String("x".to_string()));
    }
}
