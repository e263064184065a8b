//! 长度计算模块
//!
//! 不做任何 I/O，递归计算文档及每个嵌套帧编码后的精确长度。
//!
//! 返回的长度列表供 [`SizedEncoder`](crate::SizedEncoder) 从尾部逐个弹出：
//! 键按逆序遍历、数组元素按逆序遍历，内层帧先于外层帧入列，顶层长度最后入列，
//! 因此弹出顺序正好是按键排序编码时遇到各帧的顺序。

use crate::document::Document;
use crate::spec::{MAX_NESTING_DEPTH, MIN_DOCUMENT_SIZE};
use crate::value::Bson;
use crate::{BsonError, BsonResult};

/// 计算文档所有帧的长度列表
///
/// # Brief
/// 列表最后一项是顶层文档的总长度
///
/// # Arguments
/// * `doc` - 要计算的文档
///
/// # Returns
/// 成功返回长度列表；键含 NUL 返回 UnserializableCString，
/// 长度超出 i32 返回 InvalidBsonObject
pub fn sizes_of(doc: &Document) -> BsonResult<Vec<usize>> {
    let mut sizes = Vec::new();
    let total = document_size(doc, &mut sizes, 0)?;
    sizes.push(total);
    Ok(sizes)
}

/// 只计算顶层文档的总长度
pub fn frame_size(doc: &Document) -> BsonResult<usize> {
    let mut scratch = Vec::new();
    document_size(doc, &mut scratch, 0)
}

fn document_size(doc: &Document, sizes: &mut Vec<usize>, depth: usize) -> BsonResult<usize> {
    if depth > MAX_NESTING_DEPTH {
        return Err(BsonError::NestingTooDeep(MAX_NESTING_DEPTH));
    }
    let mut body = 0;
    for (key, value) in doc.sorted_entries().into_iter().rev() {
        body += element_size(key, value, sizes, depth)?;
    }
    check_frame(MIN_DOCUMENT_SIZE + body)
}

fn array_size(items: &[Bson], sizes: &mut Vec<usize>, depth: usize) -> BsonResult<usize> {
    if depth > MAX_NESTING_DEPTH {
        return Err(BsonError::NestingTooDeep(MAX_NESTING_DEPTH));
    }
    let mut body = 0;
    for (index, value) in items.iter().enumerate().rev() {
        body += 1 + decimal_len(index) + 1 + value_size(value, sizes, depth)?;
    }
    check_frame(MIN_DOCUMENT_SIZE + body)
}

fn element_size(key: &str, value: &Bson, sizes: &mut Vec<usize>, depth: usize) -> BsonResult<usize> {
    Ok(1 + cstring_size(key)? + value_size(value, sizes, depth)?)
}

fn value_size(value: &Bson, sizes: &mut Vec<usize>, depth: usize) -> BsonResult<usize> {
    let size = match value {
        Bson::Null
        | Bson::MinKey
        | Bson::MaxKey
        | Bson::Boolean(_)
        | Bson::Int32(_)
        | Bson::Int64(_)
        | Bson::Double(_)
        | Bson::DateTime(_)
        | Bson::Timestamp(_)
        | Bson::Decimal128(_)
        | Bson::ObjectId(_) => value.element_type().fixed_size().ok_or_else(|| {
            BsonError::InternalError(format!("{} has no fixed width", value.type_name()))
        })?,
        Bson::String(s) | Bson::JavaScriptCode(s) | Bson::Symbol(s) => string_size(s)?,
        Bson::Regex(r) => cstring_size(&r.pattern)? + r.options.to_string().len() + 1,
        Bson::Binary(b) => {
            if i32::try_from(b.bytes.len()).is_err() {
                return Err(BsonError::InvalidBsonObject(format!(
                    "binary of {} bytes exceeds the maximum length",
                    b.bytes.len()
                )));
            }
            4 + 1 + b.bytes.len()
        }
        Bson::DbPointer(p) => string_size(&p.namespace)? + 12,
        Bson::Document(doc) => {
            let total = document_size(doc, sizes, depth + 1)?;
            sizes.push(total);
            total
        }
        Bson::Array(items) => {
            let total = array_size(items, sizes, depth + 1)?;
            sizes.push(total);
            total
        }
        Bson::JavaScriptCodeWithScope(js) => {
            let scope = document_size(&js.scope, sizes, depth + 1)?;
            sizes.push(scope);
            let total = check_frame(4 + string_size(&js.code)? + scope)?;
            sizes.push(total);
            total
        }
    };
    Ok(size)
}

/// cstring 长度（含结尾 NUL）
fn cstring_size(s: &str) -> BsonResult<usize> {
    if s.as_bytes().contains(&0) {
        return Err(BsonError::UnserializableCString(s.to_string()));
    }
    Ok(s.len() + 1)
}

/// 长度前缀字符串的总长度: 4 + 字节数 + 1
fn string_size(s: &str) -> BsonResult<usize> {
    if i32::try_from(s.len() + 1).is_err() {
        return Err(BsonError::InvalidBsonObject(format!(
            "string of {} bytes exceeds the maximum length",
            s.len()
        )));
    }
    Ok(4 + s.len() + 1)
}

fn check_frame(total: usize) -> BsonResult<usize> {
    if i32::try_from(total).is_err() {
        return Err(BsonError::InvalidBsonObject(format!(
            "frame of {} bytes exceeds the maximum length",
            total
        )));
    }
    Ok(total)
}

/// 数组下标的十进制位数
pub(crate) fn decimal_len(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{JavaScriptCodeWithScope, Regex};
    use crate::{bson, doc};

    #[test]
    fn test_empty_document() {
        assert_eq!(sizes_of(&doc!()).unwrap(), vec![5]);
    }

    #[test]
    fn test_flat_document() {
        assert_eq!(sizes_of(&doc! { "abc": "def" }).unwrap(), vec![18]);
    }

    #[test]
    fn test_nested_document() {
        let doc = doc! { "doc": { "abc": "def" } };
        assert_eq!(sizes_of(&doc).unwrap(), vec![18, 28]);
    }

    #[test]
    fn test_array() {
        let doc = doc! { "col": ["abc", "def", "ghi"] };
        assert_eq!(sizes_of(&doc).unwrap(), vec![38, 48]);
    }

    #[test]
    fn test_array_of_documents_is_reversed() {
        let doc = doc! { "": [{ "abc": "def" }, { "g": "h" }] };
        assert_eq!(sizes_of(&doc).unwrap(), vec![14, 18, 43, 50]);
    }

    #[test]
    fn test_sibling_frames_follow_reverse_key_order() {
        let doc = doc! { "b": { "x": 1 }, "a": { "long": "value" } };
        let sizes = sizes_of(&doc).unwrap();
        // "b" 的帧先入列，"a" 的帧后入列，弹出时先得到 "a"
        assert_eq!(sizes[0], frame_size(&doc! { "x": 1 }).unwrap());
        assert_eq!(sizes[1], frame_size(&doc! { "long": "value" }).unwrap());
        assert_eq!(sizes.len(), 3);
    }

    #[test]
    fn test_javascript_with_scope() {
        let js = JavaScriptCodeWithScope {
            code: "x".to_string(),
            scope: doc! { "x": 1 },
        };
        let doc = doc! { "js": (js) };
        // scope: 4 + (1 + 2 + 4) + 1 = 12; js: 4 + 6 + 12 = 22
        assert_eq!(sizes_of(&doc).unwrap(), vec![12, 22, 4 + 1 + 3 + 22 + 1]);
    }

    #[test]
    fn test_scalar_widths() {
        let doc = doc! {
            "n": null,
            "b": true,
            "i": 1,
            "l": (1i64),
            "d": 1.5,
            "r": (Regex::parse("a", "mi").unwrap())
        };
        let expected = 4
            + (1 + 2)
            + (1 + 2 + 1)
            + (1 + 2 + 4)
            + (1 + 2 + 8)
            + (1 + 2 + 8)
            + (1 + 2 + 2 + 3)
            + 1;
        assert_eq!(frame_size(&doc).unwrap(), expected);
    }

    #[test]
    fn test_nul_in_key_is_rejected() {
        let doc = doc! { "bad\0key": 1 };
        match sizes_of(&doc).unwrap_err() {
            BsonError::UnserializableCString(s) => assert_eq!(s, "bad\0key"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_nul_in_regex_pattern_is_rejected() {
        let doc = doc! { "r": (Regex::parse("a\0b", "").unwrap()) };
        assert!(matches!(sizes_of(&doc), Err(BsonError::UnserializableCString(_))));
    }

    #[test]
    fn test_nul_inside_string_value_is_allowed() {
        let doc = doc! { "s": "a\0b" };
        assert_eq!(frame_size(&doc).unwrap(), 4 + 1 + 2 + 4 + 3 + 1 + 1);
    }

    #[test]
    fn test_nesting_limit() {
        let mut value = bson!({});
        for _ in 0..=MAX_NESTING_DEPTH {
            value = bson!({ "n": (value) });
        }
        let doc = doc! { "n": (value) };
        assert!(matches!(sizes_of(&doc), Err(BsonError::NestingTooDeep(_))));
    }

    #[test]
    fn test_decimal_len() {
        assert_eq!(decimal_len(0), 1);
        assert_eq!(decimal_len(9), 1);
        assert_eq!(decimal_len(10), 2);
        assert_eq!(decimal_len(12345), 5);
    }
}
