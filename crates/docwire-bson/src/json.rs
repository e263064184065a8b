//! BSON 与 JSON 互转模块
//!
//! JSON 没有的类型使用扩展 JSON 包装对象表示，转换后再转回得到相同的值。

use crate::document::Document;
use crate::value::{
    Binary, Bson, DateTime, DbPointer, Decimal128, JavaScriptCodeWithScope, Regex, Timestamp,
};
use crate::{BsonError, BsonResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use docwire_common::ObjectId;
use serde_json::{json, Map, Number, Value as JsonValue};

fn json_error(message: impl Into<String>) -> BsonError {
    BsonError::Json(message.into())
}

/// 将 Bson 转换为 JSON
///
/// # Brief
/// 将 BSON 值转换为 JSON 值，复杂类型使用扩展 JSON 格式
///
/// # 扩展 JSON 格式
/// - ObjectId: `{"$oid": "507f1f77bcf86cd799439011"}`
/// - DateTime: `{"$date": 1234567890000}`
/// - Int64: `{"$numberLong": "1099511627776"}`
/// - 非有限 Double: `{"$numberDouble": "NaN"}`
/// - Regex: `{"$regex": "pattern", "$options": "i"}`
/// - Binary: `{"$binary": {"base64": "...", "subType": "00"}}`
/// - Timestamp: `{"$timestamp": {"t": 1, "i": 2}}`
/// - JavaScript: `{"$code": "..."}`，带作用域时附加 `"$scope": {...}`
/// - Decimal128: `{"$numberDecimalBytes": [16 个字节]}`
///
/// # Arguments
/// * `value` - 要转换的值
///
/// # Returns
/// 成功返回 JSON 值
pub fn to_json(value: &Bson) -> BsonResult<JsonValue> {
    let json = match value {
        Bson::Null => JsonValue::Null,
        Bson::Boolean(b) => JsonValue::Bool(*b),
        Bson::Int32(n) => json!(*n),
        Bson::Int64(n) => json!({ "$numberLong": n.to_string() }),
        Bson::Double(f) => match Number::from_f64(*f) {
            Some(n) => JsonValue::Number(n),
            None => {
                let text = if f.is_nan() {
                    "NaN"
                } else if *f > 0.0 {
                    "Infinity"
                } else {
                    "-Infinity"
                };
                json!({ "$numberDouble": text })
            }
        },
        Bson::Decimal128(d) => json!({ "$numberDecimalBytes": d.bytes().to_vec() }),
        Bson::DateTime(dt) => json!({ "$date": dt.timestamp_millis() }),
        Bson::Regex(r) => json!({
            "$regex": r.pattern.as_str(),
            "$options": r.options.to_string()
        }),
        Bson::String(s) => JsonValue::String(s.clone()),
        Bson::Document(doc) => document_to_json(doc)?,
        Bson::Array(items) => {
            let items: BsonResult<Vec<_>> = items.iter().map(to_json).collect();
            JsonValue::Array(items?)
        }
        Bson::Timestamp(ts) => json!({ "$timestamp": { "t": ts.time, "i": ts.increment } }),
        Bson::Binary(b) => json!({
            "$binary": {
                "base64": STANDARD.encode(&b.bytes),
                "subType": format!("{:02x}", b.subtype)
            }
        }),
        Bson::ObjectId(oid) => json!({ "$oid": oid.to_hex() }),
        Bson::JavaScriptCode(code) => json!({ "$code": code.as_str() }),
        Bson::JavaScriptCodeWithScope(js) => json!({
            "$code": js.code.as_str(),
            "$scope": document_to_json(&js.scope)?
        }),
        Bson::DbPointer(p) => json!({
            "$dbPointer": { "$ref": p.namespace.as_str(), "$id": { "$oid": p.id.to_hex() } }
        }),
        Bson::Symbol(s) => json!({ "$symbol": s.as_str() }),
        Bson::MinKey => json!({ "$minKey": 1 }),
        Bson::MaxKey => json!({ "$maxKey": 1 }),
    };
    Ok(json)
}

/// 将文档转换为 JSON 对象
pub fn document_to_json(doc: &Document) -> BsonResult<JsonValue> {
    let mut obj = Map::new();
    for (k, v) in doc.iter() {
        obj.insert(k.to_string(), to_json(v)?);
    }
    Ok(JsonValue::Object(obj))
}

/// 从 JSON 转换为 Bson
///
/// # Brief
/// 识别扩展 JSON 包装对象；整数在 i32 范围内得到 Int32，否则 Int64
///
/// # Arguments
/// * `value` - JSON 值
///
/// # Returns
/// 成功返回 Bson，包装对象内容无效时返回 Json 错误
pub fn from_json(value: &JsonValue) -> BsonResult<Bson> {
    match value {
        JsonValue::Null => Ok(Bson::Null),
        JsonValue::Bool(b) => Ok(Bson::Boolean(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                match i32::try_from(i) {
                    Ok(small) => Ok(Bson::Int32(small)),
                    Err(_) => Ok(Bson::Int64(i)),
                }
            } else if let Some(f) = n.as_f64() {
                Ok(Bson::Double(f))
            } else {
                Err(json_error(format!("Number out of range: {}", n)))
            }
        }
        JsonValue::String(s) => Ok(Bson::String(s.clone())),
        JsonValue::Array(arr) => {
            let items: BsonResult<Vec<_>> = arr.iter().map(from_json).collect();
            Ok(Bson::Array(items?))
        }
        JsonValue::Object(obj) => match from_wrapper(obj)? {
            Some(value) => Ok(value),
            None => Ok(Bson::Document(object_to_document(obj)?)),
        },
    }
}

fn object_to_document(obj: &Map<String, JsonValue>) -> BsonResult<Document> {
    let mut doc = Document::with_capacity(obj.len());
    for (k, v) in obj {
        doc.insert(k.as_str(), from_json(v)?);
    }
    Ok(doc)
}

/// 识别扩展 JSON 包装对象，不是包装对象时返回 None
fn from_wrapper(obj: &Map<String, JsonValue>) -> BsonResult<Option<Bson>> {
    if let Some(JsonValue::String(hex)) = obj.get("$oid") {
        return Ok(Some(Bson::ObjectId(parse_object_id(hex)?)));
    }

    if let Some(date) = obj.get("$date") {
        return Ok(Some(Bson::DateTime(parse_date(date)?)));
    }

    if let Some(JsonValue::String(s)) = obj.get("$numberLong") {
        let n: i64 = s
            .parse()
            .map_err(|_| json_error(format!("Invalid $numberLong: {}", s)))?;
        return Ok(Some(Bson::Int64(n)));
    }

    if let Some(JsonValue::String(s)) = obj.get("$numberDouble") {
        let f = match s.as_str() {
            "NaN" => f64::NAN,
            "Infinity" => f64::INFINITY,
            "-Infinity" => f64::NEG_INFINITY,
            other => other
                .parse()
                .map_err(|_| json_error(format!("Invalid $numberDouble: {}", other)))?,
        };
        return Ok(Some(Bson::Double(f)));
    }

    if let Some(JsonValue::Array(raw)) = obj.get("$numberDecimalBytes") {
        let bytes = byte_array(raw)?;
        let bytes: [u8; 16] = bytes
            .try_into()
            .map_err(|_| json_error("$numberDecimalBytes must hold 16 bytes"))?;
        return Ok(Some(Bson::Decimal128(Decimal128::from_bytes(bytes))));
    }

    if let Some(JsonValue::String(pattern)) = obj.get("$regex") {
        let options = obj.get("$options").and_then(|v| v.as_str()).unwrap_or("");
        return Ok(Some(Bson::Regex(Regex::parse(pattern.as_str(), options)?)));
    }

    if let Some(JsonValue::Object(inner)) = obj.get("$regularExpression") {
        let pattern = inner
            .get("pattern")
            .and_then(|v| v.as_str())
            .ok_or_else(|| json_error("$regularExpression requires a pattern"))?;
        let options = inner.get("options").and_then(|v| v.as_str()).unwrap_or("");
        return Ok(Some(Bson::Regex(Regex::parse(pattern, options)?)));
    }

    if let Some(binary) = obj.get("$binary") {
        return Ok(Some(Bson::Binary(parse_binary(binary)?)));
    }

    if let Some(JsonValue::Object(ts)) = obj.get("$timestamp") {
        let field = |name: &str| -> BsonResult<u32> {
            ts.get(name)
                .and_then(|v| v.as_u64())
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| json_error(format!("$timestamp requires a u32 field {:?}", name)))
        };
        return Ok(Some(Bson::Timestamp(Timestamp {
            time: field("t")?,
            increment: field("i")?,
        })));
    }

    if let Some(JsonValue::String(code)) = obj.get("$code") {
        return match obj.get("$scope") {
            Some(JsonValue::Object(scope)) => {
                Ok(Some(Bson::JavaScriptCodeWithScope(JavaScriptCodeWithScope {
                    code: code.clone(),
                    scope: object_to_document(scope)?,
                })))
            }
            Some(_) => Err(json_error("$scope must be an object")),
            None => Ok(Some(Bson::JavaScriptCode(code.clone()))),
        };
    }

    if let Some(JsonValue::String(symbol)) = obj.get("$symbol") {
        return Ok(Some(Bson::Symbol(symbol.clone())));
    }

    if let Some(JsonValue::Object(pointer)) = obj.get("$dbPointer") {
        let namespace = pointer
            .get("$ref")
            .and_then(|v| v.as_str())
            .ok_or_else(|| json_error("$dbPointer requires $ref"))?;
        let id = pointer
            .get("$id")
            .and_then(|v| v.get("$oid"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| json_error("$dbPointer requires $id"))?;
        return Ok(Some(Bson::DbPointer(DbPointer {
            namespace: namespace.to_string(),
            id: parse_object_id(id)?,
        })));
    }

    if obj.len() == 1 {
        if obj.contains_key("$minKey") {
            return Ok(Some(Bson::MinKey));
        }
        if obj.contains_key("$maxKey") {
            return Ok(Some(Bson::MaxKey));
        }
    }

    Ok(None)
}

fn parse_object_id(hex: &str) -> BsonResult<ObjectId> {
    ObjectId::from_hex(hex).map_err(|e| json_error(e.to_string()))
}

/// `$date` 接受毫秒数、`{"$numberLong": "..."}` 或 RFC 3339 字符串
fn parse_date(value: &JsonValue) -> BsonResult<DateTime> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .map(DateTime::from_millis)
            .ok_or_else(|| json_error(format!("Invalid $date: {}", n))),
        JsonValue::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .map(|dt| DateTime::from(dt.with_timezone(&chrono::Utc)))
            .map_err(|e| json_error(format!("Invalid $date {:?}: {}", s, e))),
        JsonValue::Object(inner) => inner
            .get("$numberLong")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .map(DateTime::from_millis)
            .ok_or_else(|| json_error("Invalid $date")),
        _ => Err(json_error("Invalid $date")),
    }
}

/// `$binary` 接受 `{"base64", "subType"}` 对象，或直接给出 base64 字符串（子类型 0）
fn parse_binary(value: &JsonValue) -> BsonResult<Binary> {
    let (encoded, subtype) = match value {
        JsonValue::String(s) => (s.as_str(), 0),
        JsonValue::Object(inner) => {
            let encoded = inner
                .get("base64")
                .and_then(|v| v.as_str())
                .ok_or_else(|| json_error("$binary requires base64"))?;
            let subtype = match inner.get("subType").and_then(|v| v.as_str()) {
                Some(hex) => u8::from_str_radix(hex, 16)
                    .map_err(|_| json_error(format!("Invalid binary subType: {}", hex)))?,
                None => 0,
            };
            (encoded, subtype)
        }
        _ => return Err(json_error("Invalid $binary")),
    };
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| json_error(format!("Invalid base64: {}", e)))?;
    Ok(Binary::new(subtype, bytes))
}

fn byte_array(raw: &[JsonValue]) -> BsonResult<Vec<u8>> {
    raw.iter()
        .map(|v| {
            v.as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| json_error("Expected a byte value"))
        })
        .collect()
}

/// 将 Bson 序列化为 JSON 字符串
///
/// # Brief
/// 将 BSON 值转换为美化的 JSON 字符串
pub fn to_json_string(value: &Bson) -> BsonResult<String> {
    let json_value = to_json(value)?;
    serde_json::to_string_pretty(&json_value)
        .map_err(|e| json_error(format!("JSON serialization failed: {}", e)))
}

/// 解析 JSON 字符串并转换为 Bson
pub fn from_json_string(json_str: &str) -> BsonResult<Bson> {
    let json_value: JsonValue = serde_json::from_str(json_str)
        .map_err(|e| json_error(format!("JSON parsing failed: {}", e)))?;
    from_json(&json_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RegexOptions;
    use crate::doc;

    #[test]
    fn test_basic_types() {
        assert_eq!(to_json(&Bson::Null).unwrap(), JsonValue::Null);
        assert_eq!(to_json(&Bson::Boolean(true)).unwrap(), JsonValue::Bool(true));
        assert_eq!(to_json(&Bson::Int32(42)).unwrap(), json!(42));
        assert_eq!(to_json(&Bson::from("hello")).unwrap(), json!("hello"));
        assert_eq!(
            to_json(&Bson::Int64(1 << 40)).unwrap(),
            json!({ "$numberLong": "1099511627776" })
        );
    }

    #[test]
    fn test_document() {
        let doc = doc! { "name": "Alice", "age": 30, "tags": ["a", "b"] };
        assert_eq!(
            document_to_json(&doc).unwrap(),
            json!({ "name": "Alice", "age": 30, "tags": ["a", "b"] })
        );
    }

    #[test]
    fn test_number_widths() {
        assert_eq!(from_json(&json!(7)).unwrap(), Bson::Int32(7));
        assert!(matches!(from_json(&json!(5_000_000_000i64)).unwrap(), Bson::Int64(5_000_000_000)));
        assert!(matches!(from_json(&json!(1.5)).unwrap(), Bson::Double(f) if f == 1.5));
    }

    #[test]
    fn test_wrappers_round_trip() {
        let oid = ObjectId::from_bytes([0x5A; 12]);
        let doc = doc! {
            "oid": (oid),
            "date": (DateTime::from_millis(1_500_000_000_123)),
            "long": (1i64 << 40),
            "regex": (Regex::new("^x", RegexOptions::CASE_INSENSITIVE | RegexOptions::MULTILINE)),
            "bin": (Binary::new(0x04, vec![0xDE, 0xAD])),
            "ts": (Timestamp { time: 10, increment: 3 }),
            "code": (Bson::JavaScriptCode("f()".to_string())),
            "scoped": (JavaScriptCodeWithScope { code: "g()".to_string(), scope: doc! { "v": 1 } }),
            "dec": (Decimal128::from_bytes([9; 16])),
            "sym": (Bson::Symbol("s".to_string())),
            "ptr": (DbPointer { namespace: "db.c".to_string(), id: oid }),
            "min": (Bson::MinKey),
            "max": (Bson::MaxKey)
        };
        let text = to_json_string(&Bson::Document(doc.clone())).unwrap();
        assert_eq!(from_json_string(&text).unwrap(), Bson::Document(doc));
    }

    #[test]
    fn test_non_finite_doubles() {
        let json = to_json(&Bson::Double(f64::NEG_INFINITY)).unwrap();
        assert_eq!(json, json!({ "$numberDouble": "-Infinity" }));
        assert!(matches!(from_json(&json).unwrap(), Bson::Double(f) if f == f64::NEG_INFINITY));
        assert!(matches!(
            from_json(&json!({ "$numberDouble": "NaN" })).unwrap(),
            Bson::Double(f) if f.is_nan()
        ));
    }

    #[test]
    fn test_date_forms() {
        let expected = DateTime::from_millis(1_500_000_000_000);
        for input in [
            json!({ "$date": 1_500_000_000_000i64 }),
            json!({ "$date": { "$numberLong": "1500000000000" } }),
            json!({ "$date": "2017-07-14T02:40:00Z" }),
        ] {
            assert_eq!(from_json(&input).unwrap().as_datetime(), Some(expected));
        }
    }

    #[test]
    fn test_alternate_forms() {
        let re = from_json(&json!({ "$regularExpression": { "pattern": "a", "options": "xi" } }))
            .unwrap();
        assert_eq!(re, Bson::Regex(Regex::parse("a", "ix").unwrap()));

        let bin = from_json(&json!({ "$binary": "AQI=" })).unwrap();
        assert_eq!(bin, Bson::Binary(Binary::generic(vec![1, 2])));
    }

    #[test]
    fn test_invalid_wrappers() {
        assert!(matches!(from_json(&json!({ "$oid": "zz" })), Err(BsonError::Json(_))));
        assert!(matches!(from_json(&json!({ "$numberLong": "x" })), Err(BsonError::Json(_))));
        assert!(matches!(
            from_json(&json!({ "$regex": "a", "$options": "q" })),
            Err(BsonError::InvalidRegularExpressionOptions { invalid: 'q', .. })
        ));
        assert!(matches!(from_json_string("{not json"), Err(BsonError::Json(_))));
    }

    #[test]
    fn test_document_from_json() {
        let doc = Document::from_json(r#"{"a": {"b": [1, 2]}, "c": null}"#).unwrap();
        assert_eq!(doc.get_path("a.b.1"), Some(&Bson::Int32(2)));
        assert!(doc.get("c").unwrap().is_null());
        assert!(Document::from_json("[1, 2]").is_err());
        assert_eq!(
            Document::from_json(&doc.to_json().unwrap()).unwrap(),
            doc
        );
    }
}
