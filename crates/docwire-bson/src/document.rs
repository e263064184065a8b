//! BSON 文档结构模块
//!
//! 提供 Document API。底层使用 `IndexMap` 保持插入顺序，
//! 供回填编码器按调用方顺序写出；比较相等时不考虑顺序。

use crate::value::Bson;
use crate::BsonResult;
use compact_str::CompactString;
use indexmap::IndexMap;
use std::fmt;

/// BSON 文档
///
/// 键唯一，重复插入覆盖旧值并保留原位置。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    fields: IndexMap<CompactString, Bson>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: IndexMap::with_capacity(capacity),
        }
    }

    /// 插入字段
    ///
    /// # Brief
    /// 向文档中插入或更新一个字段
    ///
    /// # Arguments
    /// * `key` - 字段名
    /// * `value` - 字段值
    ///
    /// # Returns
    /// 键已存在时返回旧值
    pub fn insert(&mut self, key: impl Into<CompactString>, value: impl Into<Bson>) -> Option<Bson> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.fields.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Bson> {
        self.fields.get_mut(key)
    }

    /// 移除字段，保持其余字段的相对顺序
    pub fn remove(&mut self, key: &str) -> Option<Bson> {
        self.fields.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Bson> {
        self.fields.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bson)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 按键的字节序排序后的字段
    ///
    /// # Brief
    /// 预计算长度的编码器和长度计算都按这个顺序遍历
    pub fn sorted_entries(&self) -> Vec<(&str, &Bson)> {
        let mut entries: Vec<(&str, &Bson)> = self.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.fields.get(key).and_then(|v| v.as_i32())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_array(&self, key: &str) -> Option<&Vec<Bson>> {
        self.fields.get(key).and_then(|v| v.as_array())
    }

    pub fn get_document(&self, key: &str) -> Option<&Document> {
        self.fields.get(key).and_then(|v| v.as_document())
    }

    /// 按路径获取嵌套值
    ///
    /// # Brief
    /// 使用点分隔的路径访问嵌套文档或数组中的值
    ///
    /// # Arguments
    /// * `path` - 点分隔的路径，如 "user.address.city"
    ///
    /// # Returns
    /// `Some(&Bson)` 如果路径存在，否则 `None`
    pub fn get_path(&self, path: &str) -> Option<&Bson> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// 合并另一个文档，同名字段以 `other` 为准
    pub fn merge(&mut self, other: Document) {
        for (k, v) in other.fields {
            self.fields.insert(k, v);
        }
    }

    /// 从扩展 JSON 字符串创建文档
    ///
    /// # Arguments
    /// * `json` - JSON 对象字符串
    ///
    /// # Returns
    /// 成功返回 Document，JSON 无效或顶层不是对象时返回错误
    pub fn from_json(json: &str) -> BsonResult<Self> {
        match crate::json::from_json_string(json)? {
            Bson::Document(doc) => Ok(doc),
            other => Err(crate::BsonError::Json(format!(
                "Expected a JSON object, got {}",
                other.type_name()
            ))),
        }
    }

    /// 转换为紧凑的扩展 JSON 字符串
    pub fn to_json(&self) -> BsonResult<String> {
        let value = crate::json::document_to_json(self)?;
        serde_json::to_string(&value).map_err(|e| crate::BsonError::Json(e.to_string()))
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "\"{}\": {}", k, v)?;
        }
        write!(f, "}}")
    }
}

impl<K: Into<CompactString>> FromIterator<(K, Bson)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, Bson)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (CompactString, Bson);
    type IntoIter = indexmap::map::IntoIter<CompactString, Bson>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a CompactString, &'a Bson);
    type IntoIter = indexmap::map::Iter<'a, CompactString, Bson>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// 构造 Document 的便捷宏
///
/// # 示例
///
/// ```rust,ignore
/// use docwire_bson::doc;
///
/// let empty = doc!();
/// let doc = doc! {
///     "name": "test",
///     "value": 123
/// };
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::Document::new()
    };
    ($($key:tt : $value:tt),* $(,)?) => {
        {
            let mut doc = $crate::Document::new();
            $(
                doc.insert($key, $crate::bson!($value));
            )*
            doc
        }
    };
}
