//! 公共类型定义模块
//!
//! 定义 ObjectId：12 字节对象标识符，线上格式中以原始 12 字节出现。

use crate::error::{CommonError, CommonResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

/// 计数器只使用低 24 位
const COUNTER_MASK: u32 = 0x00FF_FFFF;

static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

/// ObjectId - 12 字节唯一标识符
///
/// 格式:
/// - 前 4 字节: 时间戳(秒,大端)
/// - 中间 5 字节: 进程级随机值
/// - 后 3 字节: 递增计数器(大端)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// 生成新的 ObjectId
    ///
    /// # Brief
    /// 以当前时间、进程随机值和计数器组合生成标识符
    ///
    /// # Returns
    /// 新的 ObjectId
    pub fn new() -> Self {
        let timestamp = chrono::Utc::now().timestamp() as u32;
        let process = PROCESS_UNIQUE.get_or_init(rand::random::<[u8; 5]>);
        let counter = COUNTER
            .get_or_init(|| AtomicU32::new(rand::thread_rng().gen::<u32>() & COUNTER_MASK))
            .fetch_add(1, Ordering::Relaxed)
            & COUNTER_MASK;

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&timestamp.to_be_bytes());
        bytes[4..9].copy_from_slice(process);
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..4]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// 生成时间(秒)
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// 从 24 位十六进制字符串解析
    ///
    /// # Arguments
    /// * `s` - 十六进制字符串
    ///
    /// # Returns
    /// 成功返回 ObjectId，长度或字符非法返回 InvalidObjectId
    pub fn from_hex(s: &str) -> CommonResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| CommonError::InvalidObjectId(format!("Invalid hex: {}", e)))?;
        let arr: [u8; 12] = bytes.try_into().map_err(|b: Vec<u8>| {
            CommonError::InvalidObjectId(format!("ObjectId must be 12 bytes, got {}", b.len()))
        })?;
        Ok(Self(arr))
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 12]> for ObjectId {
    fn from(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let id = ObjectId::from_hex("507f1f77bcf86cd799439011").unwrap();
        assert_eq!(id.to_hex(), "507f1f77bcf86cd799439011");
        assert_eq!(id.to_string(), "507f1f77bcf86cd799439011");
        assert_eq!(id.timestamp(), 0x507f1f77);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(ObjectId::from_hex("xyz").is_err());
        assert!(ObjectId::from_hex("507f1f77").is_err());
    }

    #[test]
    fn test_new_ids_are_distinct() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_bytes()[4..9], b.as_bytes()[4..9]);
    }

    #[test]
    fn test_new_id_timestamp_is_recent() {
        let now = chrono::Utc::now().timestamp() as u32;
        let id = ObjectId::new();
        assert!(id.timestamp() <= now + 1);
        assert!(id.timestamp() + 5 >= now);
    }
}
