/// 最小文档: 4 字节长度 + 1 字节结束符
pub const MIN_DOCUMENT_SIZE: usize = 5;
pub const MAX_NESTING_DEPTH: usize = 100;

pub const OBJECT_ID_LENGTH: usize = 12;
pub const DECIMAL128_LENGTH: usize = 16;

pub const END_OF_DOCUMENT: u8 = 0x00;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    Undefined = 0x06,
    ObjectId = 0x07,
    Boolean = 0x08,
    DateTime = 0x09,
    Null = 0x0A,
    Regex = 0x0B,
    DbPointer = 0x0C,
    JavaScriptCode = 0x0D,
    Symbol = 0x0E,
    JavaScriptCodeWithScope = 0x0F,
    Int32 = 0x10,
    Timestamp = 0x11,
    Int64 = 0x12,
    Decimal128 = 0x13,
    MaxKey = 0x7F,
    MinKey = 0xFF,
}

impl ElementType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Double),
            0x02 => Some(Self::String),
            0x03 => Some(Self::Document),
            0x04 => Some(Self::Array),
            0x05 => Some(Self::Binary),
            0x06 => Some(Self::Undefined),
            0x07 => Some(Self::ObjectId),
            0x08 => Some(Self::Boolean),
            0x09 => Some(Self::DateTime),
            0x0A => Some(Self::Null),
            0x0B => Some(Self::Regex),
            0x0C => Some(Self::DbPointer),
            0x0D => Some(Self::JavaScriptCode),
            0x0E => Some(Self::Symbol),
            0x0F => Some(Self::JavaScriptCodeWithScope),
            0x10 => Some(Self::Int32),
            0x11 => Some(Self::Timestamp),
            0x12 => Some(Self::Int64),
            0x13 => Some(Self::Decimal128),
            0x7F => Some(Self::MaxKey),
            0xFF => Some(Self::MinKey),
            _ => None,
        }
    }

    /// 固定宽度类型的载荷长度，变长类型返回 None
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Double | Self::DateTime | Self::Int64 | Self::Timestamp => Some(8),
            Self::Int32 => Some(4),
            Self::Boolean => Some(1),
            Self::ObjectId => Some(OBJECT_ID_LENGTH),
            Self::Decimal128 => Some(DECIMAL128_LENGTH),
            Self::Undefined | Self::Null | Self::MinKey | Self::MaxKey => Some(0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_matches_discriminant() {
        for byte in 0..=255u8 {
            if let Some(t) = ElementType::from_u8(byte) {
                assert_eq!(t as u8, byte);
            }
        }
        assert_eq!(ElementType::from_u8(0x00), None);
        assert_eq!(ElementType::from_u8(0x14), None);
        assert_eq!(ElementType::from_u8(0xFF), Some(ElementType::MinKey));
    }

    #[test]
    fn test_fixed_size() {
        assert_eq!(ElementType::Int32.fixed_size(), Some(4));
        assert_eq!(ElementType::Timestamp.fixed_size(), Some(8));
        assert_eq!(ElementType::ObjectId.fixed_size(), Some(12));
        assert_eq!(ElementType::Decimal128.fixed_size(), Some(16));
        assert_eq!(ElementType::Null.fixed_size(), Some(0));
        assert_eq!(ElementType::String.fixed_size(), None);
        assert_eq!(ElementType::Document.fixed_size(), None);
    }
}
