//! Field value types for emitted tree fields.
//!
//! Values are owned: the correlation view outlives the bytes of the message
//! that is being decoded, and generated fields are often built from records
//! created by earlier frames.

use std::fmt;

use compact_str::CompactString;

/// Possible field value types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Unsigned 8-bit integer
    UInt8(u8),
    /// Unsigned 32-bit integer
    UInt32(u32),
    /// Unsigned 64-bit integer
    UInt64(u64),
    /// Owned string for constructed values (termination names, NSAP, BIR).
    /// Uses CompactString for small-string optimization (inline up to 24 bytes).
    Str(CompactString),
    /// No value (text-only nodes).
    Null,
}

impl FieldValue {
    /// Create a string value.
    pub fn str(value: impl AsRef<str>) -> Self {
        FieldValue::Str(CompactString::new(value.as_ref()))
    }

    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Try to get as u64.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::UInt8(v) => Some(*v as u64),
            FieldValue::UInt32(v) => Some(*v as u64),
            FieldValue::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::UInt8(v) => write!(f, "{v}"),
            FieldValue::UInt32(v) => write!(f, "{v}"),
            FieldValue::UInt64(v) => write!(f, "{v}"),
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Null => Ok(()),
        }
    }
}
