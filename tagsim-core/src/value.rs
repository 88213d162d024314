//! Typed tag payloads
//!
//! A tag holds exactly one of seven payload kinds, fixed at creation. The
//! kind is a closed enum so every dispatch over it (simulation, reads,
//! writes) is an exhaustive `match` checked by the compiler.

use chrono::{DateTime, Utc};
use core::fmt;
use serde::{Deserialize, Serialize};
use std::collections::TryReserveError;

/// The payload kind of a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagType {
    Int32,
    #[serde(rename = "uint32")]
    UInt32,
    Float,
    Double,
    Boolean,
    String,
    DateTime,
}

impl TagType {
    /// Returns true for the floating-point kinds
    pub const fn is_floating_point(self) -> bool {
        matches!(self, TagType::Float | TagType::Double)
    }

    /// Returns true for the integer kinds
    pub const fn is_integer(self) -> bool {
        matches!(self, TagType::Int32 | TagType::UInt32)
    }

    pub const fn name(self) -> &'static str {
        match self {
            TagType::Int32 => "Int32",
            TagType::UInt32 => "UInt32",
            TagType::Float => "Float",
            TagType::Double => "Double",
            TagType::Boolean => "Boolean",
            TagType::String => "String",
            TagType::DateTime => "DateTime",
        }
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed tag payload
///
/// Serialized as `{"type": "float", "value": 3.14}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TagValue {
    Int32(i32),
    #[serde(rename = "uint32")]
    UInt32(u32),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
    DateTime(DateTime<Utc>),
}

impl TagValue {
    /// Returns the payload kind
    pub const fn tag_type(&self) -> TagType {
        match self {
            TagValue::Int32(_) => TagType::Int32,
            TagValue::UInt32(_) => TagType::UInt32,
            TagValue::Float(_) => TagType::Float,
            TagValue::Double(_) => TagType::Double,
            TagValue::Boolean(_) => TagType::Boolean,
            TagValue::String(_) => TagType::String,
            TagValue::DateTime(_) => TagType::DateTime,
        }
    }

    /// Produces an independent copy of the payload.
    ///
    /// This is the single copy operation used wherever a value crosses a tag
    /// lock: on creation, on every read, and on every write. Text payloads
    /// get a freshly reserved buffer so allocation failure surfaces as an
    /// error instead of an abort.
    pub fn try_clone(&self) -> Result<TagValue, TryReserveError> {
        Ok(match self {
            TagValue::Int32(v) => TagValue::Int32(*v),
            TagValue::UInt32(v) => TagValue::UInt32(*v),
            TagValue::Float(v) => TagValue::Float(*v),
            TagValue::Double(v) => TagValue::Double(*v),
            TagValue::Boolean(v) => TagValue::Boolean(*v),
            TagValue::String(s) => {
                let mut copy = String::new();
                copy.try_reserve_exact(s.len())?;
                copy.push_str(s);
                TagValue::String(copy)
            }
            TagValue::DateTime(v) => TagValue::DateTime(*v),
        })
    }

    /// Byte length of the owned buffer (zero for scalar kinds)
    pub fn payload_len(&self) -> usize {
        match self {
            TagValue::String(s) => s.len(),
            _ => 0,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            TagValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            TagValue::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            TagValue::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TagValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            TagValue::DateTime(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Int32(v) => write!(f, "{}", v),
            TagValue::UInt32(v) => write!(f, "{}", v),
            TagValue::Float(v) => write!(f, "{}", v),
            TagValue::Double(v) => write!(f, "{}", v),
            TagValue::Boolean(v) => write!(f, "{}", v),
            TagValue::String(s) => write!(f, "{:?}", s),
            TagValue::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl From<i32> for TagValue {
    fn from(v: i32) -> Self {
        TagValue::Int32(v)
    }
}

impl From<u32> for TagValue {
    fn from(v: u32) -> Self {
        TagValue::UInt32(v)
    }
}

impl From<f32> for TagValue {
    fn from(v: f32) -> Self {
        TagValue::Float(v)
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::Double(v)
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Boolean(v)
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        TagValue::String(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::String(v.to_string())
    }
}

impl From<DateTime<Utc>> for TagValue {
    fn from(v: DateTime<Utc>) -> Self {
        TagValue::DateTime(v)
    }
}
