//! Attribute value types
//!
//! A single tagged [`AttributeValue`] covers every kind a column can hold.
//! Conversions between kinds follow fixed widening/narrowing rules:
//!
//! - integer narrowing keeps the low bits (two's complement)
//! - float/double to an integer kind truncates toward zero and saturates at
//!   the `int` range (`long` for the long kind); NaN becomes 0
//! - `char` is a UTF-16 code unit, so byte → char sign-extends and char → byte truncates
//! - boolean ↔ numeric maps to 1/0 and `!= 0`
//! - strings parse through the canonical string form

use super::error::{GraphError, GraphResult};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The storage kind of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    Object,
}

impl ValueKind {
    pub const ALL: [ValueKind; 10] = [
        ValueKind::Bool,
        ValueKind::Byte,
        ValueKind::Short,
        ValueKind::Int,
        ValueKind::Long,
        ValueKind::Float,
        ValueKind::Double,
        ValueKind::Char,
        ValueKind::String,
        ValueKind::Object,
    ];

    /// Get type name as string
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueKind::Bool => "boolean",
            ValueKind::Byte => "byte",
            ValueKind::Short => "short",
            ValueKind::Int => "int",
            ValueKind::Long => "long",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::Char => "char",
            ValueKind::String => "string",
            ValueKind::Object => "object",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        ValueKind::ALL.iter().copied().find(|kind| kind.type_name() == name)
    }

    /// The zero value of this kind, used when an attribute has no explicit default
    pub fn zero(&self) -> AttributeValue {
        match self {
            ValueKind::Bool => AttributeValue::Bool(false),
            ValueKind::Byte => AttributeValue::Byte(0),
            ValueKind::Short => AttributeValue::Short(0),
            ValueKind::Int => AttributeValue::Int(0),
            ValueKind::Long => AttributeValue::Long(0),
            ValueKind::Float => AttributeValue::Float(0.0),
            ValueKind::Double => AttributeValue::Double(0.0),
            ValueKind::Char => AttributeValue::Char(0),
            ValueKind::String => AttributeValue::String(None),
            ValueKind::Object => AttributeValue::Object(None),
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ValueKind::String | ValueKind::Object)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Opaque structured value stored in object columns.
///
/// Serialized as its compact JSON text so that non-self-describing formats
/// such as bincode can carry it.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValue(pub serde_json::Value);

impl ObjectValue {
    pub fn new(value: serde_json::Value) -> Self {
        ObjectValue(value)
    }

    pub fn parse(text: &str) -> GraphResult<Self> {
        serde_json::from_str(text)
            .map(ObjectValue)
            .map_err(|_| GraphError::InvalidValue {
                kind: ValueKind::Object,
                input: text.to_string(),
            })
    }
}

impl fmt::Display for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ObjectValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for ObjectValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        serde_json::from_str(&text).map(ObjectValue).map_err(D::Error::custom)
    }
}

/// A value of any attribute kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// A UTF-16 code unit
    Char(u16),
    String(Option<String>),
    Object(Option<ObjectValue>),
}

/// Numeric view of a primitive value used by the conversion rules
#[derive(Clone, Copy)]
enum Numeric {
    Integral(i64),
    Real(f64),
}

impl Numeric {
    // Java-style: reals go through `int` before narrowing further.
    fn to_i32(self) -> i32 {
        match self {
            Numeric::Integral(v) => v as i32,
            Numeric::Real(v) => v as i32,
        }
    }

    fn to_i64(self) -> i64 {
        match self {
            Numeric::Integral(v) => v,
            Numeric::Real(v) => v as i64,
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Numeric::Integral(v) => v as f64,
            Numeric::Real(v) => v,
        }
    }

    fn to_f32(self) -> f32 {
        match self {
            Numeric::Integral(v) => v as f32,
            Numeric::Real(v) => v as f32,
        }
    }

    fn is_nonzero(self) -> bool {
        match self {
            Numeric::Integral(v) => v != 0,
            Numeric::Real(v) => v != 0.0,
        }
    }
}

impl AttributeValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            AttributeValue::Bool(_) => ValueKind::Bool,
            AttributeValue::Byte(_) => ValueKind::Byte,
            AttributeValue::Short(_) => ValueKind::Short,
            AttributeValue::Int(_) => ValueKind::Int,
            AttributeValue::Long(_) => ValueKind::Long,
            AttributeValue::Float(_) => ValueKind::Float,
            AttributeValue::Double(_) => ValueKind::Double,
            AttributeValue::Char(_) => ValueKind::Char,
            AttributeValue::String(_) => ValueKind::String,
            AttributeValue::Object(_) => ValueKind::Object,
        }
    }

    /// Check if value is a null string or object
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::String(None) | AttributeValue::Object(None))
    }

    /// Equality that treats floating point values bitwise, so NaN equals NaN.
    pub fn identical(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Float(a), AttributeValue::Float(b)) => a.to_bits() == b.to_bits(),
            (AttributeValue::Double(a), AttributeValue::Double(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }

    fn numeric(&self, target: ValueKind) -> GraphResult<Option<Numeric>> {
        let numeric = match self {
            AttributeValue::Bool(b) => Numeric::Integral(*b as i64),
            AttributeValue::Byte(v) => Numeric::Integral(*v as i64),
            AttributeValue::Short(v) => Numeric::Integral(*v as i64),
            AttributeValue::Int(v) => Numeric::Integral(*v as i64),
            AttributeValue::Long(v) => Numeric::Integral(*v),
            AttributeValue::Char(v) => Numeric::Integral(*v as i64),
            AttributeValue::Float(v) => Numeric::Real(*v as f64),
            AttributeValue::Double(v) => Numeric::Real(*v),
            AttributeValue::String(None) | AttributeValue::Object(None) => return Ok(None),
            AttributeValue::String(Some(text)) => {
                return AttributeValue::parse(target, text)?.numeric(target);
            }
            AttributeValue::Object(Some(_)) => {
                return Err(GraphError::Conversion {
                    from: ValueKind::Object,
                    to: target,
                })
            }
        };
        Ok(Some(numeric))
    }

    pub fn to_bool(&self) -> GraphResult<bool> {
        Ok(self.numeric(ValueKind::Bool)?.map(Numeric::is_nonzero).unwrap_or(false))
    }

    pub fn to_byte(&self) -> GraphResult<i8> {
        Ok(self.numeric(ValueKind::Byte)?.map(|n| n.to_i32() as i8).unwrap_or(0))
    }

    pub fn to_short(&self) -> GraphResult<i16> {
        Ok(self.numeric(ValueKind::Short)?.map(|n| n.to_i32() as i16).unwrap_or(0))
    }

    pub fn to_int(&self) -> GraphResult<i32> {
        Ok(self.numeric(ValueKind::Int)?.map(Numeric::to_i32).unwrap_or(0))
    }

    pub fn to_long(&self) -> GraphResult<i64> {
        Ok(self.numeric(ValueKind::Long)?.map(Numeric::to_i64).unwrap_or(0))
    }

    pub fn to_float(&self) -> GraphResult<f32> {
        Ok(self.numeric(ValueKind::Float)?.map(Numeric::to_f32).unwrap_or(0.0))
    }

    pub fn to_double(&self) -> GraphResult<f64> {
        Ok(self.numeric(ValueKind::Double)?.map(Numeric::to_f64).unwrap_or(0.0))
    }

    pub fn to_char(&self) -> GraphResult<u16> {
        Ok(self.numeric(ValueKind::Char)?.map(|n| n.to_i32() as u16).unwrap_or(0))
    }

    pub fn to_object(&self) -> GraphResult<Option<ObjectValue>> {
        match self {
            AttributeValue::Object(object) => Ok(object.clone()),
            AttributeValue::String(None) => Ok(None),
            AttributeValue::String(Some(text)) => ObjectValue::parse(text).map(Some),
            other => Err(GraphError::Conversion {
                from: other.kind(),
                to: ValueKind::Object,
            }),
        }
    }

    /// The canonical string form, `None` for a null string or object.
    pub fn to_canonical_string(&self) -> Option<String> {
        match self {
            AttributeValue::Bool(b) => Some(b.to_string()),
            AttributeValue::Byte(v) => Some(v.to_string()),
            AttributeValue::Short(v) => Some(v.to_string()),
            AttributeValue::Int(v) => Some(v.to_string()),
            AttributeValue::Long(v) => Some(v.to_string()),
            AttributeValue::Float(v) => Some(v.to_string()),
            AttributeValue::Double(v) => Some(v.to_string()),
            AttributeValue::Char(unit) => Some(format_char(*unit)),
            AttributeValue::String(text) => text.clone(),
            AttributeValue::Object(object) => object.as_ref().map(|o| o.to_string()),
        }
    }

    /// Convert this value to `kind` using the conversion rules of this module.
    pub fn convert(&self, kind: ValueKind) -> GraphResult<AttributeValue> {
        if self.kind() == kind {
            return Ok(self.clone());
        }
        Ok(match kind {
            ValueKind::Bool => AttributeValue::Bool(self.to_bool()?),
            ValueKind::Byte => AttributeValue::Byte(self.to_byte()?),
            ValueKind::Short => AttributeValue::Short(self.to_short()?),
            ValueKind::Int => AttributeValue::Int(self.to_int()?),
            ValueKind::Long => AttributeValue::Long(self.to_long()?),
            ValueKind::Float => AttributeValue::Float(self.to_float()?),
            ValueKind::Double => AttributeValue::Double(self.to_double()?),
            ValueKind::Char => AttributeValue::Char(self.to_char()?),
            ValueKind::String => AttributeValue::String(self.to_canonical_string()),
            ValueKind::Object => AttributeValue::Object(self.to_object()?),
        })
    }

    /// Parse the canonical string form of `kind`.
    pub fn parse(kind: ValueKind, text: &str) -> GraphResult<AttributeValue> {
        let invalid = || GraphError::InvalidValue {
            kind,
            input: text.to_string(),
        };
        let trimmed = text.trim();
        Ok(match kind {
            ValueKind::Bool => {
                if trimmed.eq_ignore_ascii_case("true") {
                    AttributeValue::Bool(true)
                } else if trimmed.eq_ignore_ascii_case("false") {
                    AttributeValue::Bool(false)
                } else {
                    return Err(invalid());
                }
            }
            ValueKind::Byte => AttributeValue::Byte(trimmed.parse().map_err(|_| invalid())?),
            ValueKind::Short => AttributeValue::Short(trimmed.parse().map_err(|_| invalid())?),
            ValueKind::Int => AttributeValue::Int(trimmed.parse().map_err(|_| invalid())?),
            ValueKind::Long => AttributeValue::Long(trimmed.parse().map_err(|_| invalid())?),
            ValueKind::Float => AttributeValue::Float(trimmed.parse().map_err(|_| invalid())?),
            ValueKind::Double => AttributeValue::Double(trimmed.parse().map_err(|_| invalid())?),
            ValueKind::Char => AttributeValue::Char(parse_char(text).ok_or_else(invalid)?),
            ValueKind::String => AttributeValue::String(Some(text.to_string())),
            ValueKind::Object => AttributeValue::Object(Some(ObjectValue::parse(text)?)),
        })
    }

    /// Rough heap footprint, used to bound the undo history.
    pub fn size(&self) -> usize {
        let heap = match self {
            AttributeValue::String(Some(text)) => text.len(),
            AttributeValue::Object(Some(object)) => object.0.to_string().len(),
            _ => 0,
        };
        std::mem::size_of::<AttributeValue>() + heap
    }
}

fn format_char(unit: u16) -> String {
    match char::from_u32(unit as u32) {
        Some(c) => c.to_string(),
        None => format!("\\u{:04X}", unit),
    }
}

fn parse_char(text: &str) -> Option<u16> {
    if text.len() == 6 && text.starts_with("\\u") {
        return u16::from_str_radix(&text[2..], 16).ok();
    }
    let mut chars = text.chars();
    let c = chars.next()?;
    if chars.next().is_some() || c.len_utf16() != 1 {
        return None;
    }
    Some(c as u32 as u16)
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_canonical_string() {
            Some(text) => f.write_str(&text),
            None => f.write_str("null"),
        }
    }
}

// Convenience conversions
impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

impl From<i8> for AttributeValue {
    fn from(v: i8) -> Self {
        AttributeValue::Byte(v)
    }
}

impl From<i16> for AttributeValue {
    fn from(v: i16) -> Self {
        AttributeValue::Short(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Long(v)
    }
}

impl From<f32> for AttributeValue {
    fn from(v: f32) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Double(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(Some(s.to_string()))
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(Some(s))
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(v: serde_json::Value) -> Self {
        AttributeValue::Object(Some(ObjectValue(v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ValueKind::ALL {
            assert_eq!(ValueKind::from_type_name(kind.type_name()), Some(kind));
            assert_eq!(kind.zero().kind(), kind);
        }
        assert_eq!(ValueKind::from_type_name("datetime"), None);
    }

    #[test]
    fn test_float_to_int_truncates_toward_zero() {
        assert_eq!(AttributeValue::Float(2.9).to_int().unwrap(), 2);
        assert_eq!(AttributeValue::Float(-2.9).to_int().unwrap(), -2);
        assert_eq!(AttributeValue::Double(f64::NAN).to_int().unwrap(), 0);
        assert_eq!(AttributeValue::Double(1e20).to_int().unwrap(), i32::MAX);
    }

    #[test]
    fn test_real_to_byte_goes_through_int() {
        // 300 -> int 300 -> low byte 44
        assert_eq!(AttributeValue::Double(300.7).to_byte().unwrap(), 44);
        // saturates at int range first, then keeps the low byte
        assert_eq!(AttributeValue::Double(1e10).to_byte().unwrap(), -1);
    }

    #[test]
    fn test_integer_narrowing_wraps() {
        assert_eq!(AttributeValue::Int(300).to_byte().unwrap(), 44);
        assert_eq!(AttributeValue::Long(0x1_0000_0001).to_int().unwrap(), 1);
        assert_eq!(AttributeValue::Int(-1).to_short().unwrap(), -1);
    }

    #[test]
    fn test_byte_char_code_unit_semantics() {
        assert_eq!(AttributeValue::Byte(-1).to_char().unwrap(), 0xFFFF);
        assert_eq!(AttributeValue::Char(0xFFFF).to_byte().unwrap(), -1);
        assert_eq!(AttributeValue::Char(0x141).to_byte().unwrap(), 0x41);
    }

    #[test]
    fn test_bool_numeric() {
        assert_eq!(AttributeValue::Bool(true).to_int().unwrap(), 1);
        assert_eq!(AttributeValue::Bool(false).to_double().unwrap(), 0.0);
        assert!(AttributeValue::Int(5).to_bool().unwrap());
        assert!(!AttributeValue::Float(0.0).to_bool().unwrap());
    }

    #[test]
    fn test_string_parsing() {
        assert_eq!(AttributeValue::from("42").to_int().unwrap(), 42);
        assert_eq!(AttributeValue::from(" 1.5 ").to_double().unwrap(), 1.5);
        assert!(AttributeValue::from("TRUE").to_bool().unwrap());
        let err = AttributeValue::from("abc").to_int().unwrap_err();
        assert_eq!(
            err,
            GraphError::InvalidValue {
                kind: ValueKind::Int,
                input: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_null_string_converts_to_zero() {
        assert_eq!(AttributeValue::String(None).to_long().unwrap(), 0);
        assert_eq!(
            AttributeValue::String(None).convert(ValueKind::Bool).unwrap(),
            AttributeValue::Bool(false)
        );
    }

    #[test]
    fn test_object_conversions() {
        let object = AttributeValue::from(json!({"a": [1, 2]}));
        assert_eq!(object.to_canonical_string().unwrap(), r#"{"a":[1,2]}"#);
        assert!(matches!(
            object.to_int(),
            Err(GraphError::Conversion {
                from: ValueKind::Object,
                to: ValueKind::Int
            })
        ));
        let parsed = AttributeValue::from(r#"{"a":[1,2]}"#).convert(ValueKind::Object).unwrap();
        assert_eq!(parsed, object);
    }

    #[test]
    fn test_canonical_strings_round_trip() {
        let values = vec![
            AttributeValue::Bool(true),
            AttributeValue::Byte(-128),
            AttributeValue::Short(i16::MAX),
            AttributeValue::Int(-7),
            AttributeValue::Long(i64::MIN),
            AttributeValue::Float(0.1),
            AttributeValue::Double(-1.0e-300),
            AttributeValue::Float(f32::INFINITY),
            AttributeValue::Char('é' as u16),
            AttributeValue::Char(0xD800),
            AttributeValue::from("hello, world"),
            AttributeValue::from(json!([true, null, "x"])),
        ];
        for value in values {
            let text = value.to_canonical_string().unwrap();
            let parsed = AttributeValue::parse(value.kind(), &text).unwrap();
            assert!(parsed.identical(&value), "{:?} -> {} -> {:?}", value, text, parsed);
        }
    }

    #[test]
    fn test_lone_surrogate_is_escaped() {
        assert_eq!(AttributeValue::Char(0xDC01).to_canonical_string().unwrap(), "\\uDC01");
        assert_eq!(AttributeValue::parse(ValueKind::Char, "ab").ok(), None);
    }

    #[test]
    fn test_identical_handles_nan() {
        let nan = AttributeValue::Double(f64::NAN);
        assert!(nan.identical(&AttributeValue::Double(f64::NAN)));
        assert_ne!(nan, AttributeValue::Double(f64::NAN));
    }

    #[test]
    fn test_object_value_bincode() {
        let value = AttributeValue::from(json!({"k": 1}));
        let bytes = bincode::serialize(&value).unwrap();
        let back: AttributeValue = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, value);
    }
}
