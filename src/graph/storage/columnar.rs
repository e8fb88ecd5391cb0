//! Columnar storage for attribute values.
//!
//! Values of one attribute are held in a single contiguous, typed array
//! indexed by element id rather than as individual boxed objects. Slots
//! that were never written hold the attribute default.

use crate::graph::error::{GraphError, GraphResult};
use crate::graph::value::{AttributeValue, ObjectValue, ValueKind};
use serde::{Deserialize, Serialize};

/// A single typed column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    Bool(Vec<bool>),
    Byte(Vec<i8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Char(Vec<u16>),
    String(Vec<Option<String>>),
    Object(Vec<Option<ObjectValue>>),
}

impl Column {
    /// Create a column of `len` copies of `fill`. `fill` must already be of the column kind.
    fn filled(fill: &AttributeValue, len: usize) -> Self {
        match fill {
            AttributeValue::Bool(v) => Column::Bool(vec![*v; len]),
            AttributeValue::Byte(v) => Column::Byte(vec![*v; len]),
            AttributeValue::Short(v) => Column::Short(vec![*v; len]),
            AttributeValue::Int(v) => Column::Int(vec![*v; len]),
            AttributeValue::Long(v) => Column::Long(vec![*v; len]),
            AttributeValue::Float(v) => Column::Float(vec![*v; len]),
            AttributeValue::Double(v) => Column::Double(vec![*v; len]),
            AttributeValue::Char(v) => Column::Char(vec![*v; len]),
            AttributeValue::String(v) => Column::String(vec![v.clone(); len]),
            AttributeValue::Object(v) => Column::Object(vec![v.clone(); len]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Bool(v) => v.len(),
            Column::Byte(v) => v.len(),
            Column::Short(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Long(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Double(v) => v.len(),
            Column::Char(v) => v.len(),
            Column::String(v) => v.len(),
            Column::Object(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grow to `len` slots, filling new slots with `fill`. Never shrinks.
    fn extend_to(&mut self, len: usize, fill: &AttributeValue) {
        if len <= self.len() {
            return;
        }
        match (self, fill) {
            (Column::Bool(v), AttributeValue::Bool(f)) => v.resize(len, *f),
            (Column::Byte(v), AttributeValue::Byte(f)) => v.resize(len, *f),
            (Column::Short(v), AttributeValue::Short(f)) => v.resize(len, *f),
            (Column::Int(v), AttributeValue::Int(f)) => v.resize(len, *f),
            (Column::Long(v), AttributeValue::Long(f)) => v.resize(len, *f),
            (Column::Float(v), AttributeValue::Float(f)) => v.resize(len, *f),
            (Column::Double(v), AttributeValue::Double(f)) => v.resize(len, *f),
            (Column::Char(v), AttributeValue::Char(f)) => v.resize(len, *f),
            (Column::String(v), AttributeValue::String(f)) => v.resize(len, f.clone()),
            (Column::Object(v), AttributeValue::Object(f)) => v.resize(len, f.clone()),
            // The owning store keeps the default converted to the column kind.
            _ => {}
        }
    }

    fn get(&self, idx: usize) -> Option<AttributeValue> {
        Some(match self {
            Column::Bool(v) => AttributeValue::Bool(*v.get(idx)?),
            Column::Byte(v) => AttributeValue::Byte(*v.get(idx)?),
            Column::Short(v) => AttributeValue::Short(*v.get(idx)?),
            Column::Int(v) => AttributeValue::Int(*v.get(idx)?),
            Column::Long(v) => AttributeValue::Long(*v.get(idx)?),
            Column::Float(v) => AttributeValue::Float(*v.get(idx)?),
            Column::Double(v) => AttributeValue::Double(*v.get(idx)?),
            Column::Char(v) => AttributeValue::Char(*v.get(idx)?),
            Column::String(v) => AttributeValue::String(v.get(idx)?.clone()),
            Column::Object(v) => AttributeValue::Object(v.get(idx)?.clone()),
        })
    }

    /// Replace the slot at `idx`, returning the previous value. The slot must exist
    /// and `value` must be of the column kind.
    fn replace(&mut self, idx: usize, value: AttributeValue) -> Option<AttributeValue> {
        Some(match (self, value) {
            (Column::Bool(v), AttributeValue::Bool(n)) => {
                AttributeValue::Bool(std::mem::replace(v.get_mut(idx)?, n))
            }
            (Column::Byte(v), AttributeValue::Byte(n)) => {
                AttributeValue::Byte(std::mem::replace(v.get_mut(idx)?, n))
            }
            (Column::Short(v), AttributeValue::Short(n)) => {
                AttributeValue::Short(std::mem::replace(v.get_mut(idx)?, n))
            }
            (Column::Int(v), AttributeValue::Int(n)) => {
                AttributeValue::Int(std::mem::replace(v.get_mut(idx)?, n))
            }
            (Column::Long(v), AttributeValue::Long(n)) => {
                AttributeValue::Long(std::mem::replace(v.get_mut(idx)?, n))
            }
            (Column::Float(v), AttributeValue::Float(n)) => {
                AttributeValue::Float(std::mem::replace(v.get_mut(idx)?, n))
            }
            (Column::Double(v), AttributeValue::Double(n)) => {
                AttributeValue::Double(std::mem::replace(v.get_mut(idx)?, n))
            }
            (Column::Char(v), AttributeValue::Char(n)) => {
                AttributeValue::Char(std::mem::replace(v.get_mut(idx)?, n))
            }
            (Column::String(v), AttributeValue::String(n)) => {
                AttributeValue::String(std::mem::replace(v.get_mut(idx)?, n))
            }
            (Column::Object(v), AttributeValue::Object(n)) => {
                AttributeValue::Object(std::mem::replace(v.get_mut(idx)?, n))
            }
            _ => return None,
        })
    }

    /// Rough heap footprint in bytes
    pub fn heap_size(&self) -> usize {
        match self {
            Column::Bool(v) => v.len(),
            Column::Byte(v) => v.len(),
            Column::Short(v) => v.len() * 2,
            Column::Int(v) => v.len() * 4,
            Column::Long(v) => v.len() * 8,
            Column::Float(v) => v.len() * 4,
            Column::Double(v) => v.len() * 8,
            Column::Char(v) => v.len() * 2,
            Column::String(v) => v
                .iter()
                .map(|s| std::mem::size_of::<Option<String>>() + s.as_ref().map_or(0, String::len))
                .sum(),
            Column::Object(v) => v.len() * std::mem::size_of::<Option<ObjectValue>>(),
        }
    }
}

/// Typed, resizable value array for one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueStore {
    kind: ValueKind,
    default: AttributeValue,
    column: Column,
}

impl ValueStore {
    /// Create a store of `kind` with `capacity` slots holding `default`.
    pub fn new(kind: ValueKind, default: AttributeValue, capacity: usize) -> GraphResult<Self> {
        let default = default.convert(kind)?;
        let column = Column::filled(&default, capacity);
        Ok(ValueStore {
            kind,
            default,
            column,
        })
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn default_value(&self) -> &AttributeValue {
        &self.default
    }

    /// Change the value used for new and cleared slots. Existing slots keep their values.
    pub fn set_default(&mut self, default: AttributeValue) -> GraphResult<AttributeValue> {
        let default = default.convert(self.kind)?;
        Ok(std::mem::replace(&mut self.default, default))
    }

    pub fn capacity(&self) -> usize {
        self.column.len()
    }

    /// Grow to at least `capacity` slots. Shrinking requests are ignored.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.column.extend_to(capacity, &self.default);
    }

    pub fn read(&self, id: usize) -> GraphResult<AttributeValue> {
        self.column.get(id).ok_or(GraphError::IndexOutOfRange {
            index: id,
            capacity: self.capacity(),
        })
    }

    /// Write `value`, converted to the store kind, and return the previous value.
    /// Writing past the end extends the store.
    pub fn write(&mut self, id: usize, value: AttributeValue) -> GraphResult<AttributeValue> {
        let value = value.convert(self.kind)?;
        if id >= self.capacity() {
            self.set_capacity(id + 1);
        }
        let capacity = self.capacity();
        self.column
            .replace(id, value)
            .ok_or(GraphError::IndexOutOfRange { index: id, capacity })
    }

    pub fn read_string(&self, id: usize) -> GraphResult<Option<String>> {
        Ok(self.read(id)?.to_canonical_string())
    }

    pub fn write_string(&mut self, id: usize, text: Option<&str>) -> GraphResult<AttributeValue> {
        let value = match text {
            Some(text) => AttributeValue::parse(self.kind, text)?,
            None => self.kind.zero(),
        };
        self.write(id, value)
    }

    /// Reset the slot to the default, returning the previous value.
    pub fn clear(&mut self, id: usize) -> GraphResult<AttributeValue> {
        self.write(id, self.default.clone())
    }

    pub fn is_default(&self, id: usize) -> GraphResult<bool> {
        Ok(self.read(id)?.identical(&self.default))
    }

    pub fn column(&self) -> &Column {
        &self.column
    }

    pub fn heap_size(&self) -> usize {
        self.column.heap_size()
    }
}
