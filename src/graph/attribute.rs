//! Attribute descriptors

use super::types::{AttributeId, ElementType};
use super::value::{AttributeValue, ValueKind};
use serde::{Deserialize, Serialize};

/// Metadata of a registered attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    pub element_type: ElementType,
    pub name: String,
    pub kind: ValueKind,
    pub description: String,
    pub default: AttributeValue,
    /// Id of the attribute merger in the graph's merger registry
    pub merger: Option<String>,
}

/// Definition of an attribute to be added to a graph.
///
/// ```
/// use dualgraph::{AttributeSpec, ElementType, ValueKind};
///
/// let spec = AttributeSpec::new(ElementType::Vertex, "label", ValueKind::String)
///     .with_description("display label")
///     .with_merger("concatenate");
/// assert_eq!(spec.name, "label");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub element_type: ElementType,
    pub name: String,
    pub kind: ValueKind,
    pub description: String,
    /// Defaults to the zero value of `kind`
    pub default: Option<AttributeValue>,
    pub merger: Option<String>,
}

impl AttributeSpec {
    pub fn new(element_type: ElementType, name: impl Into<String>, kind: ValueKind) -> Self {
        AttributeSpec {
            element_type,
            name: name.into(),
            kind,
            description: String::new(),
            default: None,
            merger: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, default: impl Into<AttributeValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_merger(mut self, merger: impl Into<String>) -> Self {
        self.merger = Some(merger.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_builder() {
        let spec = AttributeSpec::new(ElementType::Transaction, "weight", ValueKind::Double)
            .with_default(1.0)
            .with_description("edge weight");
        assert_eq!(spec.default, Some(AttributeValue::Double(1.0)));
        assert_eq!(spec.description, "edge weight");
        assert!(spec.merger.is_none());
    }
}
