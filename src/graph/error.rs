//! Error types for graph operations

use super::types::{AttributeId, ElementType, TransactionId, VertexId};
use super::value::ValueKind;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during graph operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Vertex {0} not found")]
    VertexNotFound(VertexId),

    #[error("Transaction {0} not found")]
    TransactionNotFound(TransactionId),

    #[error("Invalid transaction: source vertex {0} does not exist")]
    InvalidTransactionSource(VertexId),

    #[error("Invalid transaction: destination vertex {0} does not exist")]
    InvalidTransactionDestination(VertexId),

    #[error("Attribute {0} not found")]
    UnknownAttribute(AttributeId),

    #[error("Attribute '{name}' already exists on {element_type}")]
    AttributeExists { element_type: ElementType, name: String },

    #[error("Attribute {attribute} belongs to {actual}, not {expected}")]
    WrongElementType {
        attribute: AttributeId,
        expected: ElementType,
        actual: ElementType,
    },

    #[error("No attribute merger registered with id '{0}'")]
    UnknownMerger(String),

    #[error("Element {id} of type {element_type} does not exist")]
    ElementNotFound { element_type: ElementType, id: u32 },

    #[error("Duplicate primary key on {element_type}: existing {existing} = [{existing_key}], new {duplicate} = [{duplicate_key}]")]
    DuplicateKey {
        element_type: ElementType,
        existing: u32,
        duplicate: u32,
        existing_key: String,
        duplicate_key: String,
    },

    #[error("Index {index} out of range for capacity {capacity}")]
    IndexOutOfRange { index: usize, capacity: usize },

    #[error("Timed out after {0:?} waiting for the graph lock")]
    LockTimeout(Duration),

    #[error("Write transaction was interrupted")]
    Interrupted,

    #[error("Cannot convert {from} to {to}")]
    Conversion { from: ValueKind, to: ValueKind },

    #[error("Invalid {kind} value: '{input}'")]
    InvalidValue { kind: ValueKind, input: String },

    #[error("Write transaction is already closed")]
    TransactionClosed,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,
}

/// Coarse classification of a [`GraphError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A reference to a missing vertex, transaction or attribute. Aborts the mutation.
    StructuralIntegrity,
    /// A commit would break a primary key.
    DuplicateKey,
    /// An id outside the addressable range. Indicates a caller bug.
    Capacity,
    /// A bounded lock wait expired. The caller may retry.
    LockTimeout,
    /// Cooperative cancellation of a write transaction.
    Interrupted,
    /// A value could not be converted or parsed.
    Value,
    /// The operation is not valid in the current handle or history state.
    State,
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::VertexNotFound(_)
            | GraphError::TransactionNotFound(_)
            | GraphError::InvalidTransactionSource(_)
            | GraphError::InvalidTransactionDestination(_)
            | GraphError::UnknownAttribute(_)
            | GraphError::AttributeExists { .. }
            | GraphError::WrongElementType { .. }
            | GraphError::UnknownMerger(_)
            | GraphError::ElementNotFound { .. } => ErrorKind::StructuralIntegrity,
            GraphError::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            GraphError::IndexOutOfRange { .. } => ErrorKind::Capacity,
            GraphError::LockTimeout(_) => ErrorKind::LockTimeout,
            GraphError::Interrupted => ErrorKind::Interrupted,
            GraphError::Conversion { .. } | GraphError::InvalidValue { .. } => ErrorKind::Value,
            GraphError::TransactionClosed | GraphError::NothingToUndo | GraphError::NothingToRedo => {
                ErrorKind::State
            }
        }
    }

    /// Whether retrying the same call later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::LockTimeout)
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            GraphError::InvalidTransactionDestination(VertexId::new(3)).kind(),
            ErrorKind::StructuralIntegrity
        );
        assert_eq!(
            GraphError::IndexOutOfRange { index: 9, capacity: 4 }.kind(),
            ErrorKind::Capacity
        );
        assert_eq!(GraphError::Interrupted.kind(), ErrorKind::Interrupted);
        assert!(GraphError::LockTimeout(Duration::from_millis(5)).is_retryable());
        assert!(!GraphError::TransactionClosed.is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = GraphError::InvalidTransactionDestination(VertexId::new(7));
        assert_eq!(
            err.to_string(),
            "Invalid transaction: destination vertex VertexId(7) does not exist"
        );
    }
}
