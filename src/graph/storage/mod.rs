//! Attribute value storage

pub mod columnar;

pub use columnar::{Column, ValueStore};
