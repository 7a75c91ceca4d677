//! Appending decoded list pages to caller-owned collections.

use std::collections::VecDeque;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::GraphError;

/// A growable destination for the elements of a JSON array.
///
/// Implementations decode the whole array before touching `self`, so a
/// failed call leaves the destination exactly as it was.
pub trait Accumulate {
    /// Decode `data` as a JSON array, append its elements and return how
    /// many were appended.
    ///
    /// # Errors
    /// [`GraphError::Decode`] if `data` is not an array of the element type,
    /// [`GraphError::NotACollection`] if the destination cannot grow.
    fn accumulate(&mut self, data: &[u8]) -> Result<usize, GraphError>;
}

impl<T: DeserializeOwned> Accumulate for Vec<T> {
    fn accumulate(&mut self, data: &[u8]) -> Result<usize, GraphError> {
        let items: Vec<T> = serde_json::from_slice(data)?;
        let added = items.len();
        self.extend(items);
        Ok(added)
    }
}

impl<T: DeserializeOwned> Accumulate for VecDeque<T> {
    fn accumulate(&mut self, data: &[u8]) -> Result<usize, GraphError> {
        let items: Vec<T> = serde_json::from_slice(data)?;
        let added = items.len();
        self.extend(items);
        Ok(added)
    }
}

/// A dynamic value only accumulates while it is an array.
impl Accumulate for Value {
    fn accumulate(&mut self, data: &[u8]) -> Result<usize, GraphError> {
        match self {
            Value::Array(existing) => {
                let items: Vec<Value> = serde_json::from_slice(data)?;
                let added = items.len();
                existing.extend(items);
                Ok(added)
            }
            other => Err(GraphError::NotACollection {
                found: kind_of(other),
            }),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Append the elements of the JSON array `data` to `dest`.
///
/// # Errors
/// See [`Accumulate::accumulate`].
pub fn append_json<C: Accumulate + ?Sized>(data: &[u8], dest: &mut C) -> Result<usize, GraphError> {
    dest.accumulate(data)
}
