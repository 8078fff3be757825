// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed view over the loosely-typed crash document written by the native
//! crash handler.
//!
//! The raw document is a JSON tree. [`CrashDocument`] owns that tree and
//! exposes path-addressed accessors that either produce the requested Rust
//! type or fail with a [`DocumentError`] naming the full dotted path:
//!
//! ```
//! use loom_crash_core::{CrashDocument, DocumentError};
//! use serde_json::json;
//!
//! let doc = CrashDocument::try_from(json!({
//!     "crash": { "error": { "signal": { "name": "SIGSEGV" } } }
//! }))
//! .unwrap();
//!
//! let name: String = doc.value(&["crash", "error", "signal", "name"]).unwrap();
//! assert_eq!(name, "SIGSEGV");
//!
//! let code: Option<String> = doc
//!     .value_if_present(&["crash", "error", "signal", "code_name"])
//!     .unwrap();
//! assert!(code.is_none());
//!
//! let err = doc.value::<u64>(&["crash", "error", "signal", "name"]).unwrap_err();
//! assert!(matches!(err, DocumentError::TypeMismatch { .. }));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DocumentError, Result};

/// Shape of a node in the raw document, used in error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
	Null,
	Bool,
	Integer,
	Float,
	String,
	Array,
	Map,
}

impl ValueKind {
	pub fn of(value: &Value) -> Self {
		match value {
			Value::Null => Self::Null,
			Value::Bool(_) => Self::Bool,
			Value::Number(n) if n.is_f64() => Self::Float,
			Value::Number(_) => Self::Integer,
			Value::String(_) => Self::String,
			Value::Array(_) => Self::Array,
			Value::Object(_) => Self::Map,
		}
	}
}

impl fmt::Display for ValueKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Null => write!(f, "null"),
			Self::Bool => write!(f, "bool"),
			Self::Integer => write!(f, "integer"),
			Self::Float => write!(f, "float"),
			Self::String => write!(f, "string"),
			Self::Array => write!(f, "array"),
			Self::Map => write!(f, "map"),
		}
	}
}

fn dotted(path: &[&str]) -> String {
	path.join(".")
}

fn mismatch(path: &str, expected: ValueKind, value: &Value) -> DocumentError {
	DocumentError::TypeMismatch {
		path: path.to_string(),
		expected,
		actual: ValueKind::of(value),
	}
}

/// Conversion from a raw document node into a typed value.
pub trait FromValue: Sized {
	/// Kind reported as `expected` when the conversion fails.
	const KIND: ValueKind;

	fn from_value(value: &Value, path: &str) -> Result<Self>;
}

impl FromValue for String {
	const KIND: ValueKind = ValueKind::String;

	fn from_value(value: &Value, path: &str) -> Result<Self> {
		value
			.as_str()
			.map(str::to_owned)
			.ok_or_else(|| mismatch(path, Self::KIND, value))
	}
}

impl FromValue for bool {
	const KIND: ValueKind = ValueKind::Bool;

	fn from_value(value: &Value, path: &str) -> Result<Self> {
		value
			.as_bool()
			.ok_or_else(|| mismatch(path, Self::KIND, value))
	}
}

impl FromValue for i64 {
	const KIND: ValueKind = ValueKind::Integer;

	fn from_value(value: &Value, path: &str) -> Result<Self> {
		let Value::Number(n) = value else {
			return Err(mismatch(path, Self::KIND, value));
		};
		n.as_i64()
			.or_else(|| {
				n.as_f64()
					.filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
					.map(|f| f as i64)
			})
			.ok_or_else(|| mismatch(path, Self::KIND, value))
	}
}

impl FromValue for u64 {
	const KIND: ValueKind = ValueKind::Integer;

	fn from_value(value: &Value, path: &str) -> Result<Self> {
		let Value::Number(n) = value else {
			return Err(mismatch(path, Self::KIND, value));
		};
		n.as_u64()
			.or_else(|| {
				n.as_f64()
					.filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f < u64::MAX as f64)
					.map(|f| f as u64)
			})
			.ok_or_else(|| mismatch(path, Self::KIND, value))
	}
}

impl FromValue for f64 {
	const KIND: ValueKind = ValueKind::Float;

	fn from_value(value: &Value, path: &str) -> Result<Self> {
		value
			.as_f64()
			.ok_or_else(|| mismatch(path, Self::KIND, value))
	}
}

impl FromValue for CrashDocument {
	const KIND: ValueKind = ValueKind::Map;

	fn from_value(value: &Value, path: &str) -> Result<Self> {
		match value {
			Value::Object(fields) => Ok(Self {
				fields: fields.clone(),
			}),
			other => Err(mismatch(path, Self::KIND, other)),
		}
	}
}

impl<T: FromValue> FromValue for Vec<T> {
	const KIND: ValueKind = ValueKind::Array;

	fn from_value(value: &Value, path: &str) -> Result<Self> {
		let Value::Array(items) = value else {
			return Err(mismatch(path, Self::KIND, value));
		};
		items
			.iter()
			.enumerate()
			.map(|(i, item)| T::from_value(item, &format!("{path}.{i}")))
			.collect()
	}
}

/// An owned crash document whose root is always a map.
///
/// Mutation goes through `&mut self`; stages take the document by value and
/// hand back the transformed one, so nothing is shared between stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrashDocument {
	fields: Map<String, Value>,
}

impl CrashDocument {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn as_map(&self) -> &Map<String, Value> {
		&self.fields
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	/// Reads the value at `path` as `T`.
	///
	/// A `null` leaf counts as absent.
	pub fn value<T: FromValue>(&self, path: &[&str]) -> Result<T> {
		let node = self.lookup(path)?;
		T::from_value(node, &dotted(path))
	}

	/// Like [`value`](Self::value) but maps `NotFound` to `None`.
	pub fn value_if_present<T: FromValue>(&self, path: &[&str]) -> Result<Option<T>> {
		match self.value(path) {
			Ok(value) => Ok(Some(value)),
			Err(err) if err.is_not_found() => Ok(None),
			Err(err) => Err(err),
		}
	}

	/// Returns true when a non-null value exists at `path`.
	pub fn contains(&self, path: &[&str]) -> bool {
		self.lookup(path).is_ok()
	}

	/// Writes `value` at `path`, creating intermediate maps as needed.
	pub fn set_value(&mut self, path: &[&str], value: impl Into<Value>) -> Result<()> {
		let Some((last, parents)) = path.split_last() else {
			return Err(DocumentError::NotFound {
				path: String::new(),
			});
		};

		let mut current = &mut self.fields;
		for (depth, key) in parents.iter().enumerate() {
			let entry = current
				.entry((*key).to_string())
				.or_insert_with(|| Value::Object(Map::new()));
			if entry.is_null() {
				*entry = Value::Object(Map::new());
			}
			current = match entry {
				Value::Object(map) => map,
				other => {
					return Err(mismatch(&dotted(&path[..=depth]), ValueKind::Map, other));
				}
			};
		}

		current.insert((*last).to_string(), value.into());
		Ok(())
	}

	fn lookup(&self, path: &[&str]) -> Result<&Value> {
		let Some((last, parents)) = path.split_last() else {
			return Err(DocumentError::NotFound {
				path: String::new(),
			});
		};

		let mut current = &self.fields;
		for (depth, key) in parents.iter().enumerate() {
			current = match current.get(*key) {
				Some(Value::Object(map)) => map,
				Some(Value::Null) | None => {
					return Err(DocumentError::NotFound {
						path: dotted(path),
					});
				}
				Some(other) => {
					return Err(mismatch(&dotted(&path[..=depth]), ValueKind::Map, other));
				}
			};
		}

		match current.get(*last) {
			Some(Value::Null) | None => Err(DocumentError::NotFound {
				path: dotted(path),
			}),
			Some(value) => Ok(value),
		}
	}
}

impl TryFrom<Value> for CrashDocument {
	type Error = DocumentError;

	fn try_from(value: Value) -> Result<Self> {
		match value {
			Value::Object(fields) => Ok(Self { fields }),
			other => Err(DocumentError::UnsupportedInputShape {
				actual: ValueKind::of(&other),
			}),
		}
	}
}

impl From<CrashDocument> for Value {
	fn from(doc: CrashDocument) -> Self {
		Value::Object(doc.fields)
	}
}
