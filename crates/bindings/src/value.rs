//! Native values handed to and returned by user functions.

use std::sync::Arc;

/// Kind tags for declared parameter and return annotations.
///
/// A declaration may annotate a parameter with the value kind it expects;
/// indexing checks the annotation against the binding's accepted kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
	/// UTF-8 text.
	Str,
	/// Raw bytes.
	Bytes,
	/// Parsed JSON document.
	Json,
	/// Signed integer.
	Int,
	/// Double-precision float.
	Double,
	/// Boolean.
	Bool,
}

impl ValueKind {
	/// Returns the kind name, for diagnostics.
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Str => "str",
			Self::Bytes => "bytes",
			Self::Json => "json",
			Self::Int => "int",
			Self::Double => "double",
			Self::Bool => "bool",
		}
	}
}

/// Declared type annotation on a function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
	/// A plain value kind resolved by the binding set.
	Value(ValueKind),
	/// A named extension type resolved by the deferred path.
	Deferred(String),
}

/// An opaque value produced by a deferred binding extension.
///
/// Carries an extension-owned object (typically a client handle) that the
/// user function downcasts back to its concrete type.
#[derive(Clone)]
pub struct OpaqueValue {
	inner: Arc<dyn std::any::Any + Send + Sync>,
	type_name: &'static str,
}

impl OpaqueValue {
	/// Wraps an extension object.
	#[must_use]
	pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
		Self {
			inner: Arc::new(value),
			type_name: std::any::type_name::<T>(),
		}
	}

	/// Returns the wrapped object's type name, for diagnostics.
	#[must_use]
	pub const fn type_name(&self) -> &'static str {
		self.type_name
	}

	/// Borrows the wrapped object as `T`, if it is one.
	#[must_use]
	pub fn downcast_ref<T: Send + Sync + 'static>(&self) -> Option<&T> {
		self.inner.downcast_ref()
	}
}

impl std::fmt::Debug for OpaqueValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("OpaqueValue").field(&self.type_name).finish()
	}
}

impl PartialEq for OpaqueValue {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

/// A native value on the function side of the RPC boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	/// No value.
	Unit,
	/// UTF-8 text.
	Str(String),
	/// Raw bytes.
	Bytes(Vec<u8>),
	/// Parsed JSON document.
	Json(serde_json::Value),
	/// Signed integer.
	Int(i64),
	/// Double-precision float.
	Double(f64),
	/// Boolean.
	Bool(bool),
	/// Extension-owned object from a deferred binding.
	Opaque(OpaqueValue),
}

impl Value {
	/// Returns the kind name of this value, for diagnostics.
	#[must_use]
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Unit => "unit",
			Self::Str(_) => "str",
			Self::Bytes(_) => "bytes",
			Self::Json(_) => "json",
			Self::Int(_) => "int",
			Self::Double(_) => "double",
			Self::Bool(_) => "bool",
			Self::Opaque(_) => "opaque",
		}
	}

	/// Returns true when this value matches the annotated kind.
	#[must_use]
	pub const fn matches(&self, kind: ValueKind) -> bool {
		matches!(
			(self, kind),
			(Self::Str(_), ValueKind::Str)
				| (Self::Bytes(_), ValueKind::Bytes)
				| (Self::Json(_), ValueKind::Json)
				| (Self::Int(_), ValueKind::Int)
				| (Self::Double(_), ValueKind::Double)
				| (Self::Bool(_), ValueKind::Bool)
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn opaque_downcast() {
		let value = OpaqueValue::new(vec![1u8, 2, 3]);
		assert_eq!(value.downcast_ref::<Vec<u8>>(), Some(&vec![1u8, 2, 3]));
		assert!(value.downcast_ref::<String>().is_none());
	}

	#[test]
	fn value_kind_matching() {
		assert!(Value::Str("x".into()).matches(ValueKind::Str));
		assert!(!Value::Str("x".into()).matches(ValueKind::Bytes));
		assert!(!Value::Unit.matches(ValueKind::Str));
	}
}
