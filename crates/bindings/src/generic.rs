//! Fallback binding for type tags with no registered binding.

use std::collections::BTreeMap;

use tether_proto::Datum;

use crate::binding::Binding;
use crate::error::{BindingError, Result};
use crate::value::{Value, ValueKind};

/// The generic fallback binding.
///
/// Accepts only primitive shapes: string, bytes and JSON on decode, and the
/// plain scalar kinds on encode. Anything richer needs a registered binding.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericBinding;

impl Binding for GenericBinding {
	fn check_input_type(&self, kind: ValueKind) -> bool {
		matches!(kind, ValueKind::Str | ValueKind::Bytes)
	}

	fn check_output_type(&self, kind: ValueKind) -> bool {
		matches!(kind, ValueKind::Str | ValueKind::Bytes)
	}

	fn has_implicit_output(&self) -> bool {
		true
	}

	fn decode(&self, datum: Datum, _trigger_metadata: &BTreeMap<String, Datum>) -> Result<Value> {
		match datum {
			Datum::String(text) => Ok(Value::Str(text)),
			Datum::Bytes(bytes) => Ok(Value::Bytes(bytes)),
			Datum::Json(raw) => Ok(Value::Json(serde_json::from_str(&raw)?)),
			Datum::None => Ok(Value::Unit),
			Datum::Int(_) | Datum::Double(_) | Datum::Bool(_) => Err(BindingError::NotSupported),
		}
	}

	fn encode(&self, value: Value) -> Result<Datum> {
		match value {
			Value::Str(text) => Ok(Datum::String(text)),
			Value::Bytes(bytes) => Ok(Datum::Bytes(bytes)),
			Value::Json(doc) => Ok(Datum::Json(serde_json::to_string(&doc)?)),
			Value::Int(n) => Ok(Datum::Int(n)),
			Value::Double(n) => Ok(Datum::Double(n)),
			Value::Bool(b) => Ok(Datum::Bool(b)),
			Value::Unit => Ok(Datum::None),
			Value::Opaque(_) => Err(BindingError::NotSupported),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn no_metadata() -> BTreeMap<String, Datum> {
		BTreeMap::new()
	}

	#[test]
	fn decodes_primitive_shapes() {
		let binding = GenericBinding;
		assert_eq!(
			binding.decode(Datum::String("hi".into()), &no_metadata()).unwrap(),
			Value::Str("hi".into())
		);
		assert_eq!(
			binding.decode(Datum::Bytes(vec![1, 2]), &no_metadata()).unwrap(),
			Value::Bytes(vec![1, 2])
		);
		assert_eq!(
			binding.decode(Datum::Json(r#"{"n":1}"#.into()), &no_metadata()).unwrap(),
			Value::Json(serde_json::json!({"n": 1}))
		);
		assert_eq!(binding.decode(Datum::None, &no_metadata()).unwrap(), Value::Unit);
	}

	#[test]
	fn refuses_scalar_decode() {
		let binding = GenericBinding;
		assert!(matches!(
			binding.decode(Datum::Int(3), &no_metadata()),
			Err(BindingError::NotSupported)
		));
		assert!(matches!(
			binding.decode(Datum::Bool(true), &no_metadata()),
			Err(BindingError::NotSupported)
		));
	}

	#[test]
	fn invalid_json_is_an_error() {
		let binding = GenericBinding;
		assert!(matches!(
			binding.decode(Datum::Json("{broken".into()), &no_metadata()),
			Err(BindingError::InvalidJson(_))
		));
	}

	#[test]
	fn encode_decode_roundtrips_supported_pairs() {
		let binding = GenericBinding;
		for value in [
			Value::Str("text".into()),
			Value::Bytes(vec![9, 8, 7]),
			Value::Json(serde_json::json!(["a", 1, null])),
			Value::Unit,
		] {
			let datum = binding.encode(value.clone()).unwrap();
			assert_eq!(binding.decode(datum, &no_metadata()).unwrap(), value);
		}
	}

	#[test]
	fn refuses_opaque_encode() {
		let binding = GenericBinding;
		let value = Value::Opaque(crate::value::OpaqueValue::new(()));
		assert!(matches!(binding.encode(value), Err(BindingError::NotSupported)));
	}
}
