//! Built-in trigger binding for host-raised signals.

use std::collections::BTreeMap;

use tether_proto::Datum;

use crate::binding::Binding;
use crate::error::{BindingError, Result};
use crate::value::{Value, ValueKind};

/// Trigger binding for payloads pushed by the host.
///
/// Input-only: the payload arrives as text, bytes or JSON. Trigger metadata
/// travels separately and is not folded into the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalTrigger;

impl Binding for SignalTrigger {
	fn has_trigger_support(&self) -> bool {
		true
	}

	fn check_input_type(&self, kind: ValueKind) -> bool {
		matches!(kind, ValueKind::Str | ValueKind::Bytes | ValueKind::Json)
	}

	fn check_output_type(&self, _kind: ValueKind) -> bool {
		false
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

	fn encode(&self, _value: Value) -> Result<Datum> {
		// Triggers never flow back out.
		Err(BindingError::NotSupported)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_json_payload() {
		let value = SignalTrigger
			.decode(Datum::Json(r#"{"fired":true}"#.into()), &BTreeMap::new())
			.unwrap();
		assert_eq!(value, Value::Json(serde_json::json!({"fired": true})));
	}

	#[test]
	fn refuses_output_direction() {
		assert!(!SignalTrigger.check_output_type(ValueKind::Str));
		assert!(matches!(
			SignalTrigger.encode(Value::Str("x".into())),
			Err(BindingError::NotSupported)
		));
	}
}
