//! Entry points translating between wire data and native values.
//!
//! These wrap the raw [`Binding`] calls and turn the bare
//! [`BindingError::NotSupported`] refusal into errors that name the datum,
//! value and binding involved, so invocation failures are descriptive.

use std::collections::BTreeMap;

use tether_proto::{Datum, ParameterBinding};

use crate::binding::BindingSet;
use crate::deferred::DeferredKey;
use crate::error::{BindingError, Result};
use crate::value::{Annotation, Value};

/// Decodes one incoming parameter value.
///
/// Deferred parameters (annotated with an extension type the attached
/// registry supports) are delegated; everything else goes through the
/// binding resolved from the type tag, with the generic fallback for
/// unregistered tags.
///
/// # Errors
///
/// [`BindingError::DecodeUnsupported`] when the binding refuses the datum,
/// [`BindingError::NoExtension`] when a deferred parameter has no registry,
/// and whatever the binding itself raises otherwise.
pub fn from_incoming(
	set: &BindingSet,
	binding_type: &str,
	parameter: &str,
	datum: Datum,
	trigger_metadata: &BTreeMap<String, Datum>,
	annotation: Option<&Annotation>,
	function_name: &str,
) -> Result<Value> {
	if let Some(Annotation::Deferred(declared_type)) = annotation {
		let Some(extensions) = set.extensions() else {
			return Err(BindingError::NoExtension(declared_type.clone()));
		};
		if !extensions.supports(declared_type) {
			return Err(BindingError::NoExtension(declared_type.clone()));
		}
		let key = DeferredKey {
			parameter: parameter.to_string(),
			declared_type: declared_type.clone(),
			function: function_name.to_string(),
		};
		return extensions.decode(&key, datum, trigger_metadata);
	}

	let datum_kind = datum.kind();
	set.get(binding_type)
		.decode(datum, trigger_metadata)
		.map_err(|err| match err {
			BindingError::NotSupported => BindingError::DecodeUnsupported {
				datum: datum_kind,
				binding: binding_type.to_string(),
			},
			other => other,
		})
}

/// Encodes one outgoing value into a wire datum.
///
/// # Errors
///
/// [`BindingError::EncodeUnsupported`] when the binding refuses the value,
/// and whatever the binding itself raises otherwise.
pub fn to_outgoing_datum(set: &BindingSet, binding_type: &str, value: Value) -> Result<Datum> {
	let value_kind = value.kind();
	set.get(binding_type).encode(value).map_err(|err| match err {
		BindingError::NotSupported => BindingError::EncodeUnsupported {
			value: value_kind,
			binding: binding_type.to_string(),
		},
		other => other,
	})
}

/// Encodes one outgoing value as a named parameter binding.
///
/// # Errors
///
/// Same as [`to_outgoing_datum`].
pub fn to_outgoing_param(
	set: &BindingSet,
	binding_type: &str,
	name: &str,
	value: Value,
) -> Result<ParameterBinding> {
	let data = to_outgoing_datum(set, binding_type, value)?;
	Ok(ParameterBinding { name: name.to_string(), data })
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::deferred::ExtensionRegistry;
	use crate::value::{OpaqueValue, ValueKind};

	fn no_metadata() -> BTreeMap<String, Datum> {
		BTreeMap::new()
	}

	#[test]
	fn decode_refusal_names_datum_and_binding() {
		let set = BindingSet::builtin();
		let err = from_incoming(
			&set,
			"generic-ish",
			"p",
			Datum::Int(1),
			&no_metadata(),
			None,
			"fn",
		)
		.unwrap_err();
		let message = err.to_string();
		assert!(message.contains("int"), "{message}");
		assert!(message.contains("generic-ish"), "{message}");
	}

	#[test]
	fn encode_refusal_names_value_and_binding() {
		let set = BindingSet::builtin();
		let err = to_outgoing_datum(&set, "signal", Value::Str("x".into())).unwrap_err();
		assert!(matches!(err, BindingError::EncodeUnsupported { .. }));
	}

	#[test]
	fn outgoing_param_carries_the_name() {
		let set = BindingSet::builtin();
		let param = to_outgoing_param(&set, "blob-ish", "result", Value::Str("done".into())).unwrap();
		assert_eq!(param.name, "result");
		assert_eq!(param.data, Datum::String("done".into()));
	}

	struct ClientFactory;

	impl ExtensionRegistry for ClientFactory {
		fn supports(&self, declared_type: &str) -> bool {
			declared_type == "BlobClient"
		}

		fn decode(
			&self,
			key: &DeferredKey,
			datum: Datum,
			_trigger_metadata: &BTreeMap<String, Datum>,
		) -> Result<Value> {
			assert_eq!(key.parameter, "client");
			assert_eq!(key.function, "copy_blob");
			let Datum::Json(raw) = datum else {
				return Err(BindingError::NotSupported);
			};
			Ok(Value::Opaque(OpaqueValue::new(raw)))
		}
	}

	#[test]
	fn deferred_annotation_delegates_to_the_extension() {
		let set = BindingSet::builtin().with_extensions(Arc::new(ClientFactory));
		let annotation = Annotation::Deferred("BlobClient".into());
		let value = from_incoming(
			&set,
			"blob-ish",
			"client",
			Datum::Json(r#"{"resource":"container/a.txt"}"#.into()),
			&no_metadata(),
			Some(&annotation),
			"copy_blob",
		)
		.unwrap();
		assert!(matches!(value, Value::Opaque(_)));
	}

	#[test]
	fn deferred_without_registry_is_an_error() {
		let set = BindingSet::builtin();
		let annotation = Annotation::Deferred("BlobClient".into());
		let err = from_incoming(
			&set,
			"blob-ish",
			"client",
			Datum::None,
			&no_metadata(),
			Some(&annotation),
			"copy_blob",
		)
		.unwrap_err();
		assert!(matches!(err, BindingError::NoExtension(_)));
	}

	#[test]
	fn value_annotation_does_not_touch_the_deferred_path() {
		let set = BindingSet::builtin();
		let annotation = Annotation::Value(ValueKind::Str);
		let value = from_incoming(
			&set,
			"anything",
			"p",
			Datum::String("plain".into()),
			&no_metadata(),
			Some(&annotation),
			"fn",
		)
		.unwrap();
		assert_eq!(value, Value::Str("plain".into()));
	}
}
