use std::collections::BTreeMap;
use std::sync::Arc;

use tether_bindings::{
	BindingError, BindingSet, DeferredKey, ExtensionRegistry, OpaqueValue, Value, ValueKind,
};
use tether_proto::{DataType, Datum};

use super::*;
use crate::app::ParamDecl;

fn noop() -> Handler {
	Handler::sync(|_| Ok(None))
}

fn spec(name: &str, direction: Direction, binding_type: &str) -> BindingSpec {
	BindingSpec {
		name: name.to_string(),
		direction,
		binding_type: binding_type.to_string(),
		data_type: DataType::Undefined,
	}
}

fn decl(name: &str, params: Vec<ParamDecl>, bindings: Vec<BindingSpec>) -> FunctionDecl {
	FunctionDecl {
		name: name.to_string(),
		handler: noop(),
		params,
		bindings,
		return_annotation: None,
	}
}

fn set() -> BindingSet {
	BindingSet::builtin()
}

#[test]
fn well_formed_declaration_indexes() {
	let decl = decl(
		"echo",
		vec![ParamDecl::input("payload")],
		vec![
			spec("payload", Direction::In, "signal"),
			spec("$return", Direction::Out, "generic"),
		],
	);
	let info = index(&decl, &set(), "/app").unwrap();
	assert_eq!(info.name, "echo");
	assert_eq!(info.directory, "/app");
	assert_eq!(info.trigger_param, "payload");
	assert!(info.has_return);
	assert!(!info.is_async);
	assert!(!info.requires_context);
	assert_eq!(info.input_types.len(), 1);
	assert!(info.output_types.is_empty());
	assert_eq!(info.return_type.as_ref().unwrap().binding_type, "generic");
}

#[test]
fn indexing_is_idempotent() {
	let decl = decl(
		"echo",
		vec![ParamDecl::input("payload")],
		vec![
			spec("payload", Direction::In, "signal"),
			spec("$return", Direction::Out, "generic"),
		],
	);
	let first = index(&decl, &set(), "/app").unwrap();
	let second = index(&decl, &set(), "/app").unwrap();
	assert_eq!(first.function_id, second.function_id);
	assert_eq!(first.trigger_param, second.trigger_param);
	assert_eq!(first.has_return, second.has_return);
	assert_eq!(
		first.input_types["payload"].binding_type,
		second.input_types["payload"].binding_type
	);
}

#[test]
fn derived_ids_are_stable_and_distinct() {
	assert_eq!(derive_function_id("echo"), derive_function_id("echo"));
	assert_ne!(derive_function_id("echo"), derive_function_id("other"));
}

#[test]
fn inout_binding_is_refused() {
	let decl = decl(
		"orders",
		vec![ParamDecl::input("payload")],
		vec![spec("payload", Direction::InOut, "signal")],
	);
	let err = index(&decl, &set(), "/app").unwrap_err();
	assert!(matches!(err.kind, LoadErrorKind::InoutBinding));
	assert!(err.to_string().contains("orders"));
}

#[test]
fn return_binding_must_be_out() {
	let decl = decl(
		"orders",
		vec![ParamDecl::input("payload")],
		vec![
			spec("payload", Direction::In, "signal"),
			spec("$return", Direction::In, "generic"),
		],
	);
	let err = index(&decl, &set(), "/app").unwrap_err();
	assert!(matches!(err.kind, LoadErrorKind::ReturnNotOut));
}

#[test]
fn exactly_one_trigger_is_required() {
	let none = decl(
		"orders",
		vec![ParamDecl::input("payload")],
		vec![spec("payload", Direction::In, "generic")],
	);
	assert!(matches!(
		index(&none, &set(), "/app").unwrap_err().kind,
		LoadErrorKind::MissingTrigger
	));

	let two = decl(
		"orders",
		vec![ParamDecl::input("a"), ParamDecl::input("b")],
		vec![
			spec("a", Direction::In, "signal"),
			spec("b", Direction::In, "signal"),
		],
	);
	match index(&two, &set(), "/app").unwrap_err().kind {
		LoadErrorKind::MultipleTriggers(names) => assert_eq!(names, ["a", "b"]),
		other => panic!("unexpected: {other:?}"),
	}
}

#[test]
fn params_and_bindings_must_match_both_ways() {
	let extra_param = decl(
		"orders",
		vec![ParamDecl::input("payload"), ParamDecl::input("ghost")],
		vec![spec("payload", Direction::In, "signal")],
	);
	match index(&extra_param, &set(), "/app").unwrap_err().kind {
		LoadErrorKind::UnboundParams(names) => assert_eq!(names, ["ghost"]),
		other => panic!("unexpected: {other:?}"),
	}

	let extra_binding = decl(
		"orders",
		vec![ParamDecl::input("payload")],
		vec![
			spec("payload", Direction::In, "signal"),
			spec("orphan", Direction::Out, "generic"),
		],
	);
	match index(&extra_binding, &set(), "/app").unwrap_err().kind {
		LoadErrorKind::UnusedBindings(names) => assert_eq!(names, ["orphan"]),
		other => panic!("unexpected: {other:?}"),
	}
}

#[test]
fn output_roles_must_agree() {
	let out_binding_in_param = decl(
		"orders",
		vec![ParamDecl::input("payload"), ParamDecl::input("result")],
		vec![
			spec("payload", Direction::In, "signal"),
			spec("result", Direction::Out, "generic"),
		],
	);
	assert!(matches!(
		index(&out_binding_in_param, &set(), "/app").unwrap_err().kind,
		LoadErrorKind::OutBindingInputParam { .. }
	));

	let out_param_in_binding = decl(
		"orders",
		vec![ParamDecl::input("payload"), ParamDecl::output("result")],
		vec![
			spec("payload", Direction::In, "signal"),
			spec("result", Direction::In, "generic"),
		],
	);
	assert!(matches!(
		index(&out_param_in_binding, &set(), "/app").unwrap_err().kind,
		LoadErrorKind::OutParamInputBinding { .. }
	));
}

#[test]
fn annotation_must_pass_the_binding_check() {
	let decl = decl(
		"orders",
		vec![ParamDecl::input("payload").annotated(ValueKind::Int)],
		vec![spec("payload", Direction::In, "signal")],
	);
	match index(&decl, &set(), "/app").unwrap_err().kind {
		LoadErrorKind::AnnotationMismatch { param, annotation, .. } => {
			assert_eq!(param, "payload");
			assert_eq!(annotation, "int");
		}
		other => panic!("unexpected: {other:?}"),
	}
}

#[test]
fn primitive_annotation_downgrades_to_generic() {
	let decl = decl(
		"orders",
		vec![ParamDecl::input("payload").annotated(ValueKind::Str)],
		vec![
			spec("payload", Direction::In, "signal"),
			spec("$return", Direction::Out, "generic"),
		],
	);
	let info = index(&decl, &set(), "/app").unwrap();
	// The trigger is still detected from the declared binding, but decoding
	// goes through the generic fallback.
	assert_eq!(info.trigger_param, "payload");
	assert_eq!(info.input_types["payload"].binding_type, "generic");
}

#[test]
fn context_parameter_is_positional() {
	let decl = decl(
		"orders",
		vec![ParamDecl::input("payload"), ParamDecl::input("context")],
		vec![
			spec("payload", Direction::In, "signal"),
			spec("$return", Direction::Out, "generic"),
		],
	);
	let info = index(&decl, &set(), "/app").unwrap();
	assert!(info.requires_context);
	assert!(!info.input_types.contains_key("context"));
}

#[test]
fn trigger_only_function_has_no_return() {
	let decl = decl(
		"fire",
		vec![ParamDecl::input("payload")],
		vec![spec("payload", Direction::In, "signal")],
	);
	let info = index(&decl, &set(), "/app").unwrap();
	assert!(!info.has_return);
	assert!(info.return_type.is_none());
}

#[test]
fn implicit_output_binding_implies_a_return() {
	let decl = decl(
		"orders",
		vec![ParamDecl::input("payload"), ParamDecl::input("doc")],
		vec![
			spec("payload", Direction::In, "signal"),
			spec("doc", Direction::In, "generic"),
		],
	);
	let info = index(&decl, &set(), "/app").unwrap();
	assert!(info.has_return);
	assert_eq!(info.return_type.as_ref().unwrap().binding_type, "generic");
}

#[test]
fn return_annotation_must_pass_the_binding_check() {
	let mut bad = decl(
		"orders",
		vec![ParamDecl::input("payload")],
		vec![
			spec("payload", Direction::In, "signal"),
			spec("$return", Direction::Out, "signal"),
		],
	);
	bad.return_annotation = Some(ValueKind::Json);
	assert!(matches!(
		index(&bad, &set(), "/app").unwrap_err().kind,
		LoadErrorKind::ReturnAnnotationMismatch { .. }
	));
}

struct BlobExtension;

impl ExtensionRegistry for BlobExtension {
	fn supports(&self, declared_type: &str) -> bool {
		declared_type == "BlobClient"
	}

	fn decode(
		&self,
		_key: &DeferredKey,
		_datum: Datum,
		_trigger_metadata: &BTreeMap<String, Datum>,
	) -> Result<Value, BindingError> {
		Ok(Value::Opaque(OpaqueValue::new("client")))
	}
}

#[test]
fn deferred_annotation_requires_a_supporting_extension() {
	let make = || {
		decl(
			"copy_blob",
			vec![
				ParamDecl::input("payload"),
				ParamDecl::input("client").deferred("BlobClient"),
			],
			vec![
				spec("payload", Direction::In, "signal"),
				spec("client", Direction::In, "blob"),
			],
		)
	};

	assert!(matches!(
		index(&make(), &set(), "/app").unwrap_err().kind,
		LoadErrorKind::AnnotationMismatch { .. }
	));

	let with_ext = BindingSet::builtin().with_extensions(Arc::new(BlobExtension));
	let info = index(&make(), &with_ext, "/app").unwrap();
	assert!(info.input_types["client"].deferred);
}

#[test]
fn registry_register_lookup_clear() {
	let registry = Registry::new();
	assert!(registry.is_empty());

	let decl = decl(
		"echo",
		vec![ParamDecl::input("payload")],
		vec![spec("payload", Direction::In, "signal")],
	);
	let info = registry.register(index(&decl, &set(), "/app").unwrap());
	assert_eq!(registry.len(), 1);
	assert_eq!(
		registry.lookup(&info.function_id).unwrap().name,
		"echo"
	);
	assert!(registry.find_by_name("echo").is_some());
	assert!(registry.lookup(&FunctionId("missing".into())).is_none());

	// A host-assigned alias resolves to the same descriptor.
	registry.register_as(FunctionId("host-key".into()), info.clone());
	assert_eq!(registry.lookup(&FunctionId("host-key".into())).unwrap().name, "echo");

	registry.clear();
	assert!(registry.is_empty());
}
