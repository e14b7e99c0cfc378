//! Function descriptors, indexing and the process-wide registry.
//!
//! Indexing turns a [`FunctionDecl`] into an immutable [`FunctionInfo`]
//! descriptor, validating the declaration on the way; the [`Registry`]
//! stores descriptors in an atomically swapped snapshot map that is read
//! concurrently by invocations and repopulated wholesale on reload.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tether_bindings::{Annotation, BindingSet, ValueKind};
use tether_proto::{BindingSpec, Direction, FunctionId, RETURN_BINDING};
use uuid::Uuid;

use crate::app::{FunctionDecl, Handler, ParamKind};
use crate::error::{LoadError, LoadErrorKind};

/// Resolved type information for one parameter or the return value.
#[derive(Debug, Clone)]
pub struct ParamTypeInfo {
	/// Binding type tag used for decode/encode, after the generic downgrade
	/// for primitive annotations.
	pub binding_type: String,
	/// Declared annotation, if any.
	pub annotation: Option<Annotation>,
	/// True when the parameter resolves through the deferred path.
	pub deferred: bool,
}

/// Immutable descriptor for one indexed function.
///
/// Created once at indexing time and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
	/// Function name.
	pub name: String,
	/// Stable identifier derived from the name.
	pub function_id: FunctionId,
	/// Directory the function reports as its home.
	pub directory: String,
	/// The callable.
	pub handler: Handler,
	/// True when the handler is async.
	pub is_async: bool,
	/// True when the declaration asks for an invocation context.
	pub requires_context: bool,
	/// True when the function has an explicit or implicit return binding.
	pub has_return: bool,
	/// Name of the trigger parameter.
	pub trigger_param: String,
	/// Type info per input parameter.
	pub input_types: HashMap<String, ParamTypeInfo>,
	/// Type info per output parameter.
	pub output_types: HashMap<String, ParamTypeInfo>,
	/// Type info for the return value, when one is declared.
	pub return_type: Option<ParamTypeInfo>,
	/// Declared bindings, for metadata reporting.
	pub bindings: Vec<BindingSpec>,
}

/// Derives the stable identifier for a function name.
#[must_use]
pub fn derive_function_id(name: &str) -> FunctionId {
	FunctionId(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string())
}

/// The special `context` parameter name.
const CONTEXT_PARAM: &str = "context";

/// Validates a declaration and builds its descriptor.
///
/// # Errors
///
/// A [`LoadError`] naming the function and the specific mismatch. The
/// checks follow the platform contract: directions are `in`/`out` only,
/// exactly one trigger, parameters and bindings match as sets in both
/// directions, output roles agree on both sides, and annotations pass the
/// resolved binding's type checks.
pub fn index(decl: &FunctionDecl, bindings: &BindingSet, directory: &str) -> Result<FunctionInfo, LoadError> {
	let func = decl.name.as_str();
	let fail = |kind| Err(LoadError::new(func, kind));

	let mut bound: HashMap<&str, &BindingSpec> = HashMap::new();
	let mut has_explicit_return = false;
	let mut has_implicit_return = false;
	let mut return_binding: Option<&str> = None;

	for spec in &decl.bindings {
		if matches!(spec.direction, Direction::InOut) {
			return fail(LoadErrorKind::InoutBinding);
		}
		if spec.name == RETURN_BINDING {
			if !matches!(spec.direction, Direction::Out) {
				return fail(LoadErrorKind::ReturnNotOut);
			}
			has_explicit_return = true;
			return_binding = Some(&spec.binding_type);
			continue;
		}
		if bound.insert(spec.name.as_str(), spec).is_some() {
			return fail(LoadErrorKind::DuplicateBinding(spec.name.clone()));
		}
		if bindings.has_implicit_output(&spec.binding_type) {
			has_implicit_return = true;
			// An explicit $return takes priority over implicit candidates.
			if !has_explicit_return && return_binding.is_none() {
				return_binding = Some(&spec.binding_type);
			}
		}
	}

	let mut triggers: Vec<String> = bound
		.values()
		.filter(|spec| matches!(spec.direction, Direction::In) && bindings.is_trigger(&spec.binding_type))
		.map(|spec| spec.name.clone())
		.collect();
	triggers.sort();
	let trigger_param = match triggers.len() {
		0 => return fail(LoadErrorKind::MissingTrigger),
		1 => triggers.remove(0),
		_ => return fail(LoadErrorKind::MultipleTriggers(triggers)),
	};

	// The `context` parameter is positional, not bound.
	let mut params: Vec<_> = decl.params.iter().collect();
	let requires_context = if let Some(pos) = params
		.iter()
		.position(|p| p.name == CONTEXT_PARAM && !bound.contains_key(p.name.as_str()))
	{
		params.remove(pos);
		true
	} else {
		false
	};

	let mut unbound: Vec<String> = params
		.iter()
		.filter(|p| !bound.contains_key(p.name.as_str()))
		.map(|p| p.name.clone())
		.collect();
	if !unbound.is_empty() {
		unbound.sort();
		return fail(LoadErrorKind::UnboundParams(unbound));
	}
	let mut unused: Vec<String> = bound
		.keys()
		.filter(|name| !params.iter().any(|p| p.name == **name))
		.map(|name| (*name).to_string())
		.collect();
	if !unused.is_empty() {
		unused.sort();
		return fail(LoadErrorKind::UnusedBindings(unused));
	}

	let mut input_types = HashMap::new();
	let mut output_types = HashMap::new();

	for param in params {
		let spec = bound[param.name.as_str()];
		let is_param_out = matches!(param.kind, ParamKind::Output);
		let is_binding_out = matches!(spec.direction, Direction::Out);

		if is_binding_out && !is_param_out {
			return fail(LoadErrorKind::OutBindingInputParam { param: param.name.clone() });
		}
		if is_param_out && !is_binding_out {
			return fail(LoadErrorKind::OutParamInputBinding { param: param.name.clone() });
		}

		let (binding_type, deferred) = match &param.annotation {
			Some(Annotation::Deferred(declared_type)) => {
				let supported = bindings
					.extensions()
					.is_some_and(|ext| ext.supports(declared_type));
				if !supported {
					return fail(LoadErrorKind::AnnotationMismatch {
						param: param.name.clone(),
						annotation: declared_type.clone(),
						binding: spec.binding_type.clone(),
					});
				}
				(spec.binding_type.clone(), true)
			}
			Some(Annotation::Value(kind)) => {
				let binding_type = downgraded_type(bindings, &spec.binding_type, *kind);
				let binding = bindings.get(&binding_type);
				let accepted = if is_param_out {
					binding.check_output_type(*kind)
				} else {
					binding.check_input_type(*kind)
				};
				if !accepted {
					return fail(LoadErrorKind::AnnotationMismatch {
						param: param.name.clone(),
						annotation: kind.as_str().to_string(),
						binding: binding_type,
					});
				}
				(binding_type, false)
			}
			None => (spec.binding_type.clone(), false),
		};

		let info = ParamTypeInfo {
			binding_type,
			annotation: param.annotation.clone(),
			deferred,
		};
		if is_param_out {
			output_types.insert(param.name.clone(), info);
		} else {
			input_types.insert(param.name.clone(), info);
		}
	}

	let has_return = has_explicit_return || has_implicit_return;
	let return_type = if has_return {
		let mut binding_type = return_binding.unwrap_or("generic").to_string();
		if has_explicit_return && let Some(kind) = decl.return_annotation {
			binding_type = downgraded_type(bindings, &binding_type, kind);
			if !bindings.get(&binding_type).check_output_type(kind) {
				return fail(LoadErrorKind::ReturnAnnotationMismatch {
					annotation: kind.as_str().to_string(),
					binding: binding_type,
				});
			}
		}
		Some(ParamTypeInfo {
			binding_type,
			annotation: decl.return_annotation.map(Annotation::Value),
			deferred: false,
		})
	} else {
		None
	};

	Ok(FunctionInfo {
		name: decl.name.clone(),
		function_id: derive_function_id(&decl.name),
		directory: directory.to_string(),
		handler: decl.handler.clone(),
		is_async: decl.handler.is_async(),
		requires_context,
		has_return,
		trigger_param,
		input_types,
		output_types,
		return_type,
		bindings: decl.bindings.clone(),
	})
}

/// Primitive annotations on non-implicit-output bindings decode through the
/// generic binding.
fn downgraded_type(bindings: &BindingSet, binding_type: &str, kind: ValueKind) -> String {
	if matches!(kind, ValueKind::Str | ValueKind::Bytes) && !bindings.has_implicit_output(binding_type) {
		"generic".to_string()
	} else {
		binding_type.to_string()
	}
}

/// Process-wide descriptor store.
///
/// Populated at init/reload and read concurrently without locking; lookups
/// hold an atomically loaded snapshot. Reload clears and repopulates the
/// whole map without coordinating with in-flight invocations; the reload
/// protocol accepts this.
pub struct Registry {
	snapshot: ArcSwap<HashMap<FunctionId, Arc<FunctionInfo>>>,
}

impl std::fmt::Debug for Registry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Registry")
			.field("functions", &self.snapshot.load().len())
			.finish()
	}
}

impl Default for Registry {
	fn default() -> Self {
		Self::new()
	}
}

impl Registry {
	/// Creates an empty registry.
	#[must_use]
	pub fn new() -> Self {
		Self {
			snapshot: ArcSwap::from_pointee(HashMap::new()),
		}
	}

	/// Stores a descriptor under a specific identifier.
	pub fn register_as(&self, function_id: FunctionId, info: Arc<FunctionInfo>) {
		self.snapshot.rcu(|map| {
			let mut map = HashMap::clone(map);
			map.insert(function_id.clone(), info.clone());
			map
		});
	}

	/// Stores a descriptor under its derived identifier.
	pub fn register(&self, info: FunctionInfo) -> Arc<FunctionInfo> {
		let info = Arc::new(info);
		self.register_as(info.function_id.clone(), info.clone());
		info
	}

	/// Looks up a descriptor by identifier.
	#[must_use]
	pub fn lookup(&self, function_id: &FunctionId) -> Option<Arc<FunctionInfo>> {
		self.snapshot.load().get(function_id).cloned()
	}

	/// Finds a descriptor by function name.
	#[must_use]
	pub fn find_by_name(&self, name: &str) -> Option<Arc<FunctionInfo>> {
		self.snapshot.load().values().find(|info| info.name == name).cloned()
	}

	/// Removes every descriptor.
	pub fn clear(&self) {
		self.snapshot.store(Arc::new(HashMap::new()));
	}

	/// Returns the number of stored descriptors.
	#[must_use]
	pub fn len(&self) -> usize {
		self.snapshot.load().len()
	}

	/// Returns true when no descriptor is stored.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.snapshot.load().is_empty()
	}
}

#[cfg(test)]
mod tests;
