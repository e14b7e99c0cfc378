//! Error types for loading, invoking and serving functions.

use tether_bindings::BindingError;
use tether_proto::{FunctionId, RpcException};
use thiserror::Error;

/// A function declaration that cannot be indexed.
///
/// Load errors are reported in load and metadata responses; the offending
/// function stays unregistered and the worker keeps serving.
#[derive(Debug, Error)]
#[error("cannot load the {function} function: {kind}")]
pub struct LoadError {
	/// Name of the offending function.
	pub function: String,
	/// The specific mismatch.
	pub kind: LoadErrorKind,
}

impl LoadError {
	pub(crate) fn new(function: &str, kind: LoadErrorKind) -> Self {
		Self { function: function.to_string(), kind }
	}
}

/// The specific declaration mismatch behind a [`LoadError`].
#[derive(Debug, Error)]
pub enum LoadErrorKind {
	/// A binding declares the unsupported `inout` direction.
	#[error("\"inout\" bindings are not supported")]
	InoutBinding,

	/// The `$return` binding declares a direction other than `out`.
	#[error("\"$return\" binding must have direction set to \"out\"")]
	ReturnNotOut,

	/// Two bindings share a name.
	#[error("binding {0:?} is declared more than once")]
	DuplicateBinding(String),

	/// No binding resolves to a trigger.
	#[error("exactly one trigger binding is required, found none")]
	MissingTrigger,

	/// More than one binding resolves to a trigger.
	#[error("exactly one trigger binding is required, found multiple: {0:?}")]
	MultipleTriggers(Vec<String>),

	/// Handler parameters with no binding of the same name.
	#[error("the following parameters are declared by the handler but not bound: {0:?}")]
	UnboundParams(Vec<String>),

	/// Bindings with no handler parameter of the same name.
	#[error("the following bindings have no matching handler parameter: {0:?}")]
	UnusedBindings(Vec<String>),

	/// An `out` binding whose parameter is not declared as an output.
	#[error(
		"binding {param:?} is declared to have the \"out\" direction, \
		 but its parameter is not an output parameter"
	)]
	OutBindingInputParam {
		/// The mismatched parameter.
		param: String,
	},

	/// An output parameter whose binding is declared `in`.
	#[error(
		"parameter {param:?} is declared as an output parameter, \
		 but its binding has the \"in\" direction"
	)]
	OutParamInputBinding {
		/// The mismatched parameter.
		param: String,
	},

	/// A parameter annotation the binding does not accept.
	#[error("annotation \"{annotation}\" of parameter {param:?} does not match binding type \"{binding}\"")]
	AnnotationMismatch {
		/// The annotated parameter.
		param: String,
		/// The annotation's kind or type name.
		annotation: String,
		/// The binding type that refused it.
		binding: String,
	},

	/// A return annotation the return binding does not accept.
	#[error("return annotation \"{annotation}\" does not match binding type \"{binding}\"")]
	ReturnAnnotationMismatch {
		/// The annotation's kind name.
		annotation: String,
		/// The binding type that refused it.
		binding: String,
	},
}

/// A single invocation that cannot produce a successful result.
#[derive(Debug, Error)]
pub enum InvocationError {
	/// The invocation names a function the registry does not know.
	#[error("unknown function id {0}")]
	UnknownFunction(FunctionId),

	/// The host supplied a value for an undeclared parameter.
	#[error("no input binding is declared for parameter {0:?}")]
	UnknownParameter(String),

	/// A declared input parameter received no value.
	#[error("no value was provided for parameter {0:?}")]
	MissingParameter(String),

	/// Decoding or encoding failed.
	#[error(transparent)]
	Binding(#[from] BindingError),

	/// The function returned a value but declares no return binding.
	#[error("function {0:?} without a \"$return\" binding returned a non-unit value")]
	UnexpectedReturn(String),

	/// The handler returned an error.
	#[error("{0}")]
	Handler(String),

	/// The handler panicked.
	#[error("handler panicked: {0}")]
	Panic(String),

	/// The sync pool is gone; the worker is shutting down.
	#[error("worker thread pool is stopped")]
	PoolStopped,
}

/// Fatal conditions raised while initializing the worker.
#[derive(Debug, Error)]
pub enum InitError {
	/// No bindings are registered; nothing could ever be decoded.
	#[error("binding set is empty; the worker cannot serve invocations")]
	EmptyBindingSet,
}

/// Serializes an error chain into the wire exception shape.
pub(crate) fn serialize_exception(source: &str, err: &(dyn std::error::Error + 'static)) -> RpcException {
	let message = err.to_string();
	let mut stack_trace = message.clone();
	let mut cause = err.source();
	while let Some(inner) = cause {
		stack_trace.push_str("\ncaused by: ");
		stack_trace.push_str(&inner.to_string());
		cause = inner.source();
	}
	RpcException {
		source: source.to_string(),
		stack_trace,
		message,
	}
}
