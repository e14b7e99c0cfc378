//! Function application declarations.
//!
//! An embedder hands the worker a [`FunctionApp`]: a plain list of
//! [`FunctionDecl`]s, each pairing a handler with its declared parameters
//! and bindings. Declarations are data; indexing (see [`crate::registry`])
//! validates them into servable descriptors.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tether_bindings::{Annotation, InvocationContext, OutSlot, Value, ValueKind};
use tether_proto::BindingSpec;

/// Error type user handlers may fail with.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of one handler call: an optional return value or a failure.
pub type HandlerResult = Result<Option<Value>, HandlerError>;

/// Boxed future returned by async handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Arguments materialized for one handler call.
///
/// Input parameters arrive as decoded [`Value`]s; output parameters arrive
/// as [`OutSlot`]s the handler writes into; the invocation context is
/// present when the declaration asks for it.
#[derive(Debug)]
pub struct CallArgs {
	values: HashMap<String, Value>,
	outs: HashMap<String, OutSlot>,
	context: Option<InvocationContext>,
}

impl CallArgs {
	pub(crate) fn new(
		values: HashMap<String, Value>,
		outs: HashMap<String, OutSlot>,
		context: Option<InvocationContext>,
	) -> Self {
		Self { values, outs, context }
	}

	/// Borrows a decoded input value.
	#[must_use]
	pub fn value(&self, name: &str) -> Option<&Value> {
		self.values.get(name)
	}

	/// Takes a decoded input value out of the argument set.
	#[must_use]
	pub fn take_value(&mut self, name: &str) -> Option<Value> {
		self.values.remove(name)
	}

	/// Borrows the slot for an output parameter.
	#[must_use]
	pub fn out(&self, name: &str) -> Option<&OutSlot> {
		self.outs.get(name)
	}

	/// Borrows the invocation context, when the function requires one.
	#[must_use]
	pub fn context(&self) -> Option<&InvocationContext> {
		self.context.as_ref()
	}
}

/// The callable behind a function declaration.
///
/// Sync handlers run on the worker's bounded thread pool; async handlers are
/// awaited on the event loop.
#[derive(Clone)]
pub enum Handler {
	/// A blocking handler.
	Sync(Arc<dyn Fn(CallArgs) -> HandlerResult + Send + Sync>),
	/// A non-blocking handler producing a future.
	Async(Arc<dyn Fn(CallArgs) -> HandlerFuture + Send + Sync>),
}

impl Handler {
	/// Wraps a blocking closure.
	pub fn sync(f: impl Fn(CallArgs) -> HandlerResult + Send + Sync + 'static) -> Self {
		Self::Sync(Arc::new(f))
	}

	/// Wraps a closure producing a future.
	pub fn async_fn<F, Fut>(f: F) -> Self
	where
		F: Fn(CallArgs) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = HandlerResult> + Send + 'static,
	{
		Self::Async(Arc::new(move |args| Box::pin(f(args))))
	}

	/// Returns true for async handlers.
	#[must_use]
	pub const fn is_async(&self) -> bool {
		matches!(self, Self::Async(_))
	}
}

impl std::fmt::Debug for Handler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			Self::Sync(_) => "Handler::Sync",
			Self::Async(_) => "Handler::Async",
		})
	}
}

/// Data-flow role of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
	/// The parameter receives a decoded input value.
	Input,
	/// The parameter receives an output slot.
	Output,
}

/// One declared handler parameter.
#[derive(Debug, Clone)]
pub struct ParamDecl {
	/// Parameter name; must match a binding of the same name, except for
	/// the special `context` parameter.
	pub name: String,
	/// Input or output role.
	pub kind: ParamKind,
	/// Optional type annotation checked against the binding at load time.
	pub annotation: Option<Annotation>,
}

impl ParamDecl {
	/// Declares an input parameter.
	#[must_use]
	pub fn input(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			kind: ParamKind::Input,
			annotation: None,
		}
	}

	/// Declares an output parameter.
	#[must_use]
	pub fn output(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			kind: ParamKind::Output,
			annotation: None,
		}
	}

	/// Attaches a plain value-kind annotation.
	#[must_use]
	pub fn annotated(mut self, kind: ValueKind) -> Self {
		self.annotation = Some(Annotation::Value(kind));
		self
	}

	/// Attaches a deferred extension-type annotation.
	#[must_use]
	pub fn deferred(mut self, declared_type: impl Into<String>) -> Self {
		self.annotation = Some(Annotation::Deferred(declared_type.into()));
		self
	}
}

/// One declared function: a handler plus its parameters and bindings.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
	/// Function name, unique within the app.
	pub name: String,
	/// The callable.
	pub handler: Handler,
	/// Declared handler parameters.
	pub params: Vec<ParamDecl>,
	/// Declared bindings, including the `$return` binding if any.
	pub bindings: Vec<BindingSpec>,
	/// Optional annotation on the return value.
	pub return_annotation: Option<ValueKind>,
}

/// The set of functions a worker serves.
#[derive(Debug, Clone, Default)]
pub struct FunctionApp {
	/// Declared functions, indexed at init and reload.
	pub functions: Vec<FunctionDecl>,
}

impl FunctionApp {
	/// Creates an app from its declarations.
	#[must_use]
	pub fn new(functions: Vec<FunctionDecl>) -> Self {
		Self { functions }
	}
}
