//! Per-invocation context handed to user functions.

use tether_proto::{InvocationRequest, RetryContext, TraceContext};

/// Invocation-scoped record passed to functions that request it.
///
/// Created per call and discarded afterwards; never shared across
/// invocations.
#[derive(Debug, Clone)]
pub struct InvocationContext {
	/// Unique invocation identifier.
	pub invocation_id: String,
	/// Name of the function being invoked.
	pub function_name: String,
	/// Directory the function reports as its home.
	pub function_directory: String,
	/// Trace propagation data from the host.
	pub trace_context: TraceContext,
	/// Retry bookkeeping from the host; metadata only.
	pub retry_context: RetryContext,
}

impl InvocationContext {
	/// Builds the context for one invocation request.
	#[must_use]
	pub fn from_request(request: &InvocationRequest, function_name: &str, function_directory: &str) -> Self {
		Self {
			invocation_id: request.invocation_id.clone(),
			function_name: function_name.to_string(),
			function_directory: function_directory.to_string(),
			trace_context: request.trace_context.clone(),
			retry_context: request.retry_context.clone(),
		}
	}
}
