//! Wire types for the tether worker channel.
//!
//! This module defines the frames crossing the host/worker boundary and the
//! payloads they carry: request envelopes for the six request kinds, their
//! responses, the typed datum union, binding descriptions, and log records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unique identifier correlating a request with its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

/// Stable identifier for a registered function.
///
/// Hosts may assign any opaque value; worker-side indexing derives a
/// deterministic identifier from the function name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(pub String);

impl std::fmt::Display for FunctionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

/// A value crossing the RPC boundary, tagged with its wire representation.
///
/// JSON payloads travel as their raw text; parsing happens on the binding
/// side of the boundary, not in the codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
	/// No value.
	None,
	/// UTF-8 text.
	String(String),
	/// Raw bytes.
	Bytes(Vec<u8>),
	/// JSON document, unparsed.
	Json(String),
	/// Signed integer.
	Int(i64),
	/// Double-precision float.
	Double(f64),
	/// Boolean.
	Bool(bool),
}

impl Datum {
	/// Returns the wire tag of this datum, for diagnostics.
	#[must_use]
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::None => "none",
			Self::String(_) => "string",
			Self::Bytes(_) => "bytes",
			Self::Json(_) => "json",
			Self::Int(_) => "int",
			Self::Double(_) => "double",
			Self::Bool(_) => "bool",
		}
	}
}

/// Direction of a binding.
///
/// `InOut` exists on the wire so that a declaration using it can be rejected
/// during indexing; it is never accepted into a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
	/// Data flows from the host into the function.
	In,
	/// Data flows from the function back to the host.
	Out,
	/// Bidirectional; unsupported and refused at load time.
	InOut,
}

/// Declared shape hint for a binding's data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
	/// No hint given.
	#[default]
	Undefined,
	/// Text payloads.
	String,
	/// Binary payloads.
	Binary,
	/// Streamed payloads.
	Stream,
}

/// One declared parameter or return binding: (name, direction, type tag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingSpec {
	/// Parameter name, or `$return` for the return binding.
	pub name: String,
	/// Data flow direction.
	pub direction: Direction,
	/// Binding type tag, resolved against the binding set.
	pub binding_type: String,
	/// Declared shape hint.
	#[serde(default)]
	pub data_type: DataType,
}

/// Name of the synthetic return binding.
pub const RETURN_BINDING: &str = "$return";

/// A named input or output value attached to an invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBinding {
	/// Parameter name the value binds to.
	pub name: String,
	/// The value itself.
	pub data: Datum,
}

/// Serialized failure detail carried inside a [`StatusResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcException {
	/// Component that produced the failure.
	pub source: String,
	/// Formatted error chain or backtrace.
	pub stack_trace: String,
	/// Human-readable message.
	pub message: String,
}

/// Outcome discriminant for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
	/// The operation succeeded.
	Success,
	/// The operation failed; see the attached exception.
	Failure,
}

/// Outcome of an operation, with failure detail when applicable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResult {
	/// Outcome discriminant.
	pub status: Status,
	/// Failure detail, present on failure.
	pub exception: Option<RpcException>,
}

impl StatusResult {
	/// A successful outcome.
	#[must_use]
	pub const fn success() -> Self {
		Self { status: Status::Success, exception: None }
	}

	/// A failed outcome carrying the given exception.
	#[must_use]
	pub const fn failure(exception: RpcException) -> Self {
		Self {
			status: Status::Failure,
			exception: Some(exception),
		}
	}

	/// Returns true for a successful outcome.
	#[must_use]
	pub const fn is_success(&self) -> bool {
		matches!(self.status, Status::Success)
	}
}

/// W3C-style trace propagation data for an invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
	/// `traceparent` header value.
	pub trace_parent: String,
	/// `tracestate` header value.
	pub trace_state: String,
	/// Additional propagated attributes.
	#[serde(default)]
	pub attributes: BTreeMap<String, String>,
}

/// Host-side retry bookkeeping for an invocation.
///
/// Carried as metadata only; the worker never retries on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryContext {
	/// Current retry attempt, starting at 0.
	pub retry_count: u32,
	/// Maximum attempts the host will make.
	pub max_retry_count: u32,
	/// Failure that triggered the retry, if any.
	pub exception: Option<RpcException>,
}

/// Severity of a forwarded log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
	/// Finest-grained diagnostics.
	Trace,
	/// Debug diagnostics.
	Debug,
	/// Informational messages.
	Information,
	/// Warnings.
	Warning,
	/// Errors.
	Error,
	/// Unrecoverable failures.
	Critical,
}

/// Whether a log record came from the runtime or from user code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogCategory {
	/// Emitted by the worker runtime itself.
	System,
	/// Emitted by user function code.
	User,
}

/// A log record forwarded to the host over the shared outbound queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
	/// Severity.
	pub level: LogLevel,
	/// Formatted message.
	pub message: String,
	/// Originating module or logger name.
	pub category: String,
	/// Runtime vs user classification.
	pub log_category: LogCategory,
	/// Invocation the record belongs to, when attributable.
	pub invocation_id: Option<String>,
}

/// Identity of the worker runtime, reported at init and reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerMetadata {
	/// Runtime name.
	pub runtime_name: String,
	/// Runtime version.
	pub runtime_version: String,
	/// Worker package version.
	pub worker_version: String,
}

/// Descriptor metadata for one indexed function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMetadata {
	/// Stable function identifier.
	pub function_id: FunctionId,
	/// Function name.
	pub name: String,
	/// Directory the function reports as its home.
	pub directory: String,
	/// Declared bindings.
	pub bindings: Vec<BindingSpec>,
	/// Per-function indexing outcome.
	pub status: StatusResult,
}

/// Well-known capability keys exchanged at init and reload.
pub mod capabilities {
	/// Worker accepts and produces typed datum collections.
	pub const TYPED_DATA_COLLECTION: &str = "TypedDataCollection";
	/// Worker answers status requests.
	pub const WORKER_STATUS: &str = "WorkerStatus";
	/// Worker forwards structured log records over the channel.
	pub const RPC_LOG: &str = "RpcLog";
	/// Capability value meaning "enabled".
	pub const TRUE: &str = "true";
}

/// Host request to initialize the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitRequest {
	/// Directory of the function application.
	pub app_dir: String,
	/// Capabilities the host advertises.
	#[serde(default)]
	pub capabilities: BTreeMap<String, String>,
}

/// Host acknowledgement that a function should be served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionLoadRequest {
	/// Identifier the host will use for invocations.
	pub function_id: FunctionId,
	/// Function name, for diagnostics.
	pub name: String,
}

/// Host request to invoke a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
	/// Unique invocation identifier.
	pub invocation_id: String,
	/// Function to invoke.
	pub function_id: FunctionId,
	/// Input values, one per declared input binding.
	pub input_data: Vec<ParameterBinding>,
	/// Metadata accompanying the trigger payload.
	#[serde(default)]
	pub trigger_metadata: BTreeMap<String, Datum>,
	/// Trace propagation data.
	#[serde(default)]
	pub trace_context: TraceContext,
	/// Retry bookkeeping.
	#[serde(default)]
	pub retry_context: RetryContext,
}

/// Host request to reload the worker environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvReloadRequest {
	/// Directory of the function application.
	pub app_dir: String,
	/// Capabilities the host advertises.
	#[serde(default)]
	pub capabilities: BTreeMap<String, String>,
}

/// Payload of a host request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestPayload {
	/// Initialize the worker.
	Init(InitRequest),
	/// Return metadata for all indexed functions.
	FunctionsMetadata,
	/// Acknowledge-load one function.
	FunctionLoad(FunctionLoadRequest),
	/// Invoke a function.
	Invocation(InvocationRequest),
	/// Reload the environment and re-index.
	EnvReload(EnvReloadRequest),
	/// Liveness probe used for scale decisions.
	Status,
}

impl RequestPayload {
	/// Returns the request kind name, for diagnostics.
	#[must_use]
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Init(_) => "Init",
			Self::FunctionsMetadata => "FunctionsMetadata",
			Self::FunctionLoad(_) => "FunctionLoad",
			Self::Invocation(_) => "Invocation",
			Self::EnvReload(_) => "EnvReload",
			Self::Status => "Status",
		}
	}
}

/// A request envelope from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	/// Correlation identifier, echoed on the response.
	pub id: RequestId,
	/// The request payload.
	pub payload: RequestPayload,
}

/// Response to [`RequestPayload::Init`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitResponse {
	/// Capabilities the worker advertises.
	pub capabilities: BTreeMap<String, String>,
	/// Worker identity.
	pub worker_metadata: WorkerMetadata,
	/// Init outcome.
	pub result: StatusResult,
}

/// Response to [`RequestPayload::FunctionsMetadata`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionsMetadataResponse {
	/// One entry per indexed function.
	pub function_metadata: Vec<FunctionMetadata>,
	/// Overall indexing outcome.
	pub result: StatusResult,
}

/// Response to [`RequestPayload::FunctionLoad`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionLoadResponse {
	/// Function the load referred to.
	pub function_id: FunctionId,
	/// Load outcome.
	pub result: StatusResult,
}

/// Response to [`RequestPayload::Invocation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResponse {
	/// Invocation the response belongs to.
	pub invocation_id: String,
	/// Encoded return value, when the function declares one.
	pub return_value: Option<Datum>,
	/// Encoded output-binding values; null slots are omitted.
	pub output_data: Vec<ParameterBinding>,
	/// Invocation outcome.
	pub result: StatusResult,
}

/// Response to [`RequestPayload::EnvReload`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvReloadResponse {
	/// Capabilities the worker advertises after reload.
	pub capabilities: BTreeMap<String, String>,
	/// Worker identity.
	pub worker_metadata: WorkerMetadata,
	/// Reload outcome.
	pub result: StatusResult,
}

/// Payload of a worker response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponsePayload {
	/// Init outcome.
	Init(InitResponse),
	/// Indexed function metadata.
	FunctionsMetadata(FunctionsMetadataResponse),
	/// Load acknowledgement.
	FunctionLoad(FunctionLoadResponse),
	/// Invocation outcome.
	Invocation(InvocationResponse),
	/// Reload outcome.
	EnvReload(EnvReloadResponse),
	/// Liveness answer; intentionally empty.
	Status,
	/// Generic failure for a request that never reached its handler.
	Failed(StatusResult),
}

/// A response envelope from the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	/// Correlation identifier of the request being answered.
	pub request_id: RequestId,
	/// The response payload.
	pub payload: ResponsePayload,
}

/// Classification of frames crossing the worker channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
	/// Worker announcement, emitted once at stream start.
	Handshake {
		/// Identifier assigned to this worker.
		worker_id: String,
	},
	/// A request from the host.
	Request(Request),
	/// A response from the worker.
	Response(Response),
	/// An uncorrelated log record from the worker.
	Log(LogRecord),
	/// Decode fallback for an intact frame whose body was not understood.
	///
	/// Never emitted deliberately; the receiving side logs and drops it.
	Unknown,
}
