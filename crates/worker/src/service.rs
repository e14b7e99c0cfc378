//! Worker-side request dispatch.
//!
//! Each request kind maps to a handler on the shared [`WorkerState`]; the
//! main loop fans requests out into concurrent tasks, so responses may be
//! emitted out of request order and carry the request's correlation id.

use std::collections::BTreeMap;
use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tether_bindings::BindingSet;
use tether_proto::{
	EnvReloadRequest, EnvReloadResponse, Frame, FunctionLoadRequest, FunctionLoadResponse,
	FunctionMetadata, FunctionsMetadataResponse, InitRequest, InitResponse, InvocationRequest,
	InvocationResponse, ProtoError, Request, RequestPayload, ResponsePayload, RpcException,
	StatusResult, WorkerMetadata, WorkerProtocol, capabilities,
};
use tether_rpc::AnyEvent;
use tower_service::Service;
use tracing::{error, info, warn};

use crate::app::FunctionApp;
use crate::error::{InitError, InvocationError, serialize_exception};
use crate::executor;
use crate::registry::{Registry, index};
use crate::settings::Settings;
use crate::sync_pool::SyncPool;

#[derive(Debug, Default)]
struct MetadataState {
	result: Option<Vec<FunctionMetadata>>,
	error: Option<RpcException>,
}

/// Shared worker state: registries, settings and the sync pool.
///
/// The binding set and function registry are populated at init, read
/// concurrently by invocations without locking, and repopulated wholesale on
/// reload.
pub struct WorkerState {
	app: FunctionApp,
	template: BindingSet,
	bindings: ArcSwap<BindingSet>,
	registry: Registry,
	metadata: Mutex<MetadataState>,
	host_capabilities: Mutex<BTreeMap<String, String>>,
	pool: Arc<SyncPool>,
	worker_id: String,
}

impl std::fmt::Debug for WorkerState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WorkerState")
			.field("worker_id", &self.worker_id)
			.field("registry", &self.registry)
			.field("pool", &self.pool)
			.finish()
	}
}

fn worker_metadata() -> WorkerMetadata {
	WorkerMetadata {
		runtime_name: "tether".to_string(),
		runtime_version: env!("CARGO_PKG_RUST_VERSION").to_string(),
		worker_version: env!("CARGO_PKG_VERSION").to_string(),
	}
}

fn worker_capabilities() -> BTreeMap<String, String> {
	[
		capabilities::TYPED_DATA_COLLECTION,
		capabilities::WORKER_STATUS,
		capabilities::RPC_LOG,
	]
	.into_iter()
	.map(|key| (key.to_string(), capabilities::TRUE.to_string()))
	.collect()
}

impl WorkerState {
	pub(crate) fn new(
		app: FunctionApp,
		bindings: BindingSet,
		settings: &Settings,
		worker_id: String,
	) -> Self {
		Self {
			app,
			template: bindings,
			bindings: ArcSwap::from_pointee(BindingSet::empty()),
			registry: Registry::new(),
			metadata: Mutex::new(MetadataState::default()),
			host_capabilities: Mutex::new(BTreeMap::new()),
			pool: Arc::new(SyncPool::new(settings.sync_threads)),
			worker_id,
		}
	}

	/// Returns a capability the host advertised at init or reload.
	#[must_use]
	pub fn host_capability(&self, key: &str) -> Option<String> {
		self.host_capabilities.lock().get(key).cloned()
	}

	/// Populates the binding set and indexes the app's declarations.
	///
	/// Indexing stops at the first load error; functions indexed before it
	/// stay registered, and the error is recorded for the next metadata
	/// request instead of failing the caller.
	fn load_function_metadata(&self, app_dir: &str) {
		let set = self.bindings.load_full();
		self.registry.clear();
		let mut metadata = self.metadata.lock();
		metadata.result = None;
		metadata.error = None;

		let mut entries = Vec::new();
		for decl in &self.app.functions {
			match index(decl, &set, app_dir) {
				Ok(info) => {
					let info = self.registry.register(info);
					entries.push(FunctionMetadata {
						function_id: info.function_id.clone(),
						name: info.name.clone(),
						directory: info.directory.clone(),
						bindings: info.bindings.clone(),
						status: StatusResult::success(),
					});
				}
				Err(err) => {
					error!(function = %decl.name, error = %err, "failed to index function");
					metadata.error = Some(serialize_exception("indexing", &err));
					return;
				}
			}
		}
		info!(functions = entries.len(), "indexed function app");
		metadata.result = Some(entries);
	}

	fn handle_init(&self, request: InitRequest) -> InitResponse {
		info!(
			worker_id = %self.worker_id,
			app_dir = %request.app_dir,
			"received Init request"
		);
		*self.host_capabilities.lock() = request.capabilities;

		if self.template.is_empty() {
			let err = InitError::EmptyBindingSet;
			error!(error = %err, "init failed");
			return InitResponse {
				capabilities: BTreeMap::new(),
				worker_metadata: worker_metadata(),
				result: StatusResult::failure(serialize_exception("init", &err)),
			};
		}

		self.bindings.store(Arc::new(self.template.clone()));
		self.load_function_metadata(&request.app_dir);

		InitResponse {
			capabilities: worker_capabilities(),
			worker_metadata: worker_metadata(),
			result: StatusResult::success(),
		}
	}

	fn handle_metadata(&self) -> FunctionsMetadataResponse {
		let metadata = self.metadata.lock();
		if let Some(exception) = &metadata.error {
			error!(error = %exception.message, "metadata request failed");
			return FunctionsMetadataResponse {
				function_metadata: Vec::new(),
				result: StatusResult::failure(exception.clone()),
			};
		}
		FunctionsMetadataResponse {
			function_metadata: metadata.result.clone().unwrap_or_default(),
			result: StatusResult::success(),
		}
	}

	fn handle_load(&self, request: FunctionLoadRequest) -> FunctionLoadResponse {
		info!(
			function_id = %request.function_id,
			function = %request.name,
			"received FunctionLoad request"
		);
		if self.registry.lookup(&request.function_id).is_some() {
			return FunctionLoadResponse {
				function_id: request.function_id,
				result: StatusResult::success(),
			};
		}
		// The host may key the function with its own identifier; alias it
		// to the indexed descriptor of the same name.
		if let Some(info) = self.registry.find_by_name(&request.name) {
			self.registry.register_as(request.function_id.clone(), info);
			return FunctionLoadResponse {
				function_id: request.function_id,
				result: StatusResult::success(),
			};
		}
		let message = format!(
			"function {:?} with id {} is not indexed",
			request.name, request.function_id
		);
		error!("{message}");
		FunctionLoadResponse {
			function_id: request.function_id,
			result: StatusResult::failure(RpcException {
				source: "load".to_string(),
				stack_trace: message.clone(),
				message,
			}),
		}
	}

	async fn handle_invocation(&self, request: InvocationRequest) -> InvocationResponse {
		info!(
			invocation_id = %request.invocation_id,
			function_id = %request.function_id,
			"received Invocation request"
		);
		let Some(info) = self.registry.lookup(&request.function_id) else {
			let err = InvocationError::UnknownFunction(request.function_id.clone());
			error!(invocation_id = %request.invocation_id, error = %err, "invocation refused");
			return InvocationResponse {
				invocation_id: request.invocation_id,
				return_value: None,
				output_data: Vec::new(),
				result: StatusResult::failure(serialize_exception("invocation", &err)),
			};
		};
		executor::invoke(info, self.bindings.load_full(), self.pool.clone(), request).await
	}

	fn handle_env_reload(&self, request: EnvReloadRequest) -> EnvReloadResponse {
		info!(app_dir = %request.app_dir, "received EnvReload request");
		*self.host_capabilities.lock() = request.capabilities;

		if self.template.is_empty() {
			let err = InitError::EmptyBindingSet;
			error!(error = %err, "environment reload failed");
			return EnvReloadResponse {
				capabilities: BTreeMap::new(),
				worker_metadata: worker_metadata(),
				result: StatusResult::failure(serialize_exception("reload", &err)),
			};
		}

		// Clear and repopulate; not coordinated with in-flight invocations.
		self.bindings.store(Arc::new(self.template.clone()));
		self.load_function_metadata(&request.app_dir);

		EnvReloadResponse {
			capabilities: worker_capabilities(),
			worker_metadata: worker_metadata(),
			result: StatusResult::success(),
		}
	}
}

/// The worker's request dispatcher.
///
/// One instance serves one channel; all state lives in the shared
/// [`WorkerState`].
#[derive(Debug)]
pub struct WorkerService {
	state: Arc<WorkerState>,
}

impl WorkerService {
	pub(crate) fn new(state: Arc<WorkerState>) -> Self {
		Self { state }
	}
}

impl Service<Request> for WorkerService {
	type Response = ResponsePayload;
	type Error = RpcException;
	type Future =
		Pin<Box<dyn Future<Output = Result<ResponsePayload, RpcException>> + Send>>;

	fn poll_ready(
		&mut self,
		_cx: &mut std::task::Context<'_>,
	) -> std::task::Poll<Result<(), Self::Error>> {
		std::task::Poll::Ready(Ok(()))
	}

	fn call(&mut self, request: Request) -> Self::Future {
		let state = self.state.clone();
		Box::pin(async move {
			Ok(match request.payload {
				RequestPayload::Init(r) => ResponsePayload::Init(state.handle_init(r)),
				RequestPayload::FunctionsMetadata => {
					ResponsePayload::FunctionsMetadata(state.handle_metadata())
				}
				RequestPayload::FunctionLoad(r) => {
					ResponsePayload::FunctionLoad(state.handle_load(r))
				}
				RequestPayload::Invocation(r) => {
					ResponsePayload::Invocation(state.handle_invocation(r).await)
				}
				RequestPayload::EnvReload(r) => {
					ResponsePayload::EnvReload(state.handle_env_reload(r))
				}
				// Hosts probe status for scale decisions; answering must not
				// log on the hot path.
				RequestPayload::Status => ResponsePayload::Status,
			})
		})
	}
}

impl tether_rpc::RpcService<WorkerProtocol> for WorkerService {
	fn notify(&mut self, frame: Frame) -> ControlFlow<Result<(), ProtoError>> {
		match frame {
			// Forward-compatible kinds from newer hosts: log and drop, emit
			// nothing.
			Frame::Unknown => error!("unknown request kind on worker channel; dropping"),
			Frame::Handshake { worker_id } => {
				warn!(worker_id = %worker_id, "unexpected handshake from peer; dropping");
			}
			Frame::Log(record) => {
				warn!(category = %record.category, "unexpected log frame from peer; dropping");
			}
			Frame::Request(_) | Frame::Response(_) => {
				// Correlated frames are routed by the pump and never land here.
				warn!("correlated frame delivered as notification; dropping");
			}
		}
		ControlFlow::Continue(())
	}

	fn emit(&mut self, _event: AnyEvent) -> ControlFlow<Result<(), ProtoError>> {
		ControlFlow::Continue(())
	}
}
