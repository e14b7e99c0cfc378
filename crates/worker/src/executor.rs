//! Invocation execution pipeline.
//!
//! One call moves through decode-args, execute and encode-outputs, and
//! always produces exactly one response. Failures anywhere in the pipeline
//! are caught here and serialized into a failure result; nothing escapes to
//! the dispatch loop.

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tether_bindings::{
	BindingSet, InvocationContext, OutSlot, from_incoming, to_outgoing_datum, to_outgoing_param,
};
use tether_proto::{Datum, InvocationRequest, InvocationResponse, ParameterBinding, StatusResult};
use tracing::{debug, error};

use crate::app::{CallArgs, Handler};
use crate::error::{InvocationError, serialize_exception};
use crate::invocation;
use crate::registry::FunctionInfo;
use crate::sync_pool::SyncPool;

/// Executes one invocation and builds its response.
pub(crate) async fn invoke(
	info: Arc<FunctionInfo>,
	bindings: Arc<BindingSet>,
	pool: Arc<SyncPool>,
	request: InvocationRequest,
) -> InvocationResponse {
	let invocation_id = request.invocation_id.clone();
	match run(&info, &bindings, &pool, request).await {
		Ok((return_value, output_data)) => InvocationResponse {
			invocation_id,
			return_value,
			output_data,
			result: StatusResult::success(),
		},
		Err(err) => {
			error!(invocation_id = %invocation_id, function = %info.name, error = %err, "invocation failed");
			InvocationResponse {
				invocation_id,
				return_value: None,
				output_data: Vec::new(),
				result: StatusResult::failure(serialize_exception("invocation", &err)),
			}
		}
	}
}

async fn run(
	info: &FunctionInfo,
	bindings: &Arc<BindingSet>,
	pool: &SyncPool,
	mut request: InvocationRequest,
) -> Result<(Option<Datum>, Vec<ParameterBinding>), InvocationError> {
	let invocation_id = request.invocation_id.clone();
	let empty_metadata = BTreeMap::new();

	let input_data = std::mem::take(&mut request.input_data);
	let mut values = HashMap::new();
	for pb in input_data {
		let Some(type_info) = info.input_types.get(&pb.name) else {
			return Err(InvocationError::UnknownParameter(pb.name));
		};
		let metadata = if pb.name == info.trigger_param {
			&request.trigger_metadata
		} else {
			&empty_metadata
		};
		let value = from_incoming(
			bindings,
			&type_info.binding_type,
			&pb.name,
			pb.data,
			metadata,
			type_info.annotation.as_ref(),
			&info.name,
		)?;
		values.insert(pb.name, value);
	}
	for name in info.input_types.keys() {
		if !values.contains_key(name) {
			return Err(InvocationError::MissingParameter(name.clone()));
		}
	}
	debug!(invocation_id = %invocation_id, "arguments decoded");

	let outs: HashMap<String, OutSlot> = info
		.output_types
		.keys()
		.map(|name| (name.clone(), OutSlot::new()))
		.collect();
	let context = info
		.requires_context
		.then(|| InvocationContext::from_request(&request, &info.name, &info.directory));
	let args = CallArgs::new(values, outs.clone(), context);

	let call_result = match &info.handler {
		Handler::Async(handler) => {
			let fut = invocation::scope(invocation_id.clone(), handler(args));
			match tokio::spawn(fut).await {
				Ok(result) => result.map_err(|err| InvocationError::Handler(err.to_string()))?,
				Err(join_err) if join_err.is_panic() => {
					return Err(InvocationError::Panic(panic_message(join_err.into_panic().as_ref())));
				}
				Err(_) => return Err(InvocationError::Panic("handler task was cancelled".into())),
			}
		}
		Handler::Sync(handler) => {
			let handler = handler.clone();
			let id = invocation_id.clone();
			let outcome = pool
				.run(move || {
					let _guard = invocation::ThreadIdGuard::enter(&id);
					std::panic::catch_unwind(AssertUnwindSafe(|| handler(args)))
				})
				.await?;
			match outcome {
				Ok(result) => result.map_err(|err| InvocationError::Handler(err.to_string()))?,
				Err(payload) => return Err(InvocationError::Panic(panic_message(payload.as_ref()))),
			}
		}
	};

	if call_result.is_some() && !info.has_return {
		return Err(InvocationError::UnexpectedReturn(info.name.clone()));
	}

	let mut output_data = Vec::new();
	let mut out_names: Vec<&String> = info.output_types.keys().collect();
	out_names.sort();
	for name in out_names {
		// A slot left unset (or explicitly null) is omitted from the
		// response rather than encoded as an explicit null.
		let Some(value) = outs[name].take() else { continue };
		let type_info = &info.output_types[name];
		output_data.push(to_outgoing_param(bindings, &type_info.binding_type, name, value)?);
	}

	let return_value = match (&info.return_type, call_result) {
		(Some(type_info), Some(value)) => {
			Some(to_outgoing_datum(bindings, &type_info.binding_type, value)?)
		}
		_ => None,
	};
	debug!(invocation_id = %invocation_id, outputs = output_data.len(), "outputs encoded");

	Ok((return_value, output_data))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
	if let Some(text) = payload.downcast_ref::<&str>() {
		(*text).to_string()
	} else if let Some(text) = payload.downcast_ref::<String>() {
		text.clone()
	} else {
		"opaque panic payload".to_string()
	}
}
