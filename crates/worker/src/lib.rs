//! The tether function worker runtime.
//!
//! A worker bridges a host orchestrator to user-defined functions: it
//! connects to the host over a local stream socket, announces itself, and
//! serves tagged requests (init, metadata, load, invoke, reload, status)
//! against a [`FunctionApp`] of declared functions.
//!
//! The crate is organized leaves-first:
//! * [`app`]: function declarations and handlers
//! * [`registry`]: indexing, validation and the descriptor store
//! * [`sync_pool`] + [`invocation`]: execution substrate for sync handlers
//! * [`service`]: request dispatch
//! * [`serve`]: channel setup and the connect loop
//! * [`logbridge`]: log forwarding onto the channel

#![warn(missing_docs)]

pub mod app;
pub mod error;
mod executor;
pub mod invocation;
pub mod logbridge;
pub mod registry;
pub mod serve;
pub mod service;
pub mod settings;
pub mod sync_pool;

pub use app::{
	CallArgs, FunctionApp, FunctionDecl, Handler, HandlerError, HandlerFuture, HandlerResult,
	ParamDecl, ParamKind,
};
pub use error::{InitError, InvocationError, LoadError, LoadErrorKind};
pub use logbridge::SocketLogLayer;
pub use registry::{FunctionInfo, ParamTypeInfo, Registry, derive_function_id, index};
pub use serve::{Worker, connect, serve_io, serve_stream};
pub use service::{WorkerService, WorkerState};
pub use settings::Settings;
pub use sync_pool::SyncPool;
