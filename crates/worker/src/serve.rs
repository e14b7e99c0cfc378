//! Channel setup: build the service, announce the worker, drive the stream.

use std::path::Path;
use std::sync::Arc;

use tether_bindings::BindingSet;
use tether_proto::{Frame, ProtoError, WorkerProtocol};
use tether_rpc::{CounterIdGen, MainLoop, PeerSocket};
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::FunctionApp;
use crate::service::{WorkerService, WorkerState};
use crate::settings::Settings;

/// A configured worker, ready to serve a channel.
#[derive(Debug)]
pub struct Worker {
	app: FunctionApp,
	bindings: BindingSet,
	settings: Settings,
	worker_id: String,
}

impl Worker {
	/// Creates a worker with settings resolved from the environment.
	#[must_use]
	pub fn new(app: FunctionApp, bindings: BindingSet, worker_id: impl Into<String>) -> Self {
		Self {
			app,
			bindings,
			settings: Settings::from_env(),
			worker_id: worker_id.into(),
		}
	}

	/// Replaces the environment-resolved settings.
	#[must_use]
	pub fn with_settings(mut self, settings: Settings) -> Self {
		self.settings = settings;
		self
	}

	/// Returns the resolved settings.
	#[must_use]
	pub const fn settings(&self) -> &Settings {
		&self.settings
	}

	/// Builds the main loop and its socket.
	///
	/// The handshake announcing the worker is queued ahead of everything
	/// else on the outbound path; it is emitted as soon as the loop runs.
	/// The socket is the hook for log forwarding (see
	/// [`crate::SocketLogLayer`]) and outlives neither the loop nor its
	/// stream.
	#[must_use]
	pub fn into_service(self) -> (MainLoop<WorkerProtocol, WorkerService>, PeerSocket<WorkerProtocol>) {
		let worker_id = self.worker_id.clone();
		let state = Arc::new(WorkerState::new(
			self.app,
			self.bindings,
			&self.settings,
			self.worker_id,
		));
		let (main_loop, socket) = MainLoop::new(
			move |_socket| WorkerService::new(state),
			WorkerProtocol::new(),
			CounterIdGen::new(),
		);
		let _ = socket.send_message(Frame::Handshake { worker_id });
		(main_loop, socket)
	}
}

/// Serves a worker over an arbitrary stream pair.
///
/// # Errors
///
/// Propagates [`ProtoError`] for transport and codec failures; a clean peer
/// disconnect ends the loop with `Ok(())`.
pub async fn serve_io(
	worker: Worker,
	input: impl AsyncBufRead + Unpin + Send,
	output: impl AsyncWrite + Unpin + Send,
) -> Result<(), ProtoError> {
	let (main_loop, _socket) = worker.into_service();
	main_loop.run(input, output).await
}

/// Serves a worker over a connected Unix stream.
///
/// # Errors
///
/// Same as [`serve_io`].
pub async fn serve_stream(worker: Worker, stream: UnixStream) -> Result<(), ProtoError> {
	let (read, write) = stream.into_split();
	serve_io(worker, BufReader::new(read), write).await
}

/// Connects to the host socket and serves until disconnect or shutdown.
///
/// # Errors
///
/// Connection failures surface as [`ProtoError::Io`]; the rest behaves like
/// [`serve_io`]. A fired shutdown token ends the worker with `Ok(())`.
pub async fn connect(
	worker: Worker,
	path: impl AsRef<Path>,
	shutdown: CancellationToken,
) -> Result<(), ProtoError> {
	let path = path.as_ref();
	let stream = UnixStream::connect(path).await?;
	info!(path = %path.display(), "connected to host");
	tokio::select! {
		res = serve_stream(worker, stream) => res,
		() = shutdown.cancelled() => {
			info!("worker shutdown requested");
			Ok(())
		}
	}
}
