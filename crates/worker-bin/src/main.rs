//! Reference tether worker binary.
//!
//! Connects to a host socket and serves a small built-in function app. Real
//! deployments embed `tether-worker` and declare their own functions; this
//! binary is the runnable reference for wiring, logging and smoke testing.

use std::path::PathBuf;

use clap::Parser;
use tether_bindings::{BindingSet, Value};
use tether_worker::{
	FunctionApp, FunctionDecl, Handler, ParamDecl, Settings, SocketLogLayer, Worker, settings,
};
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tracing::info;

/// Worker command line arguments.
#[derive(Parser, Debug)]
#[command(name = "tether-worker")]
#[command(about = "Tether function worker")]
struct Args {
	/// Host socket path
	#[arg(short, long, value_name = "PATH")]
	socket: Option<PathBuf>,

	/// Identifier assigned to this worker
	#[arg(long, value_name = "ID")]
	worker_id: Option<String>,

	/// Channel request identifier, echoed in logs
	#[arg(long, value_name = "ID")]
	request_id: Option<String>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

fn reference_app() -> FunctionApp {
	let spec = |name: &str, direction, binding_type: &str| tether_proto::BindingSpec {
		name: name.to_string(),
		direction,
		binding_type: binding_type.to_string(),
		data_type: tether_proto::DataType::Undefined,
	};

	let echo = FunctionDecl {
		name: "echo".into(),
		handler: Handler::sync(|mut args| Ok(args.take_value("payload"))),
		params: vec![ParamDecl::input("payload")],
		bindings: vec![
			spec("payload", tether_proto::Direction::In, "signal"),
			spec("$return", tether_proto::Direction::Out, "generic"),
		],
		return_annotation: None,
	};

	let tally = FunctionDecl {
		name: "tally".into(),
		handler: Handler::async_fn(|mut args| async move {
			let count = match args.take_value("payload") {
				Some(Value::Json(serde_json::Value::Array(items))) => items.len() as i64,
				Some(Value::Str(text)) => text.lines().count() as i64,
				Some(Value::Bytes(bytes)) => bytes.len() as i64,
				other => return Err(format!("cannot tally payload {other:?}").into()),
			};
			Ok(Some(Value::Int(count)))
		}),
		params: vec![ParamDecl::input("payload")],
		bindings: vec![
			spec("payload", tether_proto::Direction::In, "signal"),
			spec("$return", tether_proto::Direction::Out, "generic"),
		],
		return_annotation: None,
	};

	FunctionApp::new(vec![echo, tally])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	let settings = Settings::from_env();
	let worker_id = args
		.worker_id
		.unwrap_or_else(|| format!("tether-{}", std::process::id()));
	let socket_path = args
		.socket
		.or_else(|| std::env::var(settings::SOCKET).ok().map(PathBuf::from))
		.unwrap_or_else(tether_proto::paths::default_socket_path);

	let worker = Worker::new(reference_app(), BindingSet::builtin(), worker_id.clone())
		.with_settings(settings.clone());
	let (main_loop, socket) = worker.into_service();

	setup_tracing(args.verbose, settings.debug_logging, SocketLogLayer::new(socket));

	info!(
		worker_id = %worker_id,
		request_id = args.request_id.as_deref().unwrap_or("-"),
		socket = %socket_path.display(),
		sync_threads = settings.sync_threads,
		"starting tether worker"
	);

	let stream = UnixStream::connect(&socket_path).await?;
	info!("connected to host");

	let (read, write) = stream.into_split();
	main_loop.run(BufReader::new(read), write).await?;

	info!("host channel closed; worker exiting");
	Ok(())
}

fn setup_tracing(verbose: bool, debug_logging: bool, log_layer: SocketLogLayer) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::prelude::*;

	let log_layer = log_layer.with_debug(debug_logging);

	// Support TETHER_LOG_DIR for smoke testing
	if let Some(log_dir) = std::env::var("TETHER_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let pid = std::process::id();
		let log_path = log_dir.join(format!("tether-worker.{pid}.log"));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
				if verbose {
					EnvFilter::new("tether_worker=trace,tether_rpc=trace,debug")
				} else {
					EnvFilter::new("tether_worker=debug,info")
				}
			});

			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_target(true);

			tracing_subscriber::registry()
				.with(filter)
				.with(file_layer)
				.with(log_layer)
				.init();

			tracing::info!(path = ?log_path, "worker tracing initialized");
			return;
		}
	}

	// Fallback: stderr plus the host channel
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("debug")
		} else {
			EnvFilter::new("info")
		}
	});
	tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.with(log_layer)
		.init();
}
