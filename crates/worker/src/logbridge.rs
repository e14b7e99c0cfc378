//! Tracing layer forwarding log records to the host.
//!
//! Once the channel is up, worker and user log lines ride the same outbound
//! queue as responses, each attributed to the invocation that emitted it via
//! the ambient id from [`crate::invocation`]. Forwarding failures are
//! silently dropped: if the channel is gone there is nowhere to report to.

use tether_proto::{Frame, LogCategory, LogLevel, LogRecord, WorkerProtocol};
use tether_rpc::PeerSocket;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::invocation::current_invocation_id;

/// A [`Layer`] that emits every event as a [`Frame::Log`] on the channel.
pub struct SocketLogLayer {
	socket: PeerSocket<WorkerProtocol>,
	forward_debug: bool,
}

impl SocketLogLayer {
	/// Creates a layer forwarding info-and-above records.
	#[must_use]
	pub fn new(socket: PeerSocket<WorkerProtocol>) -> Self {
		Self { socket, forward_debug: false }
	}

	/// Also forwards debug- and trace-level records.
	#[must_use]
	pub fn with_debug(mut self, enabled: bool) -> Self {
		self.forward_debug = enabled;
		self
	}
}

fn map_level(level: &tracing::Level) -> LogLevel {
	match *level {
		tracing::Level::ERROR => LogLevel::Error,
		tracing::Level::WARN => LogLevel::Warning,
		tracing::Level::INFO => LogLevel::Information,
		tracing::Level::DEBUG => LogLevel::Debug,
		tracing::Level::TRACE => LogLevel::Trace,
	}
}

/// Runtime-owned targets report as system records; everything else is user
/// code.
fn is_system_category(target: &str) -> bool {
	target == "tether" || target.starts_with("tether_") || target.starts_with("tether-")
}

/// Visitor collecting the message field and formatting the rest.
#[derive(Default)]
struct MessageVisitor {
	message: String,
	fields: Vec<(String, String)>,
}

impl Visit for MessageVisitor {
	fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
		if field.name() == "message" {
			self.message = format!("{value:?}");
		} else {
			self.fields.push((field.name().to_string(), format!("{value:?}")));
		}
	}

	fn record_str(&mut self, field: &Field, value: &str) {
		if field.name() == "message" {
			self.message = value.to_string();
		} else {
			self.fields.push((field.name().to_string(), value.to_string()));
		}
	}
}

impl MessageVisitor {
	fn into_message(self) -> String {
		if self.fields.is_empty() {
			return self.message;
		}
		let mut message = self.message;
		for (name, value) in self.fields {
			message.push(' ');
			message.push_str(&name);
			message.push('=');
			message.push_str(&value);
		}
		message
	}
}

impl<S: Subscriber> Layer<S> for SocketLogLayer {
	fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
		let level = map_level(event.metadata().level());
		if !self.forward_debug && matches!(level, LogLevel::Debug | LogLevel::Trace) {
			return;
		}

		let mut visitor = MessageVisitor::default();
		event.record(&mut visitor);

		let target = event.metadata().target();
		let record = LogRecord {
			level,
			message: visitor.into_message(),
			category: target.to_string(),
			log_category: if is_system_category(target) {
				LogCategory::System
			} else {
				LogCategory::User
			},
			invocation_id: current_invocation_id(),
		};
		let _ = self.socket.send_message(Frame::Log(record));
	}
}

#[cfg(test)]
mod tests {
	use tether_bindings::BindingSet;
	use tokio::io::BufReader;
	use tracing_subscriber::layer::SubscriberExt;

	use super::*;
	use crate::app::FunctionApp;
	use crate::serve::Worker;

	async fn next_log(
		reader: &mut BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>,
	) -> LogRecord {
		loop {
			match Frame::read(reader).await.unwrap() {
				Frame::Log(record) => return record,
				_ => continue,
			}
		}
	}

	#[tokio::test]
	async fn events_become_log_frames() {
		let worker = Worker::new(FunctionApp::default(), BindingSet::builtin(), "w-log");
		let (main_loop, socket) = worker.into_service();
		let (peer, ours) = tokio::io::duplex(4096);
		let _loop_task = tokio::spawn(async move {
			let (read, write) = tokio::io::split(ours);
			main_loop.run(BufReader::new(read), write).await
		});

		let layer = SocketLogLayer::new(socket).with_debug(false);
		let subscriber = tracing_subscriber::registry().with(layer);
		tracing::subscriber::with_default(subscriber, || {
			tracing::debug!(target: "user_code", "filtered out");
			let _guard = crate::invocation::ThreadIdGuard::enter("inv-9");
			tracing::info!(target: "user_code", step = 2, "doing work");
		});

		let (read, _write) = tokio::io::split(peer);
		let mut reader = BufReader::new(read);
		let record = next_log(&mut reader).await;
		assert_eq!(record.level, LogLevel::Information);
		assert_eq!(record.category, "user_code");
		assert_eq!(record.log_category, LogCategory::User);
		assert_eq!(record.invocation_id, Some("inv-9".to_string()));
		assert!(record.message.contains("doing work"));
		assert!(record.message.contains("step=2"));
	}

	#[tokio::test]
	async fn runtime_targets_are_system_records() {
		let worker = Worker::new(FunctionApp::default(), BindingSet::builtin(), "w-log2");
		let (main_loop, socket) = worker.into_service();
		let (peer, ours) = tokio::io::duplex(4096);
		let _loop_task = tokio::spawn(async move {
			let (read, write) = tokio::io::split(ours);
			main_loop.run(BufReader::new(read), write).await
		});

		let layer = SocketLogLayer::new(socket);
		let subscriber = tracing_subscriber::registry().with(layer);
		tracing::subscriber::with_default(subscriber, || {
			tracing::warn!(target: "tether_worker::service", "pool pressure");
		});

		let (read, _write) = tokio::io::split(peer);
		let mut reader = BufReader::new(read);
		let record = next_log(&mut reader).await;
		assert_eq!(record.level, LogLevel::Warning);
		assert_eq!(record.log_category, LogCategory::System);
		assert_eq!(record.invocation_id, None);
	}
}
