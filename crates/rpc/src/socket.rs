//! Cloneable handle onto a main loop's outbound queue.

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::event::AnyEvent;
use crate::protocol::Protocol;

/// Events accepted by the main loop's internal queue.
///
/// The queue is the single multiplexing point for everything leaving the
/// process: responses produced by handler tasks, uncorrelated messages such
/// as log records or a stream handshake, locally originated requests, and
/// loopback events. It is safe to enqueue from any thread.
pub enum MainLoopEvent<P: Protocol> {
	/// Emit a wire message as-is.
	Outgoing(P::Message),
	/// Emit a request after assigning it a fresh ID; the response is routed
	/// back through the provided channel.
	OutgoingRequest(P::Request, oneshot::Sender<P::Response>),
	/// Deliver a loopback event to the service.
	Any(AnyEvent),
}

impl<P: Protocol> std::fmt::Debug for MainLoopEvent<P> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Outgoing(_) => f.write_str("MainLoopEvent::Outgoing"),
			Self::OutgoingRequest(..) => f.write_str("MainLoopEvent::OutgoingRequest"),
			Self::Any(event) => f.debug_tuple("MainLoopEvent::Any").field(event).finish(),
		}
	}
}

/// Channel for communicating with a running [`crate::MainLoop`].
///
/// Sockets are cheap to clone and may be held by handler tasks, worker
/// threads, and logging layers concurrently.
pub struct PeerSocket<P: Protocol> {
	tx: mpsc::UnboundedSender<MainLoopEvent<P>>,
}

impl<P: Protocol> Clone for PeerSocket<P> {
	fn clone(&self) -> Self {
		Self { tx: self.tx.clone() }
	}
}

impl<P: Protocol> std::fmt::Debug for PeerSocket<P> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PeerSocket")
			.field("closed", &self.tx.is_closed())
			.finish()
	}
}

impl<P: Protocol> PeerSocket<P> {
	pub(crate) fn new(tx: mpsc::UnboundedSender<MainLoopEvent<P>>) -> Self {
		Self { tx }
	}

	/// Enqueues a raw main loop event.
	///
	/// # Errors
	///
	/// Returns [`Error::ServiceStopped`] when the loop is gone.
	pub fn send(&self, event: MainLoopEvent<P>) -> Result<()> {
		self.tx.send(event).map_err(|_| Error::ServiceStopped)
	}

	/// Enqueues a wire message for emission.
	///
	/// # Errors
	///
	/// Returns [`Error::ServiceStopped`] when the loop is gone.
	pub fn send_message(&self, msg: P::Message) -> Result<()> {
		self.send(MainLoopEvent::Outgoing(msg))
	}

	/// Enqueues an uncorrelated message for emission.
	///
	/// # Errors
	///
	/// Returns [`Error::ServiceStopped`] when the loop is gone.
	pub fn notify(&self, notif: P::Notification) -> Result<()> {
		self.send(MainLoopEvent::Outgoing(P::wrap_notification(notif)))
	}

	/// Sends a request and waits for the correlated response.
	///
	/// # Errors
	///
	/// Returns [`Error::ServiceStopped`] when the loop is gone, or
	/// [`Error::ResponseLost`] when the loop drops the pending entry (for
	/// example because the stream closed first).
	pub async fn request(&self, req: P::Request) -> Result<P::Response> {
		let (resp_tx, resp_rx) = oneshot::channel();
		self.send(MainLoopEvent::OutgoingRequest(req, resp_tx))?;
		resp_rx.await.map_err(|_| Error::ResponseLost)
	}

	/// Injects a loopback event delivered to the service's `emit` hook.
	///
	/// # Errors
	///
	/// Returns [`Error::ServiceStopped`] when the loop is gone.
	pub fn emit(&self, event: AnyEvent) -> Result<()> {
		self.send(MainLoopEvent::Any(event))
	}

	/// Returns true when the main loop no longer drains this socket.
	#[must_use]
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}
