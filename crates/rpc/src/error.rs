//! Errors raised by peer socket operations.

use thiserror::Error;

/// Errors surfaced to code talking to a [`crate::MainLoop`] through its socket.
///
/// Wire-level failures are not represented here; those are owned by the
/// protocol's `LoopError` and terminate the loop itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
	/// The main loop has stopped and no longer drains its queue.
	#[error("main loop has stopped")]
	ServiceStopped,

	/// The loop dropped the pending request before a response arrived.
	#[error("response channel closed before a response arrived")]
	ResponseLost,
}

/// Result type for socket operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
