//! Wire-level errors for the worker channel.

use thiserror::Error;

/// Errors raised while reading or writing frames.
#[derive(Debug, Error)]
pub enum ProtoError {
	/// The peer closed the stream at a frame boundary.
	#[error("peer disconnected")]
	Disconnect,

	/// An I/O failure, including a stream torn mid-frame.
	#[error("I/O error on worker channel: {0}")]
	Io(#[from] std::io::Error),

	/// A frame could not be encoded.
	#[error("frame encode error: {0}")]
	Encode(#[from] postcard::Error),

	/// The peer announced a frame larger than the channel allows.
	#[error("frame of {len} bytes exceeds the channel limit")]
	FrameTooLarge {
		/// Announced body length in bytes.
		len: u32,
	},
}
