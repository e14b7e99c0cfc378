//! Binding resolution errors.

use thiserror::Error;

/// Errors raised while resolving values across the RPC boundary.
#[derive(Debug, Error)]
pub enum BindingError {
	/// The binding does not support the given datum or value shape.
	///
	/// Raised by [`crate::Binding`] implementations; the resolver translates
	/// it into one of the descriptive variants below before it reaches a
	/// response.
	#[error("binding does not support this data")]
	NotSupported,

	/// An incoming datum could not be decoded by the resolved binding.
	#[error(
		"unable to decode incoming typed data: unsupported combination of \
		 datum kind \"{datum}\" and binding type \"{binding}\""
	)]
	DecodeUnsupported {
		/// Wire tag of the datum.
		datum: &'static str,
		/// Binding type tag that refused it.
		binding: String,
	},

	/// An outgoing value could not be encoded by the resolved binding.
	#[error(
		"unable to encode outgoing typed data: unsupported value kind \
		 \"{value}\" for binding type \"{binding}\""
	)]
	EncodeUnsupported {
		/// Kind of the native value.
		value: &'static str,
		/// Binding type tag that refused it.
		binding: String,
	},

	/// A JSON datum carried text that does not parse.
	#[error("invalid JSON payload: {0}")]
	InvalidJson(#[from] serde_json::Error),

	/// A deferred parameter has no extension able to resolve it.
	#[error("no extension registered for deferred type \"{0}\"")]
	NoExtension(String),
}

/// Result type for binding operations.
pub type Result<T, E = BindingError> = std::result::Result<T, E>;
