//! Well-known filesystem locations for the worker channel.

use std::path::PathBuf;

/// Returns the default socket path a worker connects to.
///
/// Prefers the user runtime directory and falls back to the system temp
/// directory when none is available.
#[must_use]
pub fn default_socket_path() -> PathBuf {
	dirs::runtime_dir()
		.map(|dir| dir.join("tether").join("host.sock"))
		.unwrap_or_else(|| std::env::temp_dir().join("tether-host.sock"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_socket_path_names_the_socket() {
		let path = default_socket_path();
		assert_eq!(path.extension().and_then(|e| e.to_str()), Some("sock"));
	}
}
