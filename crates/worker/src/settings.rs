//! Environment-derived worker settings.
//!
//! Settings follow the app-setting convention of the host platform: plain
//! environment variables, each read through a validator that falls back to
//! the default (with a warning) instead of failing startup.

use tracing::warn;

/// Width of the sync-handler thread pool.
pub const SYNC_THREAD_COUNT: &str = "TETHER_SYNC_THREAD_COUNT";

/// Enables debug-level log forwarding.
pub const ENABLE_DEBUG_LOGGING: &str = "TETHER_ENABLE_DEBUG_LOGGING";

/// Overrides the host socket path.
pub const SOCKET: &str = "TETHER_SOCKET";

const SYNC_THREAD_COUNT_MIN: usize = 1;
const SYNC_THREAD_COUNT_MAX: usize = 1024;

/// Reads a setting, accepting it only when the validator passes.
#[must_use]
pub fn get_setting_with(name: &str, validator: impl Fn(&str) -> bool) -> Option<String> {
	let value = std::env::var(name).ok()?;
	validator(&value).then_some(value)
}

/// Returns true when the named setting is a truthy flag (`1` or `true`).
#[must_use]
pub fn is_envvar_true(name: &str) -> bool {
	matches!(
		std::env::var(name).ok().as_deref().map(str::trim),
		Some("1") | Some("true") | Some("True") | Some("TRUE")
	)
}

fn validate_thread_count(value: &str) -> bool {
	let Ok(count) = value.parse::<usize>() else {
		warn!("{SYNC_THREAD_COUNT} must be an integer");
		return false;
	};
	if !(SYNC_THREAD_COUNT_MIN..=SYNC_THREAD_COUNT_MAX).contains(&count) {
		warn!(
			"{SYNC_THREAD_COUNT} must be set to a value between {SYNC_THREAD_COUNT_MIN} and \
			 {SYNC_THREAD_COUNT_MAX}; reverting to the default width"
		);
		return false;
	}
	true
}

fn default_sync_threads() -> usize {
	std::thread::available_parallelism()
		.map(std::num::NonZero::get)
		.unwrap_or(1)
		.min(32)
}

/// Resolved worker settings.
#[derive(Debug, Clone)]
pub struct Settings {
	/// Width of the sync-handler thread pool.
	pub sync_threads: usize,
	/// Forward debug-level records to the host.
	pub debug_logging: bool,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			sync_threads: default_sync_threads(),
			debug_logging: false,
		}
	}
}

impl Settings {
	/// Resolves settings from the environment.
	#[must_use]
	pub fn from_env() -> Self {
		let sync_threads = get_setting_with(SYNC_THREAD_COUNT, validate_thread_count)
			.and_then(|value| value.parse().ok())
			.unwrap_or_else(default_sync_threads);
		Self {
			sync_threads,
			debug_logging: is_envvar_true(ENABLE_DEBUG_LOGGING),
		}
	}
}
