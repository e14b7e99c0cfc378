//! Ambient invocation-id propagation for log attribution.
//!
//! Handlers receive their identity through the explicit
//! [`tether_bindings::InvocationContext`]; the ambient id tracked here exists
//! only so the log-forwarding layer can attribute records emitted by
//! concurrent invocations. Async handlers run inside a task-local scope;
//! sync handlers set a thread-local for the duration of the call.

use std::cell::RefCell;

tokio::task_local! {
	static TASK_INVOCATION_ID: String;
}

thread_local! {
	static THREAD_INVOCATION_ID: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Returns the invocation id owning the current task or thread, if any.
#[must_use]
pub fn current_invocation_id() -> Option<String> {
	if let Ok(id) = TASK_INVOCATION_ID.try_with(Clone::clone) {
		return Some(id);
	}
	THREAD_INVOCATION_ID.with(|slot| slot.borrow().clone())
}

/// Runs a future inside the task-local scope of an invocation id.
pub async fn scope<F: std::future::Future>(invocation_id: String, fut: F) -> F::Output {
	TASK_INVOCATION_ID.scope(invocation_id, fut).await
}

/// Guard placing an invocation id into thread-local state for a sync call.
///
/// The slot is cleared on drop, including when the call unwinds.
pub struct ThreadIdGuard;

impl ThreadIdGuard {
	/// Sets the current thread's invocation id.
	#[must_use]
	pub fn enter(invocation_id: &str) -> Self {
		THREAD_INVOCATION_ID.with(|slot| *slot.borrow_mut() = Some(invocation_id.to_string()));
		Self
	}
}

impl Drop for ThreadIdGuard {
	fn drop(&mut self) {
		THREAD_INVOCATION_ID.with(|slot| *slot.borrow_mut() = None);
	}
}
