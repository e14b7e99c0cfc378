//! Type-erased loopback events.

use std::any::Any;

/// A type-erased event injected back into the main loop through a
/// [`crate::PeerSocket`].
///
/// Services receive these in [`crate::RpcService::emit`] and downcast to the
/// concrete types they understand.
pub struct AnyEvent {
	inner: Box<dyn Any + Send>,
	type_name: &'static str,
}

impl AnyEvent {
	/// Wraps a value into a type-erased event.
	#[must_use]
	pub fn new<T: Send + 'static>(value: T) -> Self {
		Self {
			inner: Box::new(value),
			type_name: std::any::type_name::<T>(),
		}
	}

	/// Returns the type name of the wrapped value, for diagnostics.
	#[must_use]
	pub const fn type_name(&self) -> &'static str {
		self.type_name
	}

	/// Attempts to take the wrapped value out as `T`.
	///
	/// # Errors
	///
	/// Returns `self` unchanged when the wrapped value is not a `T`.
	pub fn downcast<T: Send + 'static>(self) -> Result<T, Self> {
		let type_name = self.type_name;
		match self.inner.downcast::<T>() {
			Ok(value) => Ok(*value),
			Err(inner) => Err(Self { inner, type_name }),
		}
	}

	/// Borrows the wrapped value as `T`, if it is one.
	#[must_use]
	pub fn downcast_ref<T: Send + 'static>(&self) -> Option<&T> {
		self.inner.downcast_ref()
	}
}

impl std::fmt::Debug for AnyEvent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("AnyEvent").field(&self.type_name).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn downcast_roundtrip() {
		let event = AnyEvent::new(41u32);
		assert_eq!(event.downcast_ref::<u32>(), Some(&41));
		assert_eq!(event.downcast::<u32>().unwrap(), 41);
	}

	#[test]
	fn downcast_wrong_type_returns_self() {
		let event = AnyEvent::new("hello");
		let event = event.downcast::<u32>().unwrap_err();
		assert_eq!(event.downcast::<&str>().unwrap(), "hello");
	}
}
