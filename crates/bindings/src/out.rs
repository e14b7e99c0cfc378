//! Mutable slots for output-typed parameters.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::value::Value;

/// A shared slot a function writes its output-binding value into.
///
/// The executor materializes one slot per declared output parameter before
/// the call, hands clones to the function, and reads the slots back after
/// the call returns. A slot left unset is omitted from the response.
#[derive(Debug, Clone, Default)]
pub struct OutSlot {
	value: Arc<Mutex<Option<Value>>>,
}

impl OutSlot {
	/// Creates an empty slot.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores a value, replacing any previous one.
	pub fn set(&self, value: Value) {
		*self.value.lock() = Some(value);
	}

	/// Returns a copy of the current value, if set.
	#[must_use]
	pub fn get(&self) -> Option<Value> {
		self.value.lock().clone()
	}

	/// Takes the value out, leaving the slot empty.
	#[must_use]
	pub fn take(&self) -> Option<Value> {
		self.value.lock().take()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn set_then_take() {
		let slot = OutSlot::new();
		assert_eq!(slot.get(), None);
		slot.set(Value::Int(5));
		assert_eq!(slot.get(), Some(Value::Int(5)));
		assert_eq!(slot.take(), Some(Value::Int(5)));
		assert_eq!(slot.get(), None);
	}

	#[test]
	fn clones_share_the_slot() {
		let slot = OutSlot::new();
		let writer = slot.clone();
		writer.set(Value::Str("shared".into()));
		assert_eq!(slot.take(), Some(Value::Str("shared".into())));
	}
}
