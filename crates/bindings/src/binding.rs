//! The binding trait and the set resolving type tags to bindings.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use tether_proto::Datum;

use crate::deferred::ExtensionRegistry;
use crate::error::Result;
use crate::generic::GenericBinding;
use crate::value::{Value, ValueKind};

/// Translation between wire data and native values for one binding type.
///
/// Implementations must be cheap to share: a binding set is populated once
/// and read concurrently by every invocation.
pub trait Binding: Send + Sync {
	/// Returns true when this binding type can act as a trigger.
	fn has_trigger_support(&self) -> bool {
		false
	}

	/// Returns true when the annotated input kind is acceptable.
	fn check_input_type(&self, kind: ValueKind) -> bool;

	/// Returns true when the annotated output kind is acceptable.
	fn check_output_type(&self, kind: ValueKind) -> bool;

	/// Returns true when the binding produces output without a declared
	/// `$return` binding.
	fn has_implicit_output(&self) -> bool {
		false
	}

	/// Decodes a wire datum into a native value.
	///
	/// # Errors
	///
	/// [`crate::BindingError::NotSupported`] when the datum shape is not
	/// supported by this binding; callers translate this into a descriptive
	/// decode failure.
	fn decode(&self, datum: Datum, trigger_metadata: &BTreeMap<String, Datum>) -> Result<Value>;

	/// Encodes a native value into a wire datum.
	///
	/// # Errors
	///
	/// [`crate::BindingError::NotSupported`] when the value shape is not
	/// supported by this binding.
	fn encode(&self, value: Value) -> Result<Datum>;
}

/// Process-wide mapping from binding type tags to bindings.
///
/// Populated once at init or reload and read concurrently afterwards; a tag
/// nothing was registered for falls back to the generic binding.
#[derive(Clone)]
pub struct BindingSet {
	bindings: HashMap<String, Arc<dyn Binding>>,
	extensions: Option<Arc<dyn ExtensionRegistry>>,
	fallback: Arc<dyn Binding>,
}

impl std::fmt::Debug for BindingSet {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut tags: Vec<_> = self.bindings.keys().collect();
		tags.sort();
		f.debug_struct("BindingSet")
			.field("tags", &tags)
			.field("extensions", &self.extensions.is_some())
			.finish()
	}
}

impl BindingSet {
	/// Creates a set with no registered bindings.
	///
	/// An empty set fails worker init; this constructor exists for embedders
	/// that register everything themselves.
	#[must_use]
	pub fn empty() -> Self {
		Self {
			bindings: HashMap::new(),
			extensions: None,
			fallback: Arc::new(GenericBinding),
		}
	}

	/// Creates a set with the built-in bindings registered.
	#[must_use]
	pub fn builtin() -> Self {
		let mut set = Self::empty();
		set.register("signal", Arc::new(crate::signal::SignalTrigger));
		set
	}

	/// Registers a binding under a type tag, replacing any previous entry.
	pub fn register(&mut self, tag: impl Into<String>, binding: Arc<dyn Binding>) {
		self.bindings.insert(tag.into(), binding);
	}

	/// Attaches an extension registry for deferred bindings.
	#[must_use]
	pub fn with_extensions(mut self, extensions: Arc<dyn ExtensionRegistry>) -> Self {
		self.extensions = Some(extensions);
		self
	}

	/// Resolves a type tag, falling back to the generic binding.
	#[must_use]
	pub fn get(&self, tag: &str) -> &Arc<dyn Binding> {
		self.bindings.get(tag).unwrap_or(&self.fallback)
	}

	/// Returns true when the tag resolves to a registered (non-fallback)
	/// binding.
	#[must_use]
	pub fn is_registered(&self, tag: &str) -> bool {
		self.bindings.contains_key(tag)
	}

	/// Returns true when the tag resolves to a trigger-capable binding.
	#[must_use]
	pub fn is_trigger(&self, tag: &str) -> bool {
		self.get(tag).has_trigger_support()
	}

	/// Returns true when the tag's binding produces output without a
	/// declared `$return` binding.
	#[must_use]
	pub fn has_implicit_output(&self, tag: &str) -> bool {
		self.get(tag).has_implicit_output()
	}

	/// Returns the attached extension registry, if any.
	#[must_use]
	pub fn extensions(&self) -> Option<&Arc<dyn ExtensionRegistry>> {
		self.extensions.as_ref()
	}

	/// Returns the number of registered bindings.
	#[must_use]
	pub fn len(&self) -> usize {
		self.bindings.len()
	}

	/// Returns true when no binding has been registered.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.bindings.is_empty()
	}
}
