//! Deferred bindings resolved by a separately registered extension.

use std::collections::BTreeMap;

use tether_proto::Datum;

use crate::error::Result;
use crate::value::Value;

/// Identity of a deferred parameter resolution.
///
/// Extensions combine this with the resource named inside the datum to cache
/// client objects across invocations; reusing a client across functions can
/// lose session state, which is why the function name is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeferredKey {
	/// Parameter name the resolution is for.
	pub parameter: String,
	/// Declared extension type name.
	pub declared_type: String,
	/// Name of the function being invoked.
	pub function: String,
}

/// Resolver for binding types owned by an extension rather than the built-in
/// binding table.
///
/// The worker only delegates: creation, caching and teardown of whatever the
/// extension hands back are entirely the extension's concern.
pub trait ExtensionRegistry: Send + Sync {
	/// Returns true when the extension resolves the declared type name.
	fn supports(&self, declared_type: &str) -> bool;

	/// Resolves a deferred parameter into a native value.
	///
	/// # Errors
	///
	/// Implementations raise [`crate::BindingError`] variants; failures
	/// surface as invocation decode errors.
	fn decode(
		&self,
		key: &DeferredKey,
		datum: Datum,
		trigger_metadata: &BTreeMap<String, Datum>,
	) -> Result<Value>;
}
