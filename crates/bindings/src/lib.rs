//! Binding resolution for the tether worker.
//!
//! Bindings translate between wire-level [`tether_proto::Datum`] values and
//! the native [`Value`]s handed to user functions. A [`BindingSet`] maps
//! binding type tags to [`Binding`] implementations, with a generic fallback
//! for tags nothing was registered for and a delegation path for deferred
//! bindings resolved by an [`ExtensionRegistry`].

#![warn(missing_docs)]

pub mod binding;
pub mod context;
pub mod deferred;
pub mod error;
pub mod generic;
pub mod out;
pub mod resolve;
pub mod signal;
pub mod value;

pub use binding::{Binding, BindingSet};
pub use context::InvocationContext;
pub use deferred::{DeferredKey, ExtensionRegistry};
pub use error::BindingError;
pub use generic::GenericBinding;
pub use out::OutSlot;
pub use resolve::{from_incoming, to_outgoing_datum, to_outgoing_param};
pub use signal::SignalTrigger;
pub use value::{Annotation, OpaqueValue, Value, ValueKind};
