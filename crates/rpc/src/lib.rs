//! Generic async RPC message pump for host/worker channels.
//!
//! This crate provides protocol-agnostic primitives for driving a framed,
//! full-duplex RPC stream:
//! * `Protocol`: Trait binding a wire format to request/response semantics
//! * `MainLoop`: A tokio-driven pump that fans requests out to handler tasks
//! * `PeerSocket`: Cloneable handle feeding the shared outbound queue
//! * `AnyEvent`: Type-erased loopback event container

#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod mainloop;
pub mod protocol;
pub mod socket;

pub use error::{Error, Result};
pub use event::AnyEvent;
pub use mainloop::{MainLoop, RpcService};
pub use protocol::{CounterIdGen, Inbound, Protocol};
pub use socket::{MainLoopEvent, PeerSocket};
