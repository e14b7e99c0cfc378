//! Shared wire types for the tether host/worker channel.
//!
//! This crate defines the frames exchanged between a host orchestrator and a
//! function worker over a local stream socket. The wire uses binary framing
//! with postcard encoding: a little-endian u32 length prefix followed by the
//! encoded [`types::Frame`].

#![warn(missing_docs)]

pub mod error;
pub mod paths;
pub mod protocol;
pub mod types;

pub use error::ProtoError;
pub use protocol::WorkerProtocol;
pub use types::*;
