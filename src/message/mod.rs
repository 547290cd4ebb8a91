//! This module exports a minimal message-passing API, which is encapsulated
//! by a `Communicator` trait. Implementors only need to write `send` and
//! `recv` operations for a given transport layer (an in-process transport
//! over channels, for ranks running as threads, is included). The trait then
//! provides default implementations for broadcast, reduce, and reduce-all
//! operations over a group of ranks.
//!

pub mod comm;
pub mod local;
pub mod util;

pub use comm::{Collective, Communicator, Group, Tag};
pub use local::{run_group, LocalCommunicator};
