//! # Vigil Node
//!
//! Binary-side pieces of the node: CLI parsing, the default JSON-RPC probe
//! inspection routine, the HTTP health and bus-ingress server, and the
//! composition root that ties the core components together.
#![allow(missing_docs)]

pub mod cli;
pub mod errors;
pub mod node;
pub mod probe;
pub mod server;
