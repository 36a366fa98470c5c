//! JSON-RPC 2.0 handling
//!
//! Envelope types and validation, plus the server that dispatches requests to
//! the loaded module.

pub mod envelope;
pub mod server;
