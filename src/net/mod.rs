//! Networking modules for the REST backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` defines the backend seam and its HTTP implementation, `types` the
//! payload schema, and `error` the failure taxonomy shared by both engines.

pub mod api;
pub mod error;
pub mod types;
