//! Routed pages. Each wraps its content in `Guarded` with the access level
//! it needs.

pub mod chat;
pub mod login;
pub mod profile;
pub mod register;
