//! Reusable UI components shared across pages.

pub mod form;
pub mod guarded;
