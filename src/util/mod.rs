//! Utility helpers shared across client UI modules.
//!
//! SYSTEM CONTEXT
//! ==============
//! Utility modules isolate browser/environment concerns from page and engine
//! logic so both stay testable off the browser.

pub mod guard;
pub mod poll;
pub mod storage;
pub mod time_fmt;
pub mod validate;
