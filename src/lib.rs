//! # chatroom
//!
//! Leptos + WASM client for a group-chat service: account registration,
//! token sessions, a shared polled message room, and profile editing.
//!
//! The session and message-feed engines in [`state`] carry all of the
//! client's behavior; pages in [`pages`] are thin views over them.

pub mod app;
pub mod components;
pub mod config;
pub mod net;
pub mod pages;
pub mod state;
pub mod util;

#[cfg(test)]
pub(crate) mod test_helpers;

/// Browser entry point: install logging and hydrate the server-rendered body.
#[cfg(feature = "hydrate")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn hydrate() {
    console_error_panic_hook::set_once();
    // Fails only when a logger is already installed.
    let _ = console_log::init_with_level(log::Level::Debug);
    leptos::mount::hydrate_body(app::App);
}
