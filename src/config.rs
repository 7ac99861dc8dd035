//! Client runtime configuration.
//!
//! SYSTEM CONTEXT
//! ==============
//! Built once in `App` and provided through Leptos context. The browser build
//! reads optional overrides from a `<meta name="chatroom-config">` tag whose
//! `content` is a JSON object; any omitted field keeps its default.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Polling faster than this only adds load without fresher data.
const MIN_POLL_INTERVAL_MS: u64 = 500;

#[cfg(feature = "hydrate")]
const CONFIG_META_NAME: &str = "chatroom-config";

/// Errors produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The override document was not valid JSON for [`ClientConfig`].
    #[error("config parse failed: {0}")]
    Parse(String),
}

/// Scheme used in the `Authorization` header of authenticated calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthScheme {
    #[default]
    Bearer,
    Token,
}

impl AuthScheme {
    #[must_use]
    pub fn header_value(self, token: &str) -> String {
        match self {
            Self::Bearer => format!("Bearer {token}"),
            Self::Token => format!("Token {token}"),
        }
    }
}

/// Tunables for the REST client, session persistence, and feed polling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix prepended to every endpoint path. Empty means same origin.
    pub api_base: String,
    /// Delay between message feed refreshes.
    pub poll_interval_ms: u64,
    /// Size of the newest-messages window requested per refresh.
    pub page_limit: u32,
    pub auth_scheme: AuthScheme,
    /// Durable storage key holding the raw session token.
    pub token_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            poll_interval_ms: 5_000,
            page_limit: 100,
            auth_scheme: AuthScheme::Bearer,
            token_key: "token".to_owned(),
        }
    }
}

impl ClientConfig {
    /// Parse a JSON override document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if `raw` is not a JSON object matching
    /// the config schema.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load overrides from the page's config meta tag, falling back to
    /// defaults when the tag is missing or malformed.
    #[must_use]
    pub fn from_document() -> Self {
        #[cfg(feature = "hydrate")]
        {
            use wasm_bindgen::JsCast;

            let raw = web_sys::window()
                .and_then(|w| w.document())
                .and_then(|doc| {
                    doc.query_selector(&format!("meta[name=\"{CONFIG_META_NAME}\"]"))
                        .ok()
                        .flatten()
                })
                .and_then(|el| el.dyn_into::<web_sys::HtmlMetaElement>().ok())
                .map(|meta| meta.content());
            match raw.as_deref().map(Self::from_json) {
                Some(Ok(config)) => config,
                Some(Err(e)) => {
                    log::warn!("ignoring config overrides: {e}");
                    Self::default()
                }
                None => Self::default(),
            }
        }
        #[cfg(not(feature = "hydrate"))]
        {
            Self::default()
        }
    }

    /// Poll interval, clamped to a sane minimum.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    /// Absolute URL for an endpoint path such as `/api/profile/`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.api_base.trim_end_matches('/'))
    }
}
