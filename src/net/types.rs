//! REST payload DTOs for the chat backend.
//!
//! DESIGN
//! ======
//! These types mirror the backend's JSON bodies. Timestamps travel as RFC 3339
//! strings and are parsed into `time::OffsetDateTime` at the boundary so the
//! feed can order messages without re-parsing.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The authenticated member as returned by `/api/profile/`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned member id.
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Registration time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    #[must_use]
    pub fn author(&self) -> Author {
        Author {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

/// Message author as embedded in message payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub username: String,
}

/// A server-confirmed chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Server-assigned id, increasing in creation order.
    pub id: i64,
    pub author: Author,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Token plus user returned by login and registration.
///
/// Login nests the user under `user`; registration may flatten the user's
/// fields next to `token`. Both shapes decode into this type.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "AuthPayload")]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AuthPayload {
    Nested {
        token: String,
        user: User,
    },
    Flat {
        token: String,
        #[serde(flatten)]
        user: User,
    },
}

impl From<AuthPayload> for AuthResponse {
    fn from(payload: AuthPayload) -> Self {
        match payload {
            AuthPayload::Nested { token, user } | AuthPayload::Flat { token, user } => Self { token, user },
        }
    }
}

/// Response of `GET /api/messages/`: a `{results: [...]}` page or a bare list.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MessagePage {
    Paged { results: Vec<ChatMessage> },
    Bare(Vec<ChatMessage>),
}

impl MessagePage {
    #[must_use]
    pub fn into_messages(self) -> Vec<ChatMessage> {
        match self {
            Self::Paged { results } | Self::Bare(results) => results,
        }
    }
}

/// Window requested from the message feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    pub username: String,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewMessage {
    pub text: String,
}
