//! REST API seam for the chat backend.
//!
//! Client-side (hydrate): real HTTP calls via `gloo-net`.
//! Server-side (SSR): every call fails with a network error since these
//! endpoints are only meaningful in the browser.
//!
//! ERROR HANDLING
//! ==============
//! Each call returns one discriminated [`ApiResult`]. Non-success statuses are
//! classified by [`ApiError::from_status`], so session and feed code never
//! inspect raw responses.

#![allow(clippy::unused_async)]

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::rc::Rc;

use async_trait::async_trait;

use super::error::{ApiError, ApiResult};
use super::types::{AuthResponse, ChatMessage, LoginRequest, NewMessage, PageRequest, ProfileUpdate, RegisterRequest, User};
use crate::config::ClientConfig;

const REGISTER_PATH: &str = "/api/auth/register/";
const LOGIN_PATH: &str = "/api/auth/login/";
const LOGOUT_PATH: &str = "/api/auth/logout/";
const PROFILE_PATH: &str = "/api/profile/";
const PROFILE_UPDATE_PATH: &str = "/api/profile/update/";
const MESSAGES_PATH: &str = "/api/messages/";
const MESSAGE_CREATE_PATH: &str = "/api/messages/create/";

/// Backend operations used by the session and feed engines.
///
/// Futures are not `Send`: the browser runs everything on one thread.
#[async_trait(?Send)]
pub trait ChatApi {
    /// `POST /api/auth/register/`.
    async fn register(&self, req: &RegisterRequest) -> ApiResult<AuthResponse>;

    /// `POST /api/auth/login/`.
    async fn login(&self, req: &LoginRequest) -> ApiResult<AuthResponse>;

    /// `POST /api/auth/logout/`, invalidating `token` server-side.
    async fn logout(&self, token: &str) -> ApiResult<()>;

    /// `GET /api/profile/`.
    async fn fetch_profile(&self, token: &str) -> ApiResult<User>;

    /// `PUT /api/profile/update/`.
    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> ApiResult<User>;

    /// `GET /api/messages/?limit=&offset=`.
    async fn fetch_messages(&self, token: &str, page: PageRequest) -> ApiResult<Vec<ChatMessage>>;

    /// `POST /api/messages/create/`.
    async fn create_message(&self, token: &str, message: &NewMessage) -> ApiResult<ChatMessage>;
}

#[async_trait(?Send)]
impl<T: ChatApi + ?Sized> ChatApi for Rc<T> {
    async fn register(&self, req: &RegisterRequest) -> ApiResult<AuthResponse> {
        (**self).register(req).await
    }

    async fn login(&self, req: &LoginRequest) -> ApiResult<AuthResponse> {
        (**self).login(req).await
    }

    async fn logout(&self, token: &str) -> ApiResult<()> {
        (**self).logout(token).await
    }

    async fn fetch_profile(&self, token: &str) -> ApiResult<User> {
        (**self).fetch_profile(token).await
    }

    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> ApiResult<User> {
        (**self).update_profile(token, update).await
    }

    async fn fetch_messages(&self, token: &str, page: PageRequest) -> ApiResult<Vec<ChatMessage>> {
        (**self).fetch_messages(token, page).await
    }

    async fn create_message(&self, token: &str, message: &NewMessage) -> ApiResult<ChatMessage> {
        (**self).create_message(token, message).await
    }
}

#[cfg(any(test, feature = "hydrate"))]
fn messages_query(page: PageRequest) -> [(&'static str, String); 2] {
    [("limit", page.limit.to_string()), ("offset", page.offset.to_string())]
}

#[cfg(not(feature = "hydrate"))]
fn unavailable<T>() -> ApiResult<T> {
    Err(ApiError::Network("not available on server".to_owned()))
}

/// `gloo-net` implementation of [`ChatApi`].
#[derive(Clone, Debug)]
pub struct HttpApi {
    config: ClientConfig,
}

impl HttpApi {
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self { config: config.clone() }
    }

    #[cfg(any(test, feature = "hydrate"))]
    fn url(&self, path: &str) -> String {
        self.config.endpoint(path)
    }

    #[cfg(any(test, feature = "hydrate"))]
    fn authorization(&self, token: &str) -> String {
        self.config.auth_scheme.header_value(token)
    }
}

#[cfg(feature = "hydrate")]
mod transport {
    use gloo_net::http::{RequestBuilder, Response};
    use serde::Serialize;
    use serde::de::DeserializeOwned;

    use crate::net::error::{ApiError, ApiResult};

    fn network(err: gloo_net::Error) -> ApiError {
        ApiError::Network(err.to_string())
    }

    pub(super) async fn send_json<B: Serialize>(builder: RequestBuilder, body: &B) -> ApiResult<Response> {
        builder.json(body).map_err(network)?.send().await.map_err(network)
    }

    pub(super) async fn send_empty(builder: RequestBuilder) -> ApiResult<Response> {
        builder.send().await.map_err(network)
    }

    /// Decode a success body as `T`, or classify the failure status.
    pub(super) async fn decode<T: DeserializeOwned>(resp: Response) -> ApiResult<T> {
        let status = resp.status();
        if resp.ok() {
            return resp
                .json::<T>()
                .await
                .map_err(|e| ApiError::Network(format!("malformed response: {e}")));
        }
        let body = resp
            .text()
            .await
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or(serde_json::Value::Null);
        Err(ApiError::from_status(status, &body))
    }
}

#[async_trait(?Send)]
impl ChatApi for HttpApi {
    async fn register(&self, req: &RegisterRequest) -> ApiResult<AuthResponse> {
        #[cfg(feature = "hydrate")]
        {
            let builder = gloo_net::http::Request::post(&self.url(REGISTER_PATH));
            transport::decode(transport::send_json(builder, req).await?).await
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = (req, REGISTER_PATH);
            unavailable()
        }
    }

    async fn login(&self, req: &LoginRequest) -> ApiResult<AuthResponse> {
        #[cfg(feature = "hydrate")]
        {
            let builder = gloo_net::http::Request::post(&self.url(LOGIN_PATH));
            transport::decode(transport::send_json(builder, req).await?).await
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = (req, LOGIN_PATH);
            unavailable()
        }
    }

    async fn logout(&self, token: &str) -> ApiResult<()> {
        #[cfg(feature = "hydrate")]
        {
            let builder = gloo_net::http::Request::post(&self.url(LOGOUT_PATH))
                .header("Authorization", &self.authorization(token));
            let resp = transport::send_json(builder, &serde_json::json!({})).await?;
            transport::decode::<serde_json::Value>(resp).await.map(|_| ())
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = (token, LOGOUT_PATH);
            unavailable()
        }
    }

    async fn fetch_profile(&self, token: &str) -> ApiResult<User> {
        #[cfg(feature = "hydrate")]
        {
            let builder = gloo_net::http::Request::get(&self.url(PROFILE_PATH))
                .header("Authorization", &self.authorization(token));
            transport::decode(transport::send_empty(builder).await?).await
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = (token, PROFILE_PATH);
            unavailable()
        }
    }

    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> ApiResult<User> {
        #[cfg(feature = "hydrate")]
        {
            let builder = gloo_net::http::Request::put(&self.url(PROFILE_UPDATE_PATH))
                .header("Authorization", &self.authorization(token));
            transport::decode(transport::send_json(builder, update).await?).await
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = (token, update, PROFILE_UPDATE_PATH);
            unavailable()
        }
    }

    async fn fetch_messages(&self, token: &str, page: PageRequest) -> ApiResult<Vec<ChatMessage>> {
        #[cfg(feature = "hydrate")]
        {
            let query = messages_query(page);
            let builder = gloo_net::http::Request::get(&self.url(MESSAGES_PATH))
                .query(query.iter().map(|(k, v)| (*k, v.as_str())))
                .header("Authorization", &self.authorization(token));
            let resp = transport::send_empty(builder).await?;
            transport::decode::<super::types::MessagePage>(resp)
                .await
                .map(super::types::MessagePage::into_messages)
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = (token, page, MESSAGES_PATH);
            unavailable()
        }
    }

    async fn create_message(&self, token: &str, message: &NewMessage) -> ApiResult<ChatMessage> {
        #[cfg(feature = "hydrate")]
        {
            let builder = gloo_net::http::Request::post(&self.url(MESSAGE_CREATE_PATH))
                .header("Authorization", &self.authorization(token));
            transport::decode(transport::send_json(builder, message).await?).await
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = (token, message, MESSAGE_CREATE_PATH);
            unavailable()
        }
    }
}
