//! HTTP transport for the chat backend.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT as USER_AGENT_HEADER};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::TokenSource;
use crate::chat::{ChatAnswer, ChatEventStream, decode_stream};
use crate::config::LoginFormat;
use crate::error::{ChatError, ChatErrorKind, ChatResult};

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("ichat/", env!("CARGO_PKG_VERSION"));

/// Decoded events from a streamed chat response.
pub type ResponseEventStream = ChatEventStream<BoxStream<'static, reqwest::Result<Bytes>>>;

/// Resolved transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend root without a trailing slash
    pub base_url: String,
    pub chat_path: String,
    pub login_path: String,
    pub login_format: LoginFormat,
    pub top_k: Option<u32>,
    pub connect_timeout: Duration,
    /// Maximum silence between reads; bounds a stalled stream
    pub read_timeout: Duration,
}

impl ClientConfig {
    /// Transport settings with default paths and timeouts for `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            chat_path: "/api/chat".to_string(),
            login_path: "/login".to_string(),
            login_format: LoginFormat::Json,
            top_k: None,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(120),
        }
    }

    pub fn chat_url(&self) -> String {
        format!("{}{}", self.base_url, self.chat_path)
    }

    pub fn login_url(&self) -> String {
        format!("{}{}", self.base_url, self.login_path)
    }
}

/// Builds the shared reqwest client with timeouts and User-Agent.
///
/// # Errors
/// Returns a `Transport` error if the TLS backend cannot be initialized.
pub fn build_http_client(config: &ClientConfig) -> ChatResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT_HEADER, HeaderValue::from_static(USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .build()
        .map_err(|e| ChatError::transport(&e))
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    question: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

/// Client for the chat endpoint.
#[derive(Clone)]
pub struct ChatClient {
    config: ClientConfig,
    tokens: Arc<dyn TokenSource>,
    http: reqwest::Client,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// # Errors
    /// Returns a `Transport` error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenSource>) -> ChatResult<Self> {
        let http = build_http_client(&config)?;
        Ok(Self {
            config,
            tokens,
            http,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Asks for a complete JSON answer.
    ///
    /// # Errors
    /// Returns a transport error, or `ChatRequest` on a non-2xx or unreadable body.
    pub async fn ask(&self, question: &str) -> ChatResult<ChatAnswer> {
        let response = self.send(question, "application/json").await?;
        let body = response.text().await.map_err(|e| ChatError::transport(&e))?;

        serde_json::from_str(&body).map_err(|e| ChatError {
            kind: ChatErrorKind::ChatRequest,
            message: format!("Unexpected chat response: {e}"),
            details: Some(body),
        })
    }

    /// Asks for a streamed answer and returns the decoded event stream.
    ///
    /// # Errors
    /// Returns a transport error, or `ChatRequest` on a non-2xx status.
    pub async fn ask_stream(&self, question: &str) -> ChatResult<ResponseEventStream> {
        let response = self.send(question, "text/event-stream").await?;
        Ok(decode_stream(response.bytes_stream().boxed()))
    }

    async fn send(&self, question: &str, accept: &'static str) -> ChatResult<reqwest::Response> {
        let url = self.config.chat_url();
        let mut request = self
            .http
            .post(&url)
            .header(ACCEPT, accept)
            .json(&ChatRequest {
                question,
                top_k: self.config.top_k,
            });

        if let Some(token) = self.tokens.token() {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        } else {
            debug!("no token available; sending unauthenticated request");
        }

        info!(%url, accept, "sending chat request");
        let response = request.send().await.map_err(|e| ChatError::transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "chat request rejected");
            return Err(ChatError::http_status(
                ChatErrorKind::ChatRequest,
                status.as_u16(),
                &body,
            ));
        }

        Ok(response)
    }
}
