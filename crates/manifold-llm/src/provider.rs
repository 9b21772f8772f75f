//! Provider dialects: adapter construction plus upstream transport
//!
//! A dialect bundles everything the gateway needs to speak one provider's
//! protocol: constructors for the three adapters, the default endpoint, how
//! the API key travels, and how requests are executed. DeepSeek and Ollama
//! speak the `OpenAI` wire format, so their dialects hold an inner
//! [`OpenAiDialect`] and delegate to it, overriding only identity, endpoint,
//! and key requirements.

use std::time::Duration;

use async_trait::async_trait;
use http::HeaderMap;
use http::header::AUTHORIZATION;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use url::Url;

use crate::adapter::anthropic::{AnthropicRequestAdapter, AnthropicResponseAdapter, AnthropicStreamAdapter};
use crate::adapter::gemini::{GeminiRequestAdapter, GeminiResponseAdapter, GeminiStreamAdapter};
use crate::adapter::openai::{OpenAiRequestAdapter, OpenAiResponseAdapter, OpenAiStreamAdapter};
use crate::adapter::{RequestAdapter, ResponseAdapter, StreamAdapter};
use crate::error::GatewayError;
use crate::registry::ProviderId;

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Timeouts applied when constructing an upstream HTTP client
///
/// The whole-request timeout is optional: streaming responses hold the
/// request open for their full duration.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Whole-request timeout
    pub timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: None,
        }
    }
}

impl From<&manifold_config::ClientConfig> for ClientOptions {
    fn from(config: &manifold_config::ClientConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// A constructed upstream client, bound to one provider endpoint and key
#[derive(Debug)]
pub struct ProviderClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl ProviderClient {
    /// Endpoint base with any trailing slash removed
    fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    fn key(&self) -> Option<&str> {
        self.api_key.as_ref().map(ExposeSecret::expose_secret)
    }
}

/// One provider's complete contract: adapters plus transport
///
/// The registry maps each [`ProviderId`] to exactly one implementation.
/// Adding a provider means implementing this trait, never modifying an
/// existing one.
#[async_trait]
pub trait ProviderDialect: std::fmt::Debug + Send + Sync {
    /// Identifier this dialect is registered under
    fn id(&self) -> ProviderId;

    /// Wrap one raw request body
    fn request_adapter(&self, body: &[u8]) -> Result<Box<dyn RequestAdapter>, GatewayError>;

    /// Wrap one completed provider response
    fn response_adapter(&self, raw: Value) -> Result<Box<dyn ResponseAdapter>, GatewayError>;

    /// Fresh stream adapter for one connection
    fn stream_adapter(&self) -> Box<dyn StreamAdapter>;

    /// Endpoint used when the config has no base-URL override
    fn default_base_url(&self) -> Url;

    /// Whether client construction fails without an API key
    fn requires_api_key(&self) -> bool {
        true
    }

    /// Extract the client's own API key from the inbound request headers
    fn api_key_from_headers(&self, headers: &HeaderMap) -> Option<SecretString>;

    /// Construct the upstream client
    ///
    /// A missing key for a provider that requires one is the fatal case of
    /// this layer; everything downstream assumes a usable client.
    fn create_client(
        &self,
        api_key: Option<SecretString>,
        base_url: Option<Url>,
        options: &ClientOptions,
    ) -> Result<ProviderClient, GatewayError> {
        if api_key.is_none() && self.requires_api_key() {
            return Err(GatewayError::MissingCredentials(self.id()));
        }

        let mut builder = reqwest::Client::builder().connect_timeout(options.connect_timeout);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| GatewayError::Internal(anyhow::anyhow!("failed to build HTTP client: {e}")))?;

        Ok(ProviderClient {
            http,
            base_url: base_url.unwrap_or_else(|| self.default_base_url()),
            api_key,
        })
    }

    /// One non-streaming round trip, returning the raw response body
    async fn execute(&self, client: &ProviderClient, model: &str, body: &Value) -> Result<Value, GatewayError>;

    /// Start a streaming request, returning the response whose byte stream
    /// carries SSE frames
    async fn execute_stream(
        &self,
        client: &ProviderClient,
        model: &str,
        body: &Value,
    ) -> Result<reqwest::Response, GatewayError>;

    /// Client-safe message for an upstream error status
    ///
    /// Prefers the provider's structured error message, falls back to the
    /// raw body, and finally to a static string when the body is empty.
    fn error_message(&self, status: StatusCode, body: &str) -> String {
        let structured = serde_json::from_str::<Value>(body).ok();
        if let Some(message) = structured
            .as_ref()
            .and_then(|v| v.pointer("/error/message"))
            .and_then(Value::as_str)
        {
            return format!("provider returned {status}: {message}");
        }
        let body = body.trim();
        if body.is_empty() {
            "internal server error".to_owned()
        } else {
            format!("provider returned {status}: {body}")
        }
    }
}

/// Fail a response with a non-success status, consuming its body for the
/// error message
async fn ensure_success(dialect: &dyn ProviderDialect, response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(provider = %dialect.id(), status = %status, "upstream returned error");
    Err(GatewayError::Upstream(dialect.error_message(status, &body)))
}

fn send_error(dialect: &dyn ProviderDialect, error: &reqwest::Error) -> GatewayError {
    tracing::error!(provider = %dialect.id(), error = %error, "upstream request failed");
    GatewayError::Upstream(error.to_string())
}

/// Bearer token from the `Authorization` header
fn bearer_from_headers(headers: &HeaderMap) -> Option<SecretString> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| SecretString::from(token.to_owned()))
}

/// Key from a provider-specific header
fn header_key(headers: &HeaderMap, name: &str) -> Option<SecretString> {
    headers
        .get(name)?
        .to_str()
        .ok()
        .map(|key| SecretString::from(key.to_owned()))
}

// -- OpenAI --

/// The `OpenAI` chat-completions dialect
#[derive(Debug)]
pub struct OpenAiDialect;

#[async_trait]
impl ProviderDialect for OpenAiDialect {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    fn request_adapter(&self, body: &[u8]) -> Result<Box<dyn RequestAdapter>, GatewayError> {
        Ok(Box::new(OpenAiRequestAdapter::parse(body)?))
    }

    fn response_adapter(&self, raw: Value) -> Result<Box<dyn ResponseAdapter>, GatewayError> {
        Ok(Box::new(OpenAiResponseAdapter::parse(raw)?))
    }

    fn stream_adapter(&self) -> Box<dyn StreamAdapter> {
        Box::new(OpenAiStreamAdapter::new())
    }

    fn default_base_url(&self) -> Url {
        Url::parse("https://api.openai.com/v1").expect("valid default URL")
    }

    fn api_key_from_headers(&self, headers: &HeaderMap) -> Option<SecretString> {
        bearer_from_headers(headers)
    }

    async fn execute(&self, client: &ProviderClient, _model: &str, body: &Value) -> Result<Value, GatewayError> {
        let mut builder = client.http.post(format!("{}/chat/completions", client.base())).json(body);
        if let Some(key) = client.key() {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| send_error(self, &e))?;
        let response = ensure_success(self, response).await?;
        response
            .json()
            .await
            .map_err(|e| GatewayError::Upstream(format!("failed to parse provider response: {e}")))
    }

    async fn execute_stream(
        &self,
        client: &ProviderClient,
        _model: &str,
        body: &Value,
    ) -> Result<reqwest::Response, GatewayError> {
        let mut builder = client.http.post(format!("{}/chat/completions", client.base())).json(body);
        if let Some(key) = client.key() {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| send_error(self, &e))?;
        ensure_success(self, response).await
    }
}

// -- Anthropic --

/// The Anthropic messages dialect
#[derive(Debug)]
pub struct AnthropicDialect;

#[async_trait]
impl ProviderDialect for AnthropicDialect {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    fn request_adapter(&self, body: &[u8]) -> Result<Box<dyn RequestAdapter>, GatewayError> {
        Ok(Box::new(AnthropicRequestAdapter::parse(body)?))
    }

    fn response_adapter(&self, raw: Value) -> Result<Box<dyn ResponseAdapter>, GatewayError> {
        Ok(Box::new(AnthropicResponseAdapter::parse(raw)?))
    }

    fn stream_adapter(&self) -> Box<dyn StreamAdapter> {
        Box::new(AnthropicStreamAdapter::new())
    }

    fn default_base_url(&self) -> Url {
        Url::parse("https://api.anthropic.com/v1").expect("valid default URL")
    }

    fn api_key_from_headers(&self, headers: &HeaderMap) -> Option<SecretString> {
        header_key(headers, "x-api-key")
    }

    async fn execute(&self, client: &ProviderClient, _model: &str, body: &Value) -> Result<Value, GatewayError> {
        let mut builder = client
            .http
            .post(format!("{}/messages", client.base()))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body);
        if let Some(key) = client.key() {
            builder = builder.header("x-api-key", key);
        }

        let response = builder.send().await.map_err(|e| send_error(self, &e))?;
        let response = ensure_success(self, response).await?;
        response
            .json()
            .await
            .map_err(|e| GatewayError::Upstream(format!("failed to parse provider response: {e}")))
    }

    async fn execute_stream(
        &self,
        client: &ProviderClient,
        _model: &str,
        body: &Value,
    ) -> Result<reqwest::Response, GatewayError> {
        let mut builder = client
            .http
            .post(format!("{}/messages", client.base()))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body);
        if let Some(key) = client.key() {
            builder = builder.header("x-api-key", key);
        }

        let response = builder.send().await.map_err(|e| send_error(self, &e))?;
        ensure_success(self, response).await
    }
}

// -- Gemini --

/// The Gemini `generateContent` dialect
///
/// The model and the streaming choice travel in the endpoint path; the API
/// key travels as a query parameter.
#[derive(Debug)]
pub struct GeminiDialect;

impl GeminiDialect {
    fn generate_url(client: &ProviderClient, model: &str) -> String {
        let mut url = format!("{}/models/{model}:generateContent", client.base());
        if let Some(key) = client.key() {
            use std::fmt::Write;
            let _ = write!(url, "?key={key}");
        }
        url
    }

    fn stream_url(client: &ProviderClient, model: &str) -> String {
        let mut url = format!("{}/models/{model}:streamGenerateContent?alt=sse", client.base());
        if let Some(key) = client.key() {
            use std::fmt::Write;
            let _ = write!(url, "&key={key}");
        }
        url
    }
}

#[async_trait]
impl ProviderDialect for GeminiDialect {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn request_adapter(&self, body: &[u8]) -> Result<Box<dyn RequestAdapter>, GatewayError> {
        Ok(Box::new(GeminiRequestAdapter::parse(body)?))
    }

    fn response_adapter(&self, raw: Value) -> Result<Box<dyn ResponseAdapter>, GatewayError> {
        Ok(Box::new(GeminiResponseAdapter::parse(raw)?))
    }

    fn stream_adapter(&self) -> Box<dyn StreamAdapter> {
        Box::new(GeminiStreamAdapter::new())
    }

    fn default_base_url(&self) -> Url {
        Url::parse("https://generativelanguage.googleapis.com/v1beta").expect("valid default URL")
    }

    fn api_key_from_headers(&self, headers: &HeaderMap) -> Option<SecretString> {
        header_key(headers, "x-goog-api-key")
    }

    async fn execute(&self, client: &ProviderClient, model: &str, body: &Value) -> Result<Value, GatewayError> {
        let url = Self::generate_url(client, model);
        let response = client
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| send_error(self, &e))?;
        let response = ensure_success(self, response).await?;
        response
            .json()
            .await
            .map_err(|e| GatewayError::Upstream(format!("failed to parse provider response: {e}")))
    }

    async fn execute_stream(
        &self,
        client: &ProviderClient,
        model: &str,
        body: &Value,
    ) -> Result<reqwest::Response, GatewayError> {
        let url = Self::stream_url(client, model);
        let response = client
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| send_error(self, &e))?;
        ensure_success(self, response).await
    }
}

// -- OpenAI-compatible dialects --

/// DeepSeek: the `OpenAI` wire format at a different endpoint
#[derive(Debug)]
pub struct DeepSeekDialect {
    inner: OpenAiDialect,
}

impl DeepSeekDialect {
    pub const fn new() -> Self {
        Self { inner: OpenAiDialect }
    }
}

impl Default for DeepSeekDialect {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderDialect for DeepSeekDialect {
    fn id(&self) -> ProviderId {
        ProviderId::DeepSeek
    }

    fn request_adapter(&self, body: &[u8]) -> Result<Box<dyn RequestAdapter>, GatewayError> {
        self.inner.request_adapter(body)
    }

    fn response_adapter(&self, raw: Value) -> Result<Box<dyn ResponseAdapter>, GatewayError> {
        self.inner.response_adapter(raw)
    }

    fn stream_adapter(&self) -> Box<dyn StreamAdapter> {
        self.inner.stream_adapter()
    }

    fn default_base_url(&self) -> Url {
        Url::parse("https://api.deepseek.com/v1").expect("valid default URL")
    }

    fn api_key_from_headers(&self, headers: &HeaderMap) -> Option<SecretString> {
        self.inner.api_key_from_headers(headers)
    }

    async fn execute(&self, client: &ProviderClient, model: &str, body: &Value) -> Result<Value, GatewayError> {
        self.inner.execute(client, model, body).await
    }

    async fn execute_stream(
        &self,
        client: &ProviderClient,
        model: &str,
        body: &Value,
    ) -> Result<reqwest::Response, GatewayError> {
        self.inner.execute_stream(client, model, body).await
    }
}

/// Ollama: the `OpenAI` wire format on a local daemon, no credentials
#[derive(Debug)]
pub struct OllamaDialect {
    inner: OpenAiDialect,
}

impl OllamaDialect {
    pub const fn new() -> Self {
        Self { inner: OpenAiDialect }
    }
}

impl Default for OllamaDialect {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderDialect for OllamaDialect {
    fn id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    fn request_adapter(&self, body: &[u8]) -> Result<Box<dyn RequestAdapter>, GatewayError> {
        self.inner.request_adapter(body)
    }

    fn response_adapter(&self, raw: Value) -> Result<Box<dyn ResponseAdapter>, GatewayError> {
        self.inner.response_adapter(raw)
    }

    fn stream_adapter(&self) -> Box<dyn StreamAdapter> {
        self.inner.stream_adapter()
    }

    fn default_base_url(&self) -> Url {
        Url::parse("http://localhost:11434/v1").expect("valid default URL")
    }

    fn requires_api_key(&self) -> bool {
        false
    }

    fn api_key_from_headers(&self, headers: &HeaderMap) -> Option<SecretString> {
        self.inner.api_key_from_headers(headers)
    }

    async fn execute(&self, client: &ProviderClient, model: &str, body: &Value) -> Result<Value, GatewayError> {
        self.inner.execute(client, model, body).await
    }

    async fn execute_stream(
        &self,
        client: &ProviderClient,
        model: &str,
        body: &Value,
    ) -> Result<reqwest::Response, GatewayError> {
        self.inner.execute_stream(client, model, body).await
    }
}
