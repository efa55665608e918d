//! The boundary between the retry loop and the Bot API.
//!
//! [`Transport`] performs exactly one request per invocation and reports the
//! failure as an [`ApiError`]. [`HttpTransport`] talks to the real Bot API over
//! HTTPS; [`MockTransport`](crate::testing::MockTransport) stands in for it in tests.

use crate::{
    method::{endpoint_name, Arguments},
    rate_limit::ResponseParameters,
    ApiError, Error, Result,
};
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Default Bot API server.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Executes single Bot API requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Invokes the operation `method` (snake-case name) with `args`.
    async fn invoke(&self, method: &str, args: &Arguments) -> std::result::Result<Value, ApiError>;
}

/// A transport that sends JSON requests to `{api_url}/bot{token}/{endpoint}`.
///
/// # Examples
///
/// ```no_run
/// use meetg::HttpTransport;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), meetg::Error> {
/// let transport = HttpTransport::builder()
///     .token("123456:ABC")
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: Url,
    token: String,
    timeout: Option<Duration>,
}

/// The envelope every Bot API response comes in.
#[derive(Debug, Deserialize)]
struct Reply {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

impl HttpTransport {
    /// Creates a new `HttpTransportBuilder`.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::new()
    }

    fn endpoint(&self, method: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!("/bot{}/{}", self.token, endpoint_name(method)));
        url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn invoke(&self, method: &str, args: &Arguments) -> std::result::Result<Value, ApiError> {
        let body: Arguments = args
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        tracing::debug!(method = method, "Executing Bot API request");

        let mut request = self.http_client.post(self.endpoint(method)).json(&body);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(request_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let raw_body = response.text().await.map_err(request_error)?;

        parse_reply(status, &headers, &raw_body)
    }
}

fn request_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::TimedOut
    } else {
        ApiError::Network(error.to_string())
    }
}

/// Turns a raw Bot API response into the call result.
fn parse_reply(
    status: StatusCode,
    headers: &HeaderMap,
    raw_body: &str,
) -> std::result::Result<Value, ApiError> {
    let reply: Reply = match serde_json::from_str(raw_body) {
        Ok(reply) => reply,
        Err(_) if status == StatusCode::BAD_GATEWAY => {
            return Err(ApiError::Network("Bad Gateway".to_string()))
        }
        Err(e) => {
            tracing::error!(status = status.as_u16(), raw_response = %raw_body, "Invalid server response");
            return Err(ApiError::Network(format!(
                "Invalid server response ({}): {}",
                status.as_u16(),
                e
            )));
        }
    };

    if reply.ok {
        return Ok(reply.result.unwrap_or(Value::Bool(true)));
    }

    let description = strip_prefix(reply.description.as_deref().unwrap_or("Unknown HTTPError"));
    let parameters = reply.parameters.unwrap_or_default();

    if let Some(new_chat_id) = parameters.migrate_to_chat_id {
        return Err(ApiError::ChatMigrated { new_chat_id });
    }
    if let Some(retry_after) = parameters.retry_after(headers) {
        return Err(ApiError::RetryAfter { retry_after });
    }

    let code = reply.error_code.unwrap_or_else(|| status.as_u16());
    Err(match code {
        401 | 403 => ApiError::Unauthorized(description),
        400 => ApiError::BadRequest(description),
        404 => ApiError::InvalidToken,
        409 => ApiError::Conflict(description),
        502 => ApiError::Network("Bad Gateway".to_string()),
        _ => ApiError::Network(format!("{description} ({code})")),
    })
}

/// Drops the server's error prefix and capitalizes what is left, so
/// `Bad Request: can't parse entities` reads `Can't parse entities`.
fn strip_prefix(description: &str) -> String {
    let Some(rest) = ["Error: ", "[Error]: ", "Bad Request: "]
        .iter()
        .find_map(|prefix| description.strip_prefix(prefix))
    else {
        return description.to_string();
    };

    let mut chars = rest.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Builder for [`HttpTransport`].
pub struct HttpTransportBuilder {
    api_url: String,
    token: Option<String>,
    timeout: Option<Duration>,
}

impl HttpTransportBuilder {
    /// Creates a builder pointing at the public Bot API.
    pub fn new() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout: None,
        }
    }

    /// Sets the Bot API server, e.g. a local `telegram-bot-api` instance.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Sets the bot token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is missing or the API URL is invalid.
    pub fn build(self) -> Result<HttpTransport> {
        let token = self
            .token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| Error::ConfigurationError("Bot token is required".to_string()))?;
        let base_url = Url::parse(&self.api_url)?;

        let http_client = reqwest::Client::builder().build()?;

        Ok(HttpTransport {
            http_client,
            base_url,
            token,
            timeout: self.timeout,
        })
    }
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
