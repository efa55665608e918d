//! The retrying Bot API caller.
//!
//! [`Caller`] is the entry point for outbound API calls. It validates the
//! arguments against the operation, then drives the bounded retry loop: each
//! failure is classified, charged against the attempt budget, optionally
//! rewrites the target chat, and may wait before the next attempt.

use crate::{
    method::{Arguments, Method},
    retry::{ErrorKind, PermanentReason, RetryConfig, UnauthorizedReason},
    transport::Transport,
    ApiError, CallOutcome, Error, Result,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;

/// A Bot API caller with bounded retries.
///
/// The caller is cheap to clone and meant to be shared by everything that
/// talks to the API.
///
/// # Examples
///
/// ```
/// use meetg::{method::SEND_MESSAGE, Caller, RetryConfig};
/// use meetg::testing::MockTransport;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), meetg::Error> {
/// let caller = Caller::builder()
///     .transport(Arc::new(MockTransport::new()))
///     .retry_config(RetryConfig::default())
///     .build()?;
///
/// let mut args = meetg::Arguments::new();
/// args.insert("chat_id".into(), json!(1));
/// args.insert("text".into(), json!("Hello"));
///
/// let outcome = caller.call(&SEND_MESSAGE, &args).await;
/// assert!(outcome.succeeded);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Caller {
    inner: Arc<CallerInner>,
}

struct CallerInner {
    transport: Arc<dyn Transport>,
    retry_config: RetryConfig,
}

impl Caller {
    /// Creates a new `CallerBuilder`.
    pub fn builder() -> CallerBuilder {
        CallerBuilder::new()
    }

    /// Returns the retry settings in use.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.inner.retry_config
    }

    /// Validates `args` for `method` and performs the call with retries.
    pub async fn call(&self, method: &Method, args: &Arguments) -> CallOutcome {
        let args = method.validate(args);
        self.call_validated(method, args).await
    }

    /// Performs the call with retries, trusting `args` to be valid for `method`.
    pub async fn call_validated(&self, method: &Method, mut args: Arguments) -> CallOutcome {
        let start_time = Instant::now();
        let mut remaining = self.inner.retry_config.max_attempts;
        let mut attempts = 0;
        let mut succeeded = false;
        let mut response = Value::Null;
        let mut last_kind = None;

        while remaining > 0 {
            attempts += 1;

            match self.inner.transport.invoke(method.name, &args).await {
                Ok(result) => {
                    response = result;
                    succeeded = true;
                    last_kind = None;
                    remaining = 0;
                }
                Err(error) => {
                    let kind = ErrorKind::classify(&error);
                    let policy = kind.policy(&self.inner.retry_config);
                    log_failure(method, &error, &kind, attempts);

                    if let ErrorKind::ChatMigrated { new_chat_id } = kind {
                        args.insert("chat_id".to_string(), Value::from(new_chat_id));
                    }

                    remaining = policy.cost.apply(remaining);
                    succeeded = policy.succeeded;
                    response = Value::String(error.message());
                    last_kind = Some(kind);

                    // No wait when the budget is spent: nothing would follow it.
                    if remaining > 0 && !policy.wait.is_zero() {
                        tokio::time::sleep(policy.wait).await;
                    }
                }
            }
        }

        let latency = start_time.elapsed();
        tracing::debug!(
            method = method.name,
            attempts = attempts,
            latency_ms = latency.as_millis(),
            terminal = last_kind.as_ref().is_some_and(ErrorKind::is_terminal),
            "{}",
            if succeeded { "Success" } else { "Fail" }
        );

        CallOutcome::new(succeeded, response, attempts, latency, last_kind)
    }
}

fn log_failure(method: &Method, error: &ApiError, kind: &ErrorKind, attempt: usize) {
    let name = method.name;
    match kind {
        ErrorKind::NotModified => tracing::error!(
            method = name, attempt, error = %error,
            "Network error. It's ok, nothing to do here"
        ),
        ErrorKind::NetworkPermanent(PermanentReason::UnparsableEntities)
        | ErrorKind::NetworkPermanent(PermanentReason::ForwardTargetMissing) => tracing::error!(
            method = name, attempt, error = %error,
            "Network error. Retrying is pointless"
        ),
        ErrorKind::NetworkTransient => tracing::error!(
            method = name, attempt, error = %error,
            "Network error. Waiting then retry"
        ),
        ErrorKind::Timeout => tracing::error!(method = name, attempt, "Timed out. Retrying"),
        ErrorKind::RateLimited { retry_after } => tracing::error!(
            method = name, attempt, retry_after_secs = retry_after.as_secs(),
            "It is asked to retry after a delay. Doing"
        ),
        ErrorKind::ChatMigrated { new_chat_id } => tracing::error!(
            method = name, attempt, new_chat_id, error = %error,
            "Chat migrated. Retrying with new chat id"
        ),
        ErrorKind::Unauthorized(UnauthorizedReason::BotRemoved) => tracing::error!(
            method = name, attempt, error = %error,
            "Bot was removed from the chat"
        ),
        ErrorKind::Unauthorized(UnauthorizedReason::Other) | ErrorKind::BadRequest => {
            tracing::error!(method = name, attempt, error = %error, "Request rejected. Retrying")
        }
    }
}

/// Builder for configuring and creating a [`Caller`].
pub struct CallerBuilder {
    transport: Option<Arc<dyn Transport>>,
    retry_config: RetryConfig,
}

impl CallerBuilder {
    /// Creates a builder with the default retry settings.
    pub fn new() -> Self {
        Self {
            transport: None,
            retry_config: RetryConfig::default(),
        }
    }

    /// Sets the transport the caller invokes.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the retry settings.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Builds the configured `Caller`.
    ///
    /// # Errors
    ///
    /// Returns an error if no transport was provided.
    pub fn build(self) -> Result<Caller> {
        let transport = self
            .transport
            .ok_or_else(|| Error::ConfigurationError("Transport is required".to_string()))?;

        Ok(Caller {
            inner: Arc::new(CallerInner {
                transport,
                retry_config: self.retry_config,
            }),
        })
    }
}

impl Default for CallerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
