//! The uniform result of a retried API call.

use crate::retry::{ErrorKind, UnauthorizedReason};
use serde_json::Value;
use std::time::Duration;

/// What a caller gets back from [`Caller::call`](crate::Caller::call).
///
/// Failures never surface as Rust errors: `succeeded` tells whether the
/// operation went through, and `response` holds either the API result or the
/// most recent error message.
///
/// # Examples
///
/// ```
/// use meetg::CallOutcome;
/// use serde_json::json;
/// use std::time::Duration;
///
/// let outcome = CallOutcome::new(true, json!({"message_id": 1}), 2, Duration::from_secs(2), None);
/// assert!(outcome.was_retried());
///
/// let (succeeded, response): (bool, serde_json::Value) = outcome.into();
/// assert!(succeeded);
/// assert_eq!(response["message_id"], 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    /// Whether the operation went through.
    pub succeeded: bool,

    /// The API result on success, otherwise the last error message.
    pub response: Value,

    /// The number of transport invocations made.
    pub attempts: usize,

    /// Total time spent in the call, waits included.
    pub latency: Duration,

    /// Classification of the last failed attempt, if there was one.
    pub error_kind: Option<ErrorKind>,
}

impl CallOutcome {
    /// Creates a new `CallOutcome`.
    pub fn new(
        succeeded: bool,
        response: Value,
        attempts: usize,
        latency: Duration,
        error_kind: Option<ErrorKind>,
    ) -> Self {
        Self {
            succeeded,
            response,
            attempts,
            latency,
            error_kind,
        }
    }

    /// Returns `true` if more than one attempt was needed.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns `true` if the call failed because the bot was removed from the chat.
    pub fn bot_removed(&self) -> bool {
        !self.succeeded
            && self.error_kind == Some(ErrorKind::Unauthorized(UnauthorizedReason::BotRemoved))
    }

    /// Returns the response as text when it is a string (error messages always are).
    pub fn response_text(&self) -> Option<&str> {
        self.response.as_str()
    }
}

impl From<CallOutcome> for (bool, Value) {
    fn from(outcome: CallOutcome) -> Self {
        (outcome.succeeded, outcome.response)
    }
}
