//! Test doubles for running bots without the network.

use crate::{method::Arguments, transport::Transport, ApiError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Mutex, PoisonError};

/// Username the mock reports from `get_me`.
pub const MOCK_USERNAME: &str = "mock_username";

/// One recorded transport invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Operation name.
    pub method: String,
    /// Arguments exactly as the transport received them.
    pub args: Arguments,
}

#[derive(Debug)]
enum Raise {
    Once(ApiError),
    Always(ApiError),
}

/// A deterministic [`Transport`] for tests.
///
/// Every call succeeds with a fixed stand-in value (`true`) unless an error
/// was configured. `get_me` answers with a bot user named [`MOCK_USERNAME`]
/// and `get_updates` with whatever was queued by [`MockTransport::push_update`],
/// or an empty list. All invocations are recorded.
///
/// # Examples
///
/// ```
/// use meetg::testing::MockTransport;
/// use meetg::ApiError;
///
/// let transport = MockTransport::new().raise_once(ApiError::TimedOut);
/// assert_eq!(transport.invocation_count(), 0);
/// ```
#[derive(Debug)]
pub struct MockTransport {
    stand_in: Value,
    raise: Mutex<Option<Raise>>,
    updates: Mutex<Vec<Value>>,
    invocations: Mutex<Vec<Invocation>>,
}

impl MockTransport {
    /// Creates a transport on which every call succeeds.
    pub fn new() -> Self {
        Self {
            stand_in: Value::Bool(true),
            raise: Mutex::new(None),
            updates: Mutex::new(Vec::new()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Fails the first invocation with `error`, then behaves as success.
    pub fn raise_once(self, error: ApiError) -> Self {
        self.set_raise(Raise::Once(error));
        self
    }

    /// Fails every invocation with `error`.
    pub fn raise_always(self, error: ApiError) -> Self {
        self.set_raise(Raise::Always(error));
        self
    }

    /// Replaces the value successful calls return.
    pub fn with_stand_in(mut self, value: Value) -> Self {
        self.stand_in = value;
        self
    }

    /// Queues a raw update for the next `get_updates` call.
    pub fn push_update(&self, update: Value) {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(update);
    }

    /// Returns every invocation made so far.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of invocations made so far.
    pub fn invocation_count(&self) -> usize {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn set_raise(&self, raise: Raise) {
        *self.raise.lock().unwrap_or_else(PoisonError::into_inner) = Some(raise);
    }

    fn next_error(&self) -> Option<ApiError> {
        let mut raise = self.raise.lock().unwrap_or_else(PoisonError::into_inner);
        match raise.take() {
            Some(Raise::Once(error)) => Some(error),
            Some(Raise::Always(error)) => {
                *raise = Some(Raise::Always(error.clone()));
                Some(error)
            }
            None => None,
        }
    }

    fn success_value(&self, method: &str) -> Value {
        match method {
            "get_me" => json!({
                "id": 1,
                "is_bot": true,
                "first_name": "Mock",
                "username": MOCK_USERNAME,
            }),
            "get_updates" => Value::Array(std::mem::take(
                &mut *self.updates.lock().unwrap_or_else(PoisonError::into_inner),
            )),
            _ => self.stand_in.clone(),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn invoke(&self, method: &str, args: &Arguments) -> Result<Value, ApiError> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Invocation {
                method: method.to_string(),
                args: args.clone(),
            });

        match self.next_error() {
            Some(error) => Err(error),
            None => Ok(self.success_value(method)),
        }
    }
}
