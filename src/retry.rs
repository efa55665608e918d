//! Error classification and retry policy for Bot API calls.
//!
//! Every failed attempt is mapped to exactly one [`ErrorKind`]. The kind decides
//! how much of the attempt budget the failure costs, how long to wait before the
//! next attempt, and whether the call is finished (successfully or not).

use crate::ApiError;
use std::time::Duration;

const NOT_MODIFIED: &str = "are exactly the same as";
const CANT_PARSE_ENTITIES: &str = "Can't parse entities";
const FORWARD_NOT_FOUND: &str = "Message to forward not found";
const BOT_KICKED: &str = "bot was kicked";
const BOT_BLOCKED: &str = "bot was blocked by the user";

/// Budget and wait settings for the retry loop.
///
/// # Examples
///
/// ```
/// use meetg::RetryConfig;
/// use std::time::Duration;
///
/// let config = RetryConfig::default();
/// assert_eq!(config.max_attempts, 5);
/// assert_eq!(config.network_error_wait, Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Initial attempt budget for one call.
    pub max_attempts: u32,

    /// How long to wait after a generic network error.
    pub network_error_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            network_error_wait: Duration::from_secs(2),
        }
    }
}

impl RetryConfig {
    /// Creates a config with the given budget and network wait.
    pub fn new(max_attempts: u32, network_error_wait: Duration) -> Self {
        Self {
            max_attempts,
            network_error_wait,
        }
    }
}

/// Why a network-class error is not worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermanentReason {
    /// The text markup could not be parsed by the server.
    UnparsableEntities,
    /// The message to forward no longer exists.
    ForwardTargetMissing,
}

/// Flavours of authorization failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedReason {
    /// The bot was removed from (or blocked in) the chat.
    BotRemoved,
    /// Any other authorization failure.
    Other,
}

/// Classification of one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An edit with unchanged content. The desired state is already in place.
    NotModified,
    /// A network-class error that will fail the same way again.
    NetworkPermanent(PermanentReason),
    /// Any other network error.
    NetworkTransient,
    /// The request timed out.
    Timeout,
    /// The server asked to back off.
    RateLimited {
        /// Requested backoff.
        retry_after: Duration,
    },
    /// The chat has a new identifier.
    ChatMigrated {
        /// Identifier to retry with.
        new_chat_id: i64,
    },
    /// The bot is not authorized for the request.
    Unauthorized(UnauthorizedReason),
    /// Any other malformed request.
    BadRequest,
}

/// How many budget units a failure consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cost {
    /// Subtract this many units.
    Units(u32),
    /// Force the budget to zero.
    All,
}

impl Cost {
    /// Applies the cost to a remaining budget.
    pub fn apply(self, remaining: u32) -> u32 {
        match self {
            Cost::Units(units) => remaining.saturating_sub(units),
            Cost::All => 0,
        }
    }
}

/// What the retry loop does after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Budget consumed by the failure.
    pub cost: Cost,
    /// Wait before the next attempt, if one follows.
    pub wait: Duration,
    /// Whether the call counts as succeeded despite the error.
    pub succeeded: bool,
}

impl ErrorKind {
    /// Maps a transport error to its kind.
    ///
    /// Message checks run first, then timeout, rate limit, migration, and
    /// finally the authorization class. The message checks apply to
    /// bad-request errors as well, since the Bot API reports unchanged edits,
    /// broken markup and missing forward targets as HTTP 400.
    ///
    /// # Examples
    ///
    /// ```
    /// use meetg::{ApiError, ErrorKind};
    /// use meetg::retry::PermanentReason;
    ///
    /// let err = ApiError::BadRequest("Can't parse entities: Unsupported start tag".into());
    /// assert_eq!(
    ///     ErrorKind::classify(&err),
    ///     ErrorKind::NetworkPermanent(PermanentReason::UnparsableEntities)
    /// );
    /// ```
    pub fn classify(error: &ApiError) -> Self {
        match error {
            ApiError::Network(message) => {
                classify_message(message).unwrap_or(ErrorKind::NetworkTransient)
            }
            ApiError::TimedOut => ErrorKind::Timeout,
            ApiError::RetryAfter { retry_after } => ErrorKind::RateLimited {
                retry_after: *retry_after,
            },
            ApiError::ChatMigrated { new_chat_id } => ErrorKind::ChatMigrated {
                new_chat_id: *new_chat_id,
            },
            ApiError::Unauthorized(message) => {
                if message.contains(BOT_KICKED) || message.contains(BOT_BLOCKED) {
                    ErrorKind::Unauthorized(UnauthorizedReason::BotRemoved)
                } else {
                    ErrorKind::Unauthorized(UnauthorizedReason::Other)
                }
            }
            ApiError::InvalidToken => ErrorKind::Unauthorized(UnauthorizedReason::Other),
            ApiError::BadRequest(message) | ApiError::Conflict(message) => {
                classify_message(message).unwrap_or(ErrorKind::BadRequest)
            }
        }
    }

    /// Returns the retry policy for this kind.
    pub fn policy(&self, config: &RetryConfig) -> Policy {
        let (cost, wait, succeeded) = match self {
            ErrorKind::NotModified => (Cost::All, Duration::ZERO, true),
            ErrorKind::NetworkPermanent(_) => (Cost::All, Duration::ZERO, false),
            ErrorKind::NetworkTransient => (Cost::Units(1), config.network_error_wait, false),
            ErrorKind::Timeout => (Cost::Units(1), Duration::ZERO, false),
            ErrorKind::RateLimited { retry_after } => {
                (Cost::Units(2), *retry_after + Duration::from_secs(1), false)
            }
            ErrorKind::ChatMigrated { .. } => (Cost::Units(1), Duration::ZERO, false),
            ErrorKind::Unauthorized(UnauthorizedReason::BotRemoved) => {
                (Cost::All, Duration::ZERO, false)
            }
            ErrorKind::Unauthorized(UnauthorizedReason::Other) | ErrorKind::BadRequest => {
                (Cost::Units(2), Duration::ZERO, false)
            }
        };
        Policy {
            cost,
            wait,
            succeeded,
        }
    }

    /// Returns `true` if no further attempt can change the result.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ErrorKind::NotModified
                | ErrorKind::NetworkPermanent(_)
                | ErrorKind::Unauthorized(UnauthorizedReason::BotRemoved)
        )
    }
}

fn classify_message(message: &str) -> Option<ErrorKind> {
    if message.contains(NOT_MODIFIED) {
        Some(ErrorKind::NotModified)
    } else if message.contains(CANT_PARSE_ENTITIES) {
        Some(ErrorKind::NetworkPermanent(
            PermanentReason::UnparsableEntities,
        ))
    } else if message.contains(FORWARD_NOT_FOUND) {
        Some(ErrorKind::NetworkPermanent(
            PermanentReason::ForwardTargetMissing,
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_network_messages() {
        let not_modified = ApiError::BadRequest(
            "Message is not modified: specified new message content and reply markup are \
             exactly the same as a current content and reply markup of the message"
                .into(),
        );
        assert_eq!(ErrorKind::classify(&not_modified), ErrorKind::NotModified);

        let forward = ApiError::Network("Message to forward not found".into());
        assert_eq!(
            ErrorKind::classify(&forward),
            ErrorKind::NetworkPermanent(PermanentReason::ForwardTargetMissing)
        );

        let generic = ApiError::Network("Connection reset by peer".into());
        assert_eq!(ErrorKind::classify(&generic), ErrorKind::NetworkTransient);
    }

    #[test]
    fn test_classify_unauthorized() {
        let kicked = ApiError::Unauthorized("Forbidden: bot was kicked from the group chat".into());
        assert_eq!(
            ErrorKind::classify(&kicked),
            ErrorKind::Unauthorized(UnauthorizedReason::BotRemoved)
        );

        let other = ApiError::Unauthorized("Forbidden: bot can't initiate conversation".into());
        assert_eq!(
            ErrorKind::classify(&other),
            ErrorKind::Unauthorized(UnauthorizedReason::Other)
        );
        assert_eq!(
            ErrorKind::classify(&ApiError::InvalidToken),
            ErrorKind::Unauthorized(UnauthorizedReason::Other)
        );
    }

    #[test]
    fn test_policy_table() {
        let config = RetryConfig::default();

        let policy = ErrorKind::NetworkTransient.policy(&config);
        assert_eq!(policy.cost, Cost::Units(1));
        assert_eq!(policy.wait, Duration::from_secs(2));

        let policy = ErrorKind::Timeout.policy(&config);
        assert_eq!(policy.cost, Cost::Units(1));
        assert_eq!(policy.wait, Duration::ZERO);

        let policy = ErrorKind::RateLimited {
            retry_after: Duration::from_secs(3),
        }
        .policy(&config);
        assert_eq!(policy.cost, Cost::Units(2));
        assert_eq!(policy.wait, Duration::from_secs(4));

        let policy = ErrorKind::NotModified.policy(&config);
        assert_eq!(policy.cost, Cost::All);
        assert!(policy.succeeded);

        let policy = ErrorKind::BadRequest.policy(&config);
        assert_eq!(policy.cost, Cost::Units(2));
        assert!(!policy.succeeded);
    }

    #[test]
    fn test_cost_apply() {
        assert_eq!(Cost::Units(1).apply(5), 4);
        assert_eq!(Cost::Units(2).apply(1), 0);
        assert_eq!(Cost::All.apply(100), 0);
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(ErrorKind::NotModified.is_terminal());
        assert!(ErrorKind::Unauthorized(UnauthorizedReason::BotRemoved).is_terminal());
        assert!(!ErrorKind::ChatMigrated { new_chat_id: 1 }.is_terminal());

        let config = RetryConfig::default();
        for kind in [
            ErrorKind::NotModified,
            ErrorKind::NetworkPermanent(PermanentReason::ForwardTargetMissing),
            ErrorKind::NetworkTransient,
            ErrorKind::Timeout,
            ErrorKind::RateLimited {
                retry_after: Duration::from_secs(1),
            },
            ErrorKind::Unauthorized(UnauthorizedReason::Other),
            ErrorKind::BadRequest,
        ] {
            assert_eq!(kind.is_terminal(), kind.policy(&config).cost == Cost::All);
        }
    }
}
