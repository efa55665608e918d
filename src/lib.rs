//! # meetg - Telegram bot framework
//!
//! meetg wraps the Telegram Bot API for bots that must keep working on an
//! unreliable network. Its core is a retrying caller: every outbound call is
//! validated against the operation's parameter list, then attempted under a
//! bounded budget. Failures are classified, and each class decides how much
//! budget it costs, how long to wait and whether the call counts as done.
//!
//! ## Quick Start
//!
//! ```no_run
//! use meetg::{api::SendOptions, Bot, Settings};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), meetg::Error> {
//!     let settings = Settings::from_env()?;
//!     let _guard = meetg::logging::init(&settings)?;
//!
//!     let bot = Bot::builder().settings(settings).build().await?;
//!
//!     let outcome = bot.api().send_message(12345, "Hello", &SendOptions::default()).await;
//!     if !outcome.succeeded {
//!         eprintln!("Not sent: {}", outcome.response);
//!     }
//!
//!     bot.run(CancellationToken::new()).await
//! }
//! ```
//!
//! ## Failure handling
//!
//! | Failure | Budget cost | Wait | Outcome |
//! |---|---|---|---|
//! | message not modified | all | none | success |
//! | can't parse entities / message to forward not found | all | none | failure |
//! | other network error | 1 | network wait | retry |
//! | timed out | 1 | none | retry |
//! | flood control, retry after D | 2 | D + 1 s | retry |
//! | chat migrated to N | 1 | none | retry with `chat_id = N` |
//! | bot kicked or blocked | all | none | failure |
//! | other unauthorized / bad request | 2 | none | retry |
//!
//! Callers never see transport errors: they get a [`CallOutcome`] with
//! `succeeded` and the API result or the last error message.
//!
//! ## Testing bots
//!
//! With [`Settings::for_tests`] the bot runs on [`testing::MockTransport`]
//! and in-memory storage, and [`Bot::receive_message`] feeds it simulated
//! updates built by the [`factories`].

pub mod api;
pub mod bot;
mod caller;
pub mod config;
pub mod entities;
mod error;
pub mod factories;
pub mod logging;
pub mod method;
pub mod models;
pub mod rate_limit;
mod response;
pub mod retry;
pub mod stats;
pub mod storage;
pub mod testing;
pub mod transport;
pub mod types;
pub mod utils;

pub use api::Api;
pub use bot::{Bot, BotBuilder, Handler};
pub use caller::{Caller, CallerBuilder};
pub use config::Settings;
pub use error::{ApiError, Error, Result};
pub use method::{Arguments, Method};
pub use models::Database;
pub use response::CallOutcome;
pub use retry::{ErrorKind, RetryConfig};
pub use transport::{HttpTransport, Transport};
