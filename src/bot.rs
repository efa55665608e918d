//! The bot: update processing, broadcasting and the polling loop.

use crate::{
    api::{Api, SendOptions},
    config::Settings,
    factories::{MessageKind, MessageParams, MessageUpdateFactory},
    models::Database,
    stats::{self, StatsCache},
    testing::MockTransport,
    transport::{HttpTransport, Transport},
    types::Update,
    CallOutcome, Caller, Error, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Reacts to incoming updates.
///
/// For every update the bot runs the first handler whose `check` returns `true`.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Returns `true` if this handler wants `update`.
    fn check(&self, update: &Update) -> bool;

    /// Reacts to `update`, returning the outcome of the reply if one was sent.
    async fn handle(&self, bot: &Bot, update: &Update) -> Option<CallOutcome>;
}

/// A Telegram bot.
///
/// # Examples
///
/// ```
/// use meetg::{Bot, Settings};
///
/// # async fn example() -> Result<(), meetg::Error> {
/// let bot = Bot::builder().settings(Settings::for_tests()).build().await?;
/// assert_eq!(bot.username(), "mock_username");
/// # Ok(())
/// # }
/// ```
pub struct Bot {
    api: Api,
    db: Arc<Database>,
    stats: Arc<Mutex<StatsCache>>,
    handlers: Vec<Arc<dyn Handler>>,
    username: String,
    settings: Settings,
}

impl Bot {
    /// Creates a new `BotBuilder`.
    pub fn builder() -> BotBuilder {
        BotBuilder::new()
    }

    /// Typed Bot API calls.
    pub fn api(&self) -> &Api {
        &self.api
    }

    /// Stored updates, messages, users and chats.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Update counters and job timings for the daily report.
    pub fn stats(&self) -> &Arc<Mutex<StatsCache>> {
        &self.stats
    }

    /// The bot's username as reported by `get_me`.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The settings the bot was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Saves the update, counts it and runs the first matching handler.
    pub async fn process_update(&self, update: &Update) -> Result<Option<CallOutcome>> {
        self.db.save_update(update).await?;

        if let Some(update_type) = update.update_type() {
            self.stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record_update(update_type);
        }

        for handler in &self.handlers {
            if handler.check(update) {
                return Ok(handler.handle(self, update).await);
            }
        }
        Ok(None)
    }

    /// Simulates receiving a message with `text`, for tests.
    pub async fn receive_message(
        &self,
        text: &str,
        params: MessageParams,
    ) -> Result<Option<CallOutcome>> {
        let update = MessageUpdateFactory::new(MessageKind::Message).create(MessageParams {
            text: Some(text.to_string()),
            ..params
        });
        self.process_update(&update).await
    }

    /// Sends `text` to each chat in turn.
    pub async fn send_messages(
        &self,
        chat_ids: &[i64],
        text: &str,
        options: &SendOptions,
    ) -> Vec<CallOutcome> {
        let mut outcomes = Vec::with_capacity(chat_ids.len());
        for &chat_id in chat_ids {
            outcomes.push(self.api.send_message(chat_id, text, options).await);
        }
        let preview: String = text.chars().take(79).collect();
        tracing::info!(chats = chat_ids.len(), text = ?preview, "Broadcasted message");
        outcomes
    }

    /// Report lines for the last 24 hours: updates, stored records and jobs.
    pub async fn reports(&self) -> Result<Vec<String>> {
        let update_reports = self
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update_reports();
        let model_reports = self.db.day_reports().await?;
        let job_reports = self
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .job_reports();

        Ok(update_reports
            .into_iter()
            .chain(model_reports)
            .chain(job_reports)
            .collect())
    }

    /// Sends the daily report to the configured stats chats.
    pub async fn report_stats(&self) -> Result<()> {
        if self.settings.stats_to.is_empty() {
            return Ok(());
        }
        let reports = self.reports().await?;
        let text = format!(
            "@{} for the last 24 hours:\n- {}",
            self.username,
            reports.join("\n- ")
        );
        self.send_messages(&self.settings.stats_to, &text, &SendOptions::default())
            .await;
        Ok(())
    }

    /// Polls updates and runs the daily stats job until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        tracing::info!(username = %self.username, "Started");
        let mut offset = None;
        let mut next_report = Instant::now() + duration_until_midnight_utc(Utc::now());

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                _ = tokio::time::sleep_until(next_report) => {
                    if let Err(e) = stats::timed(&self.stats, "report_stats", self.report_stats()).await {
                        tracing::error!(error = %e, "Stats report failed");
                    }
                    next_report = Instant::now() + duration_until_midnight_utc(Utc::now());
                }

                outcome = self.api.get_updates(offset, self.settings.poll_timeout) => {
                    if outcome.succeeded {
                        offset = self.process_polled(outcome, offset).await;
                    } else {
                        tracing::warn!(response = %outcome.response, "Polling failed");
                        tokio::time::sleep(self.settings.network_error_wait).await;
                    }
                }
            }
            tokio::task::yield_now().await;
        }

        tracing::info!(username = %self.username, "Stopped");
        Ok(())
    }

    async fn process_polled(&self, outcome: CallOutcome, offset: Option<i64>) -> Option<i64> {
        let updates: Vec<Update> = match serde_json::from_value(outcome.response) {
            Ok(updates) => updates,
            Err(e) => {
                tracing::error!(error = %e, "Could not parse updates");
                return offset;
            }
        };

        let mut offset = offset;
        for update in updates {
            offset = Some(update.update_id + 1);
            if let Err(e) = self.process_update(&update).await {
                tracing::error!(update_id = update.update_id, error = %e, "Update processing failed");
            }
        }
        offset
    }
}

/// Time left until the next 00:00 UTC.
pub fn duration_until_midnight_utc(now: DateTime<Utc>) -> Duration {
    now.date_naive()
        .succ_opt()
        .map(|tomorrow| tomorrow.and_time(NaiveTime::MIN).and_utc())
        .and_then(|midnight| (midnight - now).to_std().ok())
        .unwrap_or(Duration::ZERO)
}

/// Builder for [`Bot`].
pub struct BotBuilder {
    settings: Settings,
    transport: Option<Arc<dyn Transport>>,
    database: Option<Database>,
    handlers: Vec<Arc<dyn Handler>>,
}

impl BotBuilder {
    /// Creates a builder with default settings and no handlers.
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
            transport: None,
            database: None,
            handlers: Vec::new(),
        }
    }

    /// Sets the settings.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the transport chosen from the settings.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the in-memory database.
    pub fn database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    /// Adds a handler. Handlers are checked in the order they were added.
    pub fn handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Builds the bot and looks up its username.
    ///
    /// Test settings select [`MockTransport`], otherwise the Bot API is
    /// reached over HTTP.
    ///
    /// # Errors
    ///
    /// Fails when the transport can't be set up or `get_me` does not succeed.
    pub async fn build(self) -> Result<Bot> {
        let settings = self.settings;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None if settings.is_test => Arc::new(MockTransport::new()),
            None => Arc::new(
                HttpTransport::builder()
                    .api_url(settings.api_url.clone())
                    .token(settings.tg_api_token.clone())
                    .timeout(settings.request_timeout)
                    .build()?,
            ),
        };

        let caller = Caller::builder()
            .transport(transport)
            .retry_config(settings.retry_config())
            .build()?;
        let db = Arc::new(
            self.database
                .unwrap_or_else(|| Database::in_memory(&settings)),
        );
        let api = Api::new(caller).with_database(db.clone());

        let me = api.get_me().await;
        if !me.succeeded {
            return Err(Error::ApiCall {
                method: "get_me",
                response: me
                    .response_text()
                    .map_or_else(|| me.response.to_string(), str::to_string),
            });
        }
        let username = me.response["username"]
            .as_str()
            .ok_or_else(|| Error::ApiCall {
                method: "get_me",
                response: format!("no username in {}", me.response),
            })?
            .to_string();

        if self.handlers.is_empty() {
            tracing::warn!("No handlers found");
        }
        tracing::info!(username = %username, "Bot initialized");

        Ok(Bot {
            api,
            db,
            stats: Arc::new(Mutex::new(StatsCache::new())),
            handlers: self.handlers,
            username,
            settings,
        })
    }
}

impl Default for BotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_duration_until_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 22, 30, 0).unwrap();
        assert_eq!(duration_until_midnight_utc(now), Duration::from_secs(90 * 60));

        let midnight = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(duration_until_midnight_utc(midnight), Duration::from_secs(24 * 60 * 60));
    }

    #[tokio::test]
    async fn test_build_with_failing_get_me() {
        let transport = Arc::new(
            MockTransport::new().raise_always(crate::ApiError::Unauthorized(
                "Forbidden: bot was blocked by the user".into(),
            )),
        );
        let result = Bot::builder()
            .settings(Settings::for_tests())
            .transport(transport)
            .build()
            .await;
        assert!(matches!(result, Err(Error::ApiCall { method: "get_me", .. })));
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled() {
        let bot = Bot::builder()
            .settings(Settings::for_tests())
            .build()
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        bot.run(cancel).await.unwrap();
    }
}
