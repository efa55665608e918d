//! Bot behavior on simulated updates.

use async_trait::async_trait;
use meetg::api::SendOptions;
use meetg::factories::MessageParams;
use meetg::storage::Document;
use meetg::testing::{MockTransport, MOCK_USERNAME};
use meetg::types::{ChatType, EntityKind, Update};
use meetg::{ApiError, Bot, CallOutcome, Handler, Settings};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Replies to every text message.
struct ReplyAny;

#[async_trait]
impl Handler for ReplyAny {
    fn check(&self, update: &Update) -> bool {
        update
            .effective_message()
            .is_some_and(|message| message.text.is_some())
    }

    async fn handle(&self, bot: &Bot, update: &Update) -> Option<CallOutcome> {
        let chat_id = update.effective_chat()?.id;
        Some(
            bot.api()
                .send_message(chat_id, "reply to any msg", &SendOptions::default())
                .await,
        )
    }
}

/// Answers `/start` only.
struct StartCommand;

#[async_trait]
impl Handler for StartCommand {
    fn check(&self, update: &Update) -> bool {
        update.effective_message().is_some_and(|message| {
            message
                .entities
                .iter()
                .any(|entity| entity.kind == EntityKind::BotCommand && entity.offset == 0)
        })
    }

    async fn handle(&self, bot: &Bot, update: &Update) -> Option<CallOutcome> {
        let chat_id = update.effective_chat()?.id;
        Some(
            bot.api()
                .send_message(chat_id, "Welcome", &SendOptions::default())
                .await,
        )
    }
}

async fn bot_with(settings: Settings, handlers: Vec<Arc<dyn Handler>>) -> (Bot, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let mut builder = Bot::builder()
        .settings(settings)
        .transport(transport.clone());
    for handler in handlers {
        builder = builder.handler(handler);
    }
    (builder.build().await.unwrap(), transport)
}

#[tokio::test]
async fn test_username_comes_from_get_me() {
    let (bot, transport) = bot_with(Settings::for_tests(), vec![]).await;
    assert_eq!(bot.username(), MOCK_USERNAME);
    assert_eq!(transport.invocations()[0].method, "get_me");
}

#[tokio::test]
async fn test_saves_users_and_chats() {
    for kind in [ChatType::Private, ChatType::Group, ChatType::Supergroup] {
        let (bot, _) = bot_with(Settings::for_tests(), vec![Arc::new(ReplyAny)]).await;
        let all = Document::new();
        assert_eq!(bot.db().user.count(&all).await.unwrap(), 0);

        bot.receive_message("Spam", MessageParams::in_chat(kind)).await.unwrap();

        assert_eq!(bot.db().update.count(&all).await.unwrap(), 1);
        assert_eq!(bot.db().message.count(&all).await.unwrap(), 1);
        assert_eq!(bot.db().user.count(&all).await.unwrap(), 1);
        assert_eq!(bot.db().chat.count(&all).await.unwrap(), 1);
    }
}

#[tokio::test]
async fn test_disabled_models_are_not_saved() {
    let settings = Settings {
        save_users: false,
        save_chats: false,
        ..Settings::for_tests()
    };
    let (bot, _) = bot_with(settings, vec![Arc::new(ReplyAny)]).await;
    let all = Document::new();

    bot.receive_message("Spam", MessageParams::in_chat(ChatType::Group)).await.unwrap();

    assert_eq!(bot.db().user.count(&all).await.unwrap(), 0);
    assert_eq!(bot.db().chat.count(&all).await.unwrap(), 0);
    assert_eq!(bot.db().message.count(&all).await.unwrap(), 1);
}

#[tokio::test]
async fn test_saves_without_handlers() {
    let (bot, _) = bot_with(Settings::for_tests(), vec![]).await;

    let outcome = bot
        .receive_message("Spam", MessageParams::default())
        .await
        .unwrap();

    assert!(outcome.is_none());
    assert_eq!(bot.db().update.count(&Document::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_first_matching_handler_runs() {
    let (bot, transport) = bot_with(
        Settings::for_tests(),
        vec![Arc::new(StartCommand), Arc::new(ReplyAny)],
    )
    .await;

    let outcome = bot
        .receive_message("/start", MessageParams::default())
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.succeeded);

    bot.receive_message("Spam", MessageParams::default())
        .await
        .unwrap();

    let sent: Vec<_> = transport
        .invocations()
        .into_iter()
        .filter(|invocation| invocation.method == "send_message")
        .map(|invocation| invocation.args["text"].clone())
        .collect();
    assert_eq!(sent, vec![json!("Welcome"), json!("reply to any msg")]);
}

#[tokio::test]
async fn test_updates_are_counted() {
    let (bot, _) = bot_with(Settings::for_tests(), vec![]).await;

    bot.receive_message("one", MessageParams::default())
        .await
        .unwrap();
    bot.receive_message("two", MessageParams::default())
        .await
        .unwrap();

    let reports = bot.reports().await.unwrap();
    assert_eq!(reports[0], "received 2 'message' updates");
    assert!(reports.contains(&"stored 2 new messages".to_string()));
    assert!(reports.contains(&"stored 2 new users".to_string()));
}

#[tokio::test]
async fn test_report_stats_goes_to_stats_chats() {
    let settings = Settings {
        stats_to: vec![10, 20],
        ..Settings::for_tests()
    };
    let (bot, transport) = bot_with(settings, vec![]).await;
    bot.receive_message("Spam", MessageParams::default())
        .await
        .unwrap();

    bot.report_stats().await.unwrap();

    let sent: Vec<_> = transport
        .invocations()
        .into_iter()
        .filter(|invocation| invocation.method == "send_message")
        .collect();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].args["chat_id"], 10);
    assert_eq!(sent[1].args["chat_id"], 20);

    let text = sent[0].args["text"].as_str().unwrap();
    assert!(text.starts_with(&format!("@{MOCK_USERNAME} for the last 24 hours:\n- ")));
    assert!(text.contains("received 1 'message' updates"));
}

#[tokio::test]
async fn test_report_stats_without_stats_chats() {
    let (bot, transport) = bot_with(Settings::for_tests(), vec![]).await;
    bot.report_stats().await.unwrap();
    assert_eq!(transport.invocation_count(), 1);
}

#[tokio::test]
async fn test_send_messages_broadcasts_in_order() {
    let (bot, transport) = bot_with(Settings::for_tests(), vec![]).await;

    let outcomes = bot
        .send_messages(&[3, 1, 2], "News", &SendOptions::default())
        .await;

    assert!(outcomes.iter().all(|outcome| outcome.succeeded));
    let chat_ids: Vec<_> = transport.invocations()[1..]
        .iter()
        .map(|invocation| invocation.args["chat_id"].clone())
        .collect();
    assert_eq!(chat_ids, vec![json!(3), json!(1), json!(2)]);
}

#[tokio::test]
async fn test_build_fails_when_get_me_fails() {
    let transport = Arc::new(MockTransport::new().raise_always(ApiError::InvalidToken));
    let result = Bot::builder()
        .settings(Settings::for_tests())
        .transport(transport)
        .build()
        .await;

    match result {
        Err(meetg::Error::ApiCall { method, response }) => {
            assert_eq!(method, "get_me");
            assert_eq!(response, "Invalid token");
        }
        Err(e) => panic!("Expected ApiCall, got {e}"),
        Ok(_) => panic!("Expected ApiCall, got a bot"),
    }
}

#[tokio::test]
async fn test_run_processes_polled_updates() {
    let transport = Arc::new(MockTransport::new());
    transport.push_update(json!({
        "update_id": 100,
        "message": {
            "message_id": 1,
            "date": 1_600_000_000,
            "chat": {"id": 5, "type": "private"},
            "from": {"id": 5, "is_bot": false, "first_name": "Palin"},
            "text": "Spam"
        }
    }));
    let bot = Arc::new(
        Bot::builder()
            .settings(Settings::for_tests())
            .transport(transport.clone())
            .build()
            .await
            .unwrap(),
    );

    let cancel = CancellationToken::new();
    let running = {
        let bot = bot.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { bot.run(cancel).await })
    };

    // get_me, then the poll that delivers the update and one more
    while transport.invocation_count() < 3 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    cancel.cancel();
    running.await.unwrap().unwrap();

    let mut query = Document::new();
    query.insert("id".into(), json!(5));
    assert_eq!(bot.db().user.count(&query).await.unwrap(), 1);
    assert!(bot.stats().lock().unwrap().update_count("message") >= 1);
}
