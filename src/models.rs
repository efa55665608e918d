//! Persistence of Bot API objects seen by the bot.
//!
//! Each [`Model`] stores one Bot API type in its own collection. The
//! [`Database`] groups the four default models and saves everything an
//! incoming update carries.

use crate::{
    config::Settings,
    storage::{Document, MemoryStorage, Storage},
    types::{self, ApiType, Update},
    utils::{unix_hours_ago, unix_now},
    Error, Result,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

const CREATED_AT: &str = "_created_at";
const MODIFIED_AT: &str = "_modified_at";
const KICKED_AT: &str = "_kicked_at";

/// The default models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Update,
    Message,
    User,
    Chat,
}

impl ModelKind {
    pub fn api_type(self) -> ApiType {
        match self {
            ModelKind::Update => types::UPDATE,
            ModelKind::Message => types::MESSAGE,
            ModelKind::User => types::USER,
            ModelKind::Chat => types::CHAT,
        }
    }

    /// Bookkeeping fields stored next to the Bot API fields.
    pub fn special_fields(self) -> &'static [&'static str] {
        match self {
            ModelKind::Chat => &[CREATED_AT, MODIFIED_AT, KICKED_AT],
            _ => &[CREATED_AT, MODIFIED_AT],
        }
    }

    /// Collection name, e.g. `chat_table`.
    pub fn table_name(self) -> String {
        format!("{}_table", self.api_type().name.to_lowercase())
    }
}

/// One stored Bot API type.
pub struct Model {
    kind: ModelKind,
    storage: Arc<dyn Storage>,
    enabled: bool,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl Model {
    pub fn new(kind: ModelKind, storage: Arc<dyn Storage>) -> Self {
        Self {
            kind,
            storage,
            enabled: true,
        }
    }

    /// Turns saving from updates on or off.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.api_type().name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Drops the fields that don't belong to this model.
    pub fn validate(&self, data: &Document) -> Document {
        let api_type = self.kind.api_type();
        let special = self.kind.special_fields();
        let mut validated = Document::new();
        for (field, value) in data {
            if api_type.fields.contains(&field.as_str()) || special.contains(&field.as_str()) {
                validated.insert(field.clone(), value.clone());
            } else {
                tracing::warn!(field = %field, model = self.name(), "Field doesn't belong to model");
            }
        }
        validated
    }

    /// Stores a new record. Returns `false` when nothing valid was left to store.
    pub async fn create(&self, data: &Document) -> Result<bool> {
        let mut data = self.validate(data);
        if data.is_empty() {
            return Ok(false);
        }
        data.insert(CREATED_AT.to_string(), json!(unix_now()));
        data.insert(MODIFIED_AT.to_string(), Value::Null);
        let id = data.get(self.kind.api_type().id_field).cloned();
        self.storage.create(data).await?;

        match id {
            Some(id) => tracing::info!(model = self.name(), id = %id, "Created in storage"),
            None => tracing::info!(model = self.name(), "Created in storage"),
        }
        Ok(true)
    }

    pub async fn find(&self, query: &Document) -> Result<Vec<Document>> {
        self.storage.find(query).await
    }

    pub async fn find_one(&self, query: &Document) -> Result<Option<Document>> {
        self.storage.find_one(query).await
    }

    /// Sets `data` on every matching record and stamps the modification time.
    pub async fn update(&self, query: &Document, data: &Document) -> Result<usize> {
        let mut data = self.validate(data);
        data.insert(MODIFIED_AT.to_string(), json!(unix_now()));
        self.storage.update(query, &data).await
    }

    /// Sets `data` on the first matching record and stamps the modification time.
    pub async fn update_one(&self, query: &Document, data: &Document) -> Result<bool> {
        let mut data = self.validate(data);
        data.insert(MODIFIED_AT.to_string(), json!(unix_now()));
        let updated = self.storage.update_one(query, &data).await?;

        match query.get(self.kind.api_type().id_field) {
            Some(id) => tracing::info!(model = self.name(), id = %id, "Updated in storage"),
            None => tracing::info!(model = self.name(), "Updated in storage"),
        }
        Ok(updated)
    }

    pub async fn count(&self, query: &Document) -> Result<usize> {
        self.storage.count(query).await
    }

    pub async fn drop(&self) -> Result<()> {
        self.storage.drop_collection().await
    }

    /// Number of records created in the last 24 hours.
    pub async fn day_count(&self) -> Result<usize> {
        let mut query = Document::new();
        query.insert(
            CREATED_AT.to_string(),
            json!({"$lte": unix_now(), "$gte": unix_hours_ago(24)}),
        );
        self.count(&query).await
    }

    /// A line like `stored 3 new chats`.
    pub async fn day_report(&self) -> Result<String> {
        let count = self.day_count().await?;
        Ok(format!("stored {} new {}s", count, self.name().to_lowercase()))
    }

    /// Creates or refreshes the record for the object this model stores from `update`.
    ///
    /// Updates are always created. Messages, users and chats are created when
    /// missing and updated when a stored field differs.
    pub async fn save_from_update(&self, update: &Update) -> Result<()> {
        let (object, query) = match self.kind {
            ModelKind::Update => {
                self.create(&to_document(update)?).await?;
                return Ok(());
            }
            ModelKind::Message => match update.effective_message() {
                Some(message) => (
                    to_document(message)?,
                    query_of(&[
                        ("message_id", json!(message.message_id)),
                        ("chat.id", json!(message.chat.id)),
                    ]),
                ),
                None => return Ok(()),
            },
            ModelKind::User => match update.effective_user() {
                Some(user) => (to_document(user)?, query_of(&[("id", json!(user.id))])),
                None => return Ok(()),
            },
            ModelKind::Chat => match update.effective_chat() {
                Some(chat) => (to_document(chat)?, query_of(&[("id", json!(chat.id))])),
                None => return Ok(()),
            },
        };

        match self.find_one(&query).await? {
            Some(stored) if is_equal(&object, &stored) => {}
            Some(_) => {
                self.update_one(&query, &object).await?;
            }
            None => {
                self.create(&object).await?;
            }
        }
        Ok(())
    }

    /// Stamps `_kicked_at` on a chat record after the bot was removed from it.
    pub async fn mark_kicked(&self, chat_id: i64) -> Result<bool> {
        let query = query_of(&[("id", json!(chat_id))]);
        let mut data = Document::new();
        data.insert(KICKED_AT.to_string(), json!(unix_now()));
        self.update_one(&query, &data).await
    }
}

fn to_document<T: Serialize>(object: &T) -> Result<Document> {
    match serde_json::to_value(object)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Storage(format!("Expected an object, got {other}"))),
    }
}

fn query_of(conditions: &[(&str, Value)]) -> Document {
    conditions
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

/// Fields present on both sides must hold the same value.
fn is_equal(object: &Document, stored: &Document) -> bool {
    object
        .iter()
        .all(|(key, value)| stored.get(key).map_or(true, |stored| stored == value))
}

/// The default models of a bot.
#[derive(Debug)]
pub struct Database {
    pub update: Model,
    pub message: Model,
    pub user: Model,
    pub chat: Model,
}

impl Database {
    /// Creates models backed by [`MemoryStorage`].
    pub fn in_memory(settings: &Settings) -> Self {
        Self::with_storage(settings, |db_name, table_name| {
            Arc::new(MemoryStorage::new(db_name, table_name))
        })
    }

    /// Creates models with storages from `factory`, called with the database and table name.
    pub fn with_storage<F>(settings: &Settings, factory: F) -> Self
    where
        F: Fn(&str, &str) -> Arc<dyn Storage>,
    {
        let db_name = settings.database_name();
        let model = |kind: ModelKind, enabled: bool| {
            Model::new(kind, factory(db_name, &kind.table_name())).enabled(enabled)
        };
        Self {
            update: model(ModelKind::Update, settings.save_updates),
            message: model(ModelKind::Message, settings.save_messages),
            user: model(ModelKind::User, settings.save_users),
            chat: model(ModelKind::Chat, settings.save_chats),
        }
    }

    pub fn models(&self) -> [&Model; 4] {
        [&self.update, &self.message, &self.user, &self.chat]
    }

    /// Saves everything `update` carries into the enabled models.
    pub async fn save_update(&self, update: &Update) -> Result<()> {
        for model in self.models().into_iter().filter(|m| m.is_enabled()) {
            model.save_from_update(update).await?;
        }
        Ok(())
    }

    /// Day reports of all models.
    pub async fn day_reports(&self) -> Result<Vec<String>> {
        let mut reports = Vec::with_capacity(4);
        for model in self.models() {
            reports.push(model.day_report().await?);
        }
        Ok(reports)
    }

    /// Clears every model's collection.
    pub async fn drop_all(&self) -> Result<()> {
        for model in self.models() {
            model.drop().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factories::{MessageKind, MessageParams, MessageUpdateFactory, UserParams};

    fn database() -> Database {
        Database::in_memory(&Settings::for_tests())
    }

    fn by_id(id: i64) -> Document {
        query_of(&[("id", json!(id))])
    }

    #[test]
    fn test_table_names() {
        assert_eq!(ModelKind::Chat.table_name(), "chat_table");
        assert_eq!(ModelKind::Update.table_name(), "update_table");
    }

    #[tokio::test]
    async fn test_create_stamps_and_validates() {
        let db = database();
        let mut data = Document::new();
        data.insert("id".into(), json!(5));
        data.insert("not_a_field".into(), json!(1));

        assert!(db.user.create(&data).await.unwrap());

        let stored = db.user.find_one(&by_id(5)).await.unwrap().unwrap();
        assert!(stored[CREATED_AT].is_f64());
        assert!(stored[MODIFIED_AT].is_null());
        assert!(!stored.contains_key("not_a_field"));
    }

    #[tokio::test]
    async fn test_create_nothing_valid() {
        let db = database();
        let mut data = Document::new();
        data.insert("not_a_field".into(), json!(1));
        assert!(!db.user.create(&data).await.unwrap());
        assert_eq!(db.user.count(&Document::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_from_update_creates_then_updates() {
        let db = database();
        let factory = MessageUpdateFactory::new(MessageKind::Message);
        let first = factory.create(MessageParams {
            from: UserParams {
                id: Some(42),
                first_name: Some("Palin".into()),
                ..UserParams::default()
            },
            ..MessageParams::default()
        });
        db.save_update(&first).await.unwrap();

        let second = factory.create(MessageParams {
            from: UserParams {
                id: Some(42),
                first_name: Some("Michael".into()),
                ..UserParams::default()
            },
            ..MessageParams::default()
        });
        db.save_update(&second).await.unwrap();

        assert_eq!(db.update.count(&Document::new()).await.unwrap(), 2);
        assert_eq!(db.message.count(&Document::new()).await.unwrap(), 2);
        assert_eq!(db.user.count(&by_id(42)).await.unwrap(), 1);

        let user = db.user.find_one(&by_id(42)).await.unwrap().unwrap();
        assert_eq!(user["first_name"], "Michael");
        assert!(user[MODIFIED_AT].is_f64());
    }

    #[tokio::test]
    async fn test_unchanged_object_is_not_updated() {
        let db = database();
        let update = MessageUpdateFactory::default().create(MessageParams::default());
        db.save_update(&update).await.unwrap();
        db.save_update(&update).await.unwrap();

        let chat_id = update.effective_chat().unwrap().id;
        let chat = db.chat.find_one(&by_id(chat_id)).await.unwrap().unwrap();
        assert!(chat[MODIFIED_AT].is_null());
    }

    #[tokio::test]
    async fn test_disabled_model_is_skipped() {
        let mut settings = Settings::for_tests();
        settings.save_messages = false;
        let db = Database::in_memory(&settings);

        let update = MessageUpdateFactory::default().create(MessageParams::default());
        db.save_update(&update).await.unwrap();

        assert_eq!(db.message.count(&Document::new()).await.unwrap(), 0);
        assert_eq!(db.chat.count(&Document::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_kicked() {
        let db = database();
        let update = MessageUpdateFactory::default().create(MessageParams::default());
        db.save_update(&update).await.unwrap();
        let chat_id = update.effective_chat().unwrap().id;

        assert!(db.chat.mark_kicked(chat_id).await.unwrap());
        let chat = db.chat.find_one(&by_id(chat_id)).await.unwrap().unwrap();
        assert!(chat[KICKED_AT].is_f64());
    }

    #[tokio::test]
    async fn test_day_report() {
        let db = database();
        db.save_update(&MessageUpdateFactory::default().create(MessageParams::default()))
            .await
            .unwrap();

        let reports = db.day_reports().await.unwrap();
        assert_eq!(
            reports,
            vec![
                "stored 1 new updates",
                "stored 1 new messages",
                "stored 1 new users",
                "stored 1 new chats",
            ]
        );

        db.drop_all().await.unwrap();
        assert_eq!(db.chat.day_count().await.unwrap(), 0);
    }
}
