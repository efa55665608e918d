//! Document storage behind the models.
//!
//! Documents and queries are JSON objects. A query maps field paths to either
//! an expected value or an operator object:
//!
//! ```text
//! {"chat.id": -7, "_created_at": {"$gte": 1600000000.0, "$lt": 1600086400.0}}
//! ```
//!
//! Dotted paths reach into nested objects. The supported operators are `$lt`,
//! `$lte`, `$gt`, `$gte` and `$ne`. Updates set the given top-level fields and
//! leave the rest of the document untouched.

use crate::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::{Mutex, PoisonError};

/// A stored record.
pub type Document = Map<String, Value>;

/// A collection of documents.
///
/// Every model owns one storage. Implementations decide where documents live;
/// [`MemoryStorage`] keeps them in process.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Inserts a document.
    async fn create(&self, document: Document) -> Result<()>;

    /// Returns every document matching `query`.
    async fn find(&self, query: &Document) -> Result<Vec<Document>>;

    /// Returns the first document matching `query`.
    async fn find_one(&self, query: &Document) -> Result<Option<Document>>;

    /// Sets `fields` on every matching document. Returns how many matched.
    async fn update(&self, query: &Document, fields: &Document) -> Result<usize>;

    /// Sets `fields` on the first matching document. Returns whether one matched.
    async fn update_one(&self, query: &Document, fields: &Document) -> Result<bool>;

    async fn count(&self, query: &Document) -> Result<usize>;

    /// Removes every matching document. Returns how many were removed.
    async fn delete(&self, query: &Document) -> Result<usize>;

    async fn delete_one(&self, query: &Document) -> Result<bool>;

    /// Removes the whole collection.
    async fn drop_collection(&self) -> Result<()>;
}

/// In-process storage. Documents live as long as the value does.
#[derive(Debug)]
pub struct MemoryStorage {
    db_name: String,
    table_name: String,
    documents: Mutex<Vec<Document>>,
}

impl MemoryStorage {
    pub fn new(db_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            table_name: table_name.into(),
            documents: Mutex::new(Vec::new()),
        }
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn with_documents<T>(&self, f: impl FnOnce(&mut Vec<Document>) -> T) -> T {
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut documents)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create(&self, document: Document) -> Result<()> {
        self.with_documents(|documents| documents.push(document));
        Ok(())
    }

    async fn find(&self, query: &Document) -> Result<Vec<Document>> {
        Ok(self.with_documents(|documents| {
            documents
                .iter()
                .filter(|document| matches(document, query))
                .cloned()
                .collect()
        }))
    }

    async fn find_one(&self, query: &Document) -> Result<Option<Document>> {
        Ok(self.with_documents(|documents| {
            documents
                .iter()
                .find(|document| matches(document, query))
                .cloned()
        }))
    }

    async fn update(&self, query: &Document, fields: &Document) -> Result<usize> {
        Ok(self.with_documents(|documents| {
            let mut updated = 0;
            for document in documents.iter_mut().filter(|d| matches(d, query)) {
                set_fields(document, fields);
                updated += 1;
            }
            updated
        }))
    }

    async fn update_one(&self, query: &Document, fields: &Document) -> Result<bool> {
        Ok(self.with_documents(|documents| {
            match documents.iter_mut().find(|d| matches(d, query)) {
                Some(document) => {
                    set_fields(document, fields);
                    true
                }
                None => false,
            }
        }))
    }

    async fn count(&self, query: &Document) -> Result<usize> {
        Ok(self.with_documents(|documents| {
            documents.iter().filter(|d| matches(d, query)).count()
        }))
    }

    async fn delete(&self, query: &Document) -> Result<usize> {
        Ok(self.with_documents(|documents| {
            let before = documents.len();
            documents.retain(|d| !matches(d, query));
            before - documents.len()
        }))
    }

    async fn delete_one(&self, query: &Document) -> Result<bool> {
        Ok(self.with_documents(|documents| {
            match documents.iter().position(|d| matches(d, query)) {
                Some(index) => {
                    documents.remove(index);
                    true
                }
                None => false,
            }
        }))
    }

    async fn drop_collection(&self) -> Result<()> {
        self.with_documents(Vec::clear);
        Ok(())
    }
}

fn set_fields(document: &mut Document, fields: &Document) {
    for (key, value) in fields {
        document.insert(key.clone(), value.clone());
    }
}

/// Returns whether `document` satisfies every condition of `query`.
pub fn matches(document: &Document, query: &Document) -> bool {
    query
        .iter()
        .all(|(path, condition)| field_matches(lookup(document, path), condition))
}

fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut value = document.get(first)?;
    for part in parts {
        value = value.as_object()?.get(part)?;
    }
    Some(value)
}

fn field_matches(actual: Option<&Value>, condition: &Value) -> bool {
    match condition {
        Value::Object(operators) if is_operator_object(operators) => {
            operators.iter().all(|(op, operand)| match op.as_str() {
                "$ne" => actual != Some(operand),
                "$lt" => compare(actual, operand) == Some(Ordering::Less),
                "$lte" => matches!(
                    compare(actual, operand),
                    Some(Ordering::Less | Ordering::Equal)
                ),
                "$gt" => compare(actual, operand) == Some(Ordering::Greater),
                "$gte" => matches!(
                    compare(actual, operand),
                    Some(Ordering::Greater | Ordering::Equal)
                ),
                unknown => {
                    tracing::warn!(operator = unknown, "Unsupported query operator");
                    false
                }
            })
        }
        // A missing field only equals null.
        expected => actual.unwrap_or(&Value::Null) == expected,
    }
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|key| key.starts_with('$'))
}

fn compare(actual: Option<&Value>, operand: &Value) -> Option<Ordering> {
    match (actual?, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
