use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use gestor_core::DocumentId;
use gestor_events::{ChangeBatch, ChangeSender, DocumentChange, change_channel};

use super::r#trait::{
    CollectionPath, CommitResult, Document, DocumentStore, FieldValue, Fields, OrderBy,
    SortDirection, StoreError, StoreStream, WriteBatch, WriteOp,
};

type Delivery = Result<ChangeBatch<Document>, StoreError>;

#[derive(Debug)]
struct Subscriber {
    collection: CollectionPath,
    sender: ChangeSender<Delivery>,
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<CollectionPath, BTreeMap<DocumentId, Document>>,
    subscribers: Vec<Subscriber>,
    last_timestamp: Option<DateTime<Utc>>,
    pending_failure: Option<StoreError>,
    commit_log: Vec<WriteBatch>,
}

impl Inner {
    /// Commit time for the next write. Strictly increasing so creation order is
    /// always recoverable from `createdAt`.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    fn publish(&mut self, collection: &CollectionPath, message: Delivery) {
        // Drop any dead subscribers while publishing.
        self.subscribers.retain(|sub| {
            if sub.collection != *collection {
                return !sub.sender.is_closed();
            }
            sub.sender.send(message.clone())
        });
    }

    fn publish_changes(&mut self, collection: &CollectionPath, changes: Vec<DocumentChange<Document>>) {
        if changes.is_empty() {
            return;
        }
        let batch = ChangeBatch::new(collection.tenant_id().clone(), changes);
        self.publish(collection, Ok(batch));
    }
}

/// In-memory document store.
///
/// Intended for tests/dev. Not optimized for performance: every commit clones the
/// target collection so that a failing operation leaves the store untouched.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    inner: Mutex<Inner>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    /// Make the next write (`commit` or `delete`) fail with `error` without applying anything.
    pub fn fail_next_write(&self, error: StoreError) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.pending_failure = Some(error);
        }
    }

    /// Report a store-side failure to every subscriber of `collection`.
    pub fn emit_error(&self, collection: &CollectionPath, error: StoreError) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.publish(collection, Err(error));
        }
    }

    /// Deliver an arbitrary batch to subscribers without touching stored data.
    ///
    /// Used to simulate duplicate or out-of-order delivery.
    pub fn emit_raw(&self, collection: &CollectionPath, changes: Vec<DocumentChange<Document>>) {
        if let Ok(mut inner) = self.inner.lock() {
            let batch = ChangeBatch::new(collection.tenant_id().clone(), changes);
            inner.publish(collection, Ok(batch));
        }
    }

    /// Every batch committed so far, as received (before server values were resolved).
    pub fn commit_log(&self) -> Vec<WriteBatch> {
        self.inner
            .lock()
            .map(|inner| inner.commit_log.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, collection: &CollectionPath, id: &DocumentId) -> Option<Document> {
        let inner = self.inner.lock().ok()?;
        inner.collections.get(collection)?.get(id).cloned()
    }

    pub fn document_count(&self, collection: &CollectionPath) -> usize {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.collections.get(collection).map(BTreeMap::len))
            .unwrap_or(0)
    }

    /// Number of live subscriptions on `collection`.
    pub fn subscriber_count(&self, collection: &CollectionPath) -> usize {
        match self.inner.lock() {
            Ok(mut inner) => {
                inner.subscribers.retain(|sub| !sub.sender.is_closed());
                inner
                    .subscribers
                    .iter()
                    .filter(|sub| sub.collection == *collection)
                    .count()
            }
            Err(_) => 0,
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn subscribe(
        &self,
        collection: &CollectionPath,
        order_by: OrderBy,
    ) -> Result<StoreStream, StoreError> {
        if order_by.field.is_empty() {
            return Err(StoreError::InvalidArgument(
                "order_by field must not be empty".to_string(),
            ));
        }

        let mut inner = self.lock()?;
        let (sender, stream) = change_channel();

        let mut snapshot: Vec<Document> = inner
            .collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        sort_documents(&mut snapshot, &order_by);

        let initial = ChangeBatch::new(
            collection.tenant_id().clone(),
            snapshot.into_iter().map(DocumentChange::added).collect(),
        );
        sender.send(Ok(initial));

        inner.subscribers.push(Subscriber {
            collection: collection.clone(),
            sender,
        });

        tracing::debug!(%collection, field = %order_by.field, "subscription registered");
        Ok(stream)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitResult, StoreError> {
        let mut inner = self.lock()?;

        if let Some(err) = inner.pending_failure.take() {
            return Err(err);
        }
        if batch.is_empty() {
            return Ok(CommitResult::default());
        }

        let collection = batch.collection().clone();
        let now = inner.next_timestamp();

        // Apply to a working copy; only swap it in once every op succeeded.
        let mut working = inner
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default();
        let mut changes = Vec::with_capacity(batch.len());
        let mut created = Vec::new();

        for op in batch.ops() {
            match op {
                WriteOp::Create { fields } => {
                    let id = generate_id()?;
                    let doc = Document::new(id.clone(), resolve_fields(fields, now)?);
                    working.insert(id.clone(), doc.clone());
                    changes.push(DocumentChange::added(doc));
                    created.push(id);
                }
                WriteOp::Update { id, fields } => {
                    let doc = working
                        .get_mut(id)
                        .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))?;
                    for (key, value) in resolve_fields(fields, now)? {
                        doc.fields.insert(key, value);
                    }
                    changes.push(DocumentChange::modified(doc.clone()));
                }
                WriteOp::Delete { id } => {
                    if let Some(doc) = working.remove(id) {
                        changes.push(DocumentChange::removed(doc));
                    }
                }
            }
        }

        inner.collections.insert(collection.clone(), working);
        inner.commit_log.push(batch);
        inner.publish_changes(&collection, changes);

        tracing::debug!(%collection, created = created.len(), "batch committed");
        Ok(CommitResult { created })
    }

    async fn delete(&self, collection: &CollectionPath, id: &DocumentId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;

        if let Some(err) = inner.pending_failure.take() {
            return Err(err);
        }

        let removed = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id));

        if let Some(doc) = removed {
            inner.publish_changes(collection, vec![DocumentChange::removed(doc)]);
        }
        Ok(())
    }
}

fn generate_id() -> Result<DocumentId, StoreError> {
    DocumentId::new(Uuid::now_v7().simple().to_string())
        .map_err(|e| StoreError::InvalidArgument(e.to_string()))
}

fn resolve_fields(fields: &Fields, now: DateTime<Utc>) -> Result<Map<String, JsonValue>, StoreError> {
    let mut out = Map::new();
    for (key, value) in fields {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument(
                "field names must not be empty".to_string(),
            ));
        }
        let resolved = match value {
            FieldValue::Value(v) => v.clone(),
            FieldValue::ServerTimestamp => {
                JsonValue::String(now.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
        };
        out.insert(key.clone(), resolved);
    }
    Ok(out)
}

/// Null/missing < bool < number < string < everything else; ties broken by id.
fn type_rank(value: Option<&JsonValue>) -> u8 {
    match value {
        None | Some(JsonValue::Null) => 0,
        Some(JsonValue::Bool(_)) => 1,
        Some(JsonValue::Number(_)) => 2,
        Some(JsonValue::String(_)) => 3,
        Some(_) => 4,
    }
}

fn compare_field(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    match (a, b) {
        (Some(JsonValue::Bool(x)), Some(JsonValue::Bool(y))) => x.cmp(y),
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(JsonValue::String(x)), Some(JsonValue::String(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn sort_documents(docs: &mut [Document], order_by: &OrderBy) {
    docs.sort_by(|a, b| {
        let ord = compare_field(a.get(&order_by.field), b.get(&order_by.field))
            .then_with(|| a.id.cmp(&b.id));
        match order_by.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
}
