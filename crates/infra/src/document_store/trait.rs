use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use gestor_core::{DocumentId, DomainError, TenantId};
use gestor_events::{ChangeBatch, ChangeStream};

/// Default first path segment under which tenant data lives.
pub const DEFAULT_TENANT_ROOT: &str = "companies";

/// A tenant-scoped collection: `{root}/{tenant_id}/{name}`.
///
/// Every collection the application touches is segregated per tenant, so the
/// tenant is part of the path rather than a field on the documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionPath {
    root: String,
    tenant_id: TenantId,
    name: String,
}

impl CollectionPath {
    pub fn new(
        root: impl Into<String>,
        tenant_id: TenantId,
        name: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let root = root.into();
        let name = name.into();
        validate_segment("collection root", &root)?;
        validate_segment("collection name", &name)?;
        Ok(Self {
            root,
            tenant_id,
            name,
        })
    }

    /// Collection under the default tenant root (`companies/{tenant_id}/{name}`).
    pub fn tenant_scoped(tenant_id: TenantId, name: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(DEFAULT_TENANT_ROOT, tenant_id, name)
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl core::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}/{}", self.root, self.tenant_id, self.name)
    }
}

pub(crate) fn validate_segment(what: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() || value.contains('/') {
        return Err(DomainError::validation(format!(
            "{what} must be a single non-empty path segment (got '{value}')"
        )));
    }
    Ok(())
}

/// A stored document as delivered by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Map<String, JsonValue>,
}

impl Document {
    pub fn new(id: DocumentId, fields: Map<String, JsonValue>) -> Self {
        Self { id, fields }
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(JsonValue::as_str)
    }

    /// Builder-style field setter (handy for fixtures).
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }
}

/// A field value in a write: either a concrete JSON value or a sentinel the
/// store resolves at commit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Value(JsonValue),
    /// Replaced by the commit timestamp (RFC 3339, UTC, microsecond precision).
    ServerTimestamp,
}

impl From<JsonValue> for FieldValue {
    fn from(value: JsonValue) -> Self {
        FieldValue::Value(value)
    }
}

/// Fields written by a single operation.
pub type Fields = BTreeMap<String, FieldValue>;

/// A single operation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteOp {
    /// Create a document; the store assigns its id.
    Create { fields: Fields },
    /// Merge `fields` into an existing document. Fields not mentioned are preserved.
    /// Fails with [`StoreError::NotFound`] if the document does not exist.
    Update { id: DocumentId, fields: Fields },
    /// Delete a document. Deleting a missing document is not an error.
    Delete { id: DocumentId },
}

/// An atomic multi-document write against one collection.
///
/// Either every operation is applied or none is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteBatch {
    collection: CollectionPath,
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new(collection: CollectionPath) -> Self {
        Self {
            collection,
            ops: Vec::new(),
        }
    }

    pub fn create(&mut self, fields: Fields) -> &mut Self {
        self.ops.push(WriteOp::Create { fields });
        self
    }

    pub fn update(&mut self, id: DocumentId, fields: Fields) -> &mut Self {
        self.ops.push(WriteOp::Update { id, fields });
        self
    }

    pub fn delete(&mut self, id: DocumentId) -> &mut Self {
        self.ops.push(WriteOp::Delete { id });
        self
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitResult {
    /// Ids assigned to `Create` operations, in operation order.
    pub created: Vec<DocumentId>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Ordering requested for a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Document store operation error.
///
/// These are **infrastructure errors** reported by the remote store, as opposed
/// to domain errors (validation, identifiers).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// What a subscription delivers: change batches, or errors reported by the store.
pub type StoreStream = ChangeStream<Result<ChangeBatch<Document>, StoreError>>;

/// Managed, collection-oriented document store.
///
/// ## Subscription semantics
///
/// `subscribe()`:
/// - First delivers one batch of `Added` changes describing the current contents,
///   in the requested order (the batch may be empty)
/// - Then delivers one batch per write that touches the collection
/// - Reports store-side failures (permissions, connectivity) as `Err` items; the
///   stream may continue afterwards
/// - Ends when the store drops the subscription; dropping the returned stream
///   unsubscribes
///
/// ## Write semantics
///
/// `commit()` is all-or-nothing. Ids and `ServerTimestamp` fields are assigned by
/// the store. `delete()` is a single-document write and succeeds for missing ids.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    fn subscribe(
        &self,
        collection: &CollectionPath,
        order_by: OrderBy,
    ) -> Result<StoreStream, StoreError>;

    async fn commit(&self, batch: WriteBatch) -> Result<CommitResult, StoreError>;

    async fn delete(&self, collection: &CollectionPath, id: &DocumentId) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> DocumentStore for Arc<S>
where
    S: DocumentStore + ?Sized,
{
    fn subscribe(
        &self,
        collection: &CollectionPath,
        order_by: OrderBy,
    ) -> Result<StoreStream, StoreError> {
        (**self).subscribe(collection, order_by)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitResult, StoreError> {
        (**self).commit(batch).await
    }

    async fn delete(&self, collection: &CollectionPath, id: &DocumentId) -> Result<(), StoreError> {
        (**self).delete(collection, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantId {
        TenantId::new("acme").unwrap()
    }

    #[test]
    fn collection_path_renders_tenant_scope() {
        let path = CollectionPath::tenant_scoped(tenant(), "pricing_items").unwrap();
        assert_eq!(path.to_string(), "companies/acme/pricing_items");
        assert_eq!(path.tenant_id(), &tenant());
    }

    #[test]
    fn collection_path_rejects_nested_names() {
        let err = CollectionPath::new("companies", tenant(), "a/b").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(CollectionPath::new("", tenant(), "x").is_err());
    }

    #[test]
    fn write_batch_keeps_operation_order() {
        let path = CollectionPath::tenant_scoped(tenant(), "pricing_items").unwrap();
        let id = DocumentId::new("d1").unwrap();

        let mut batch = WriteBatch::new(path);
        batch
            .create(Fields::new())
            .update(id.clone(), Fields::new())
            .delete(id.clone());

        assert_eq!(batch.len(), 3);
        assert!(matches!(batch.ops()[0], WriteOp::Create { .. }));
        assert!(matches!(&batch.ops()[1], WriteOp::Update { id: i, .. } if *i == id));
        assert!(matches!(&batch.ops()[2], WriteOp::Delete { id: i } if *i == id));
    }
}
