use serde::{Deserialize, Serialize};

use gestor_core::TenantId;

/// Kind of a single reported change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        }
    }
}

impl core::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One delta for one document in a subscribed collection.
///
/// For `Removed`, `document` carries the last known contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChange<D> {
    pub kind: ChangeKind,
    pub document: D,
}

impl<D> DocumentChange<D> {
    pub fn new(kind: ChangeKind, document: D) -> Self {
        Self { kind, document }
    }

    pub fn added(document: D) -> Self {
        Self::new(ChangeKind::Added, document)
    }

    pub fn modified(document: D) -> Self {
        Self::new(ChangeKind::Modified, document)
    }

    pub fn removed(document: D) -> Self {
        Self::new(ChangeKind::Removed, document)
    }
}

/// A single delivery from a change stream.
///
/// Notes:
/// - Changes are ordered as the store produced them; consumers must apply them in order.
/// - Delivery is at-least-once and not guaranteed to follow creation order, so consumers
///   must tolerate duplicates and `Modified` for documents they have not seen yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeBatch<D> {
    tenant_id: TenantId,
    changes: Vec<DocumentChange<D>>,
}

impl<D> ChangeBatch<D> {
    pub fn new(tenant_id: TenantId, changes: Vec<DocumentChange<D>>) -> Self {
        Self { tenant_id, changes }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn changes(&self) -> &[DocumentChange<D>] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<DocumentChange<D>> {
        self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
