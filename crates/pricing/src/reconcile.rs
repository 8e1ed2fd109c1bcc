//! Reconciliation of change deltas into an ordered item list.
//!
//! Deliveries may be duplicated or arrive out of creation order, so every step is
//! keyed by item id rather than by position:
//!
//! - `Added`: append unless the id is already present (duplicates are no-ops)
//! - `Modified`: replace in place; an unknown id is appended as if it were added
//! - `Removed`: drop the item if present
//!
//! After a batch, the list is resorted by `createdAt` (missing = epoch 0). The sort
//! is stable, so items sharing a timestamp keep their delivery order.
//!
//! Lookup is a linear scan, O(n) per change.

use gestor_events::ChangeKind;

use crate::item::{ItemId, PriceItem};

/// What a single change did to the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    Replaced,
    Removed,
    Ignored,
}

/// Per-batch counts of [`Applied`] outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub removed: usize,
    pub ignored: usize,
}

impl ReconcileSummary {
    pub fn record(&mut self, applied: Applied) {
        match applied {
            Applied::Inserted => self.inserted += 1,
            Applied::Replaced => self.replaced += 1,
            Applied::Removed => self.removed += 1,
            Applied::Ignored => self.ignored += 1,
        }
    }
}

pub fn position_of(items: &[PriceItem], id: &ItemId) -> Option<usize> {
    items.iter().position(|item| item.id == *id)
}

/// Apply one change. Does not restore ordering; call [`sort_by_created_at`] after the batch.
pub fn apply_change(items: &mut Vec<PriceItem>, kind: ChangeKind, item: PriceItem) -> Applied {
    let existing = position_of(items, &item.id);

    match (kind, existing) {
        (ChangeKind::Added, Some(_)) => Applied::Ignored,
        (ChangeKind::Added, None) | (ChangeKind::Modified, None) => {
            items.push(item);
            Applied::Inserted
        }
        (ChangeKind::Modified, Some(idx)) => {
            items[idx] = item;
            Applied::Replaced
        }
        (ChangeKind::Removed, Some(idx)) => {
            items.remove(idx);
            Applied::Removed
        }
        (ChangeKind::Removed, None) => Applied::Ignored,
    }
}

pub fn sort_by_created_at(items: &mut [PriceItem]) {
    items.sort_by_key(PriceItem::sort_key);
}

/// Apply a whole batch, then resort.
pub fn reconcile_batch<I>(items: &mut Vec<PriceItem>, changes: I) -> ReconcileSummary
where
    I: IntoIterator<Item = (ChangeKind, PriceItem)>,
{
    let mut summary = ReconcileSummary::default();
    for (kind, item) in changes {
        summary.record(apply_change(items, kind, item));
    }
    sort_by_created_at(items);
    summary
}
