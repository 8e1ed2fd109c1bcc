//! Tenant-scoped, locally readable mirror of the pricing items collection.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use gestor_core::{DocumentId, TenantId};
use gestor_events::{ChangeBatch, ChangeKind, TenantScoped};
use gestor_infra::{
    CollectionPath, Document, DocumentStore, FieldValue, OrderBy, StoreConfig, StoreError,
    StoreStream, WriteBatch,
};

use crate::error::PricingError;
use crate::item::{FIELD_CREATED_AT, ItemId, ItemKey, PriceItem};
use crate::reconcile;

type ErrorObserver = Arc<dyn Fn(&StoreError) + Send + Sync>;

#[derive(Debug, Clone)]
struct Binding {
    collection: CollectionPath,
    generation: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    binding: Option<Binding>,
    items: Vec<PriceItem>,
}

impl CacheState {
    fn is_bound_to(&self, generation: u64) -> bool {
        self.binding
            .as_ref()
            .is_some_and(|b| b.generation == generation)
    }
}

// A panicking delta callback must not make the cache unreadable.
fn read_state(state: &RwLock<CacheState>) -> RwLockReadGuard<'_, CacheState> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_state(state: &RwLock<CacheState>) -> RwLockWriteGuard<'_, CacheState> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

/// Ownership of the task draining one subscription.
///
/// Dropping the handle cancels the task and, with it, the subscription.
#[derive(Debug)]
pub(crate) struct SubscriptionHandle {
    tenant_id: TenantId,
    generation: u64,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Result of [`PricingCache::save_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOutcome {
    pub created: usize,
    pub updated: usize,
    /// Items with neither a placeholder nor a persisted id.
    pub skipped: usize,
    /// Store-assigned ids of the created items, in input order.
    pub created_ids: Vec<DocumentId>,
}

/// Local mirror of one tenant's pricing items.
///
/// ## Lifecycle
///
/// Inactive until [`initialize`](Self::initialize) binds it to a tenant and starts a
/// subscription; [`teardown`](Self::teardown) (or re-initializing, or dropping the
/// cache) cancels the subscription and clears the items. At most one subscription is
/// live at a time.
///
/// ## Consistency
///
/// Reads are synchronous snapshots. Writes go to the store only; the mirror catches
/// up when the subscription delivers the resulting changes. Deliveries that arrive
/// after the binding changed are dropped.
pub struct PricingCache<S> {
    store: S,
    config: StoreConfig,
    state: Arc<RwLock<CacheState>>,
    subscription: Option<SubscriptionHandle>,
    generation: u64,
    on_error: ErrorObserver,
}

impl<S> PricingCache<S>
where
    S: DocumentStore,
{
    pub fn new(store: S) -> Self {
        Self::with_config(store, StoreConfig::default())
    }

    pub fn with_config(store: S, config: StoreConfig) -> Self {
        Self {
            store,
            config,
            state: Arc::new(RwLock::new(CacheState::default())),
            subscription: None,
            generation: 0,
            on_error: Arc::new(|err: &StoreError| {
                tracing::warn!(error = %err, "pricing subscription reported an error");
            }),
        }
    }

    /// Replace the default observer (a `warn` log) for subscription errors.
    pub fn with_error_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&StoreError) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(observer);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Bind to `tenant_id` and start mirroring its pricing items.
    ///
    /// Any previous subscription is torn down first. `on_delta` runs once per
    /// delivered change, in delivery order, after the change has been applied and
    /// before the batch is resorted. It runs outside the cache lock, so on a
    /// multi-thread runtime one callback already past its binding check may still
    /// run after [`teardown`](Self::teardown) or a re-initialize returns.
    ///
    /// Must be called from within a tokio runtime.
    pub fn initialize<F>(&mut self, tenant_id: TenantId, on_delta: F) -> Result<(), PricingError>
    where
        F: Fn(ChangeKind, &PriceItem) + Send + 'static,
    {
        self.teardown();

        let runtime = Handle::try_current().map_err(|_| PricingError::NoRuntime)?;
        let collection = self.config.pricing_collection_for(tenant_id.clone())?;
        let stream = self
            .store
            .subscribe(&collection, OrderBy::ascending(FIELD_CREATED_AT))?;

        self.generation += 1;
        let generation = self.generation;

        {
            let mut state = write_state(&self.state);
            state.binding = Some(Binding {
                collection: collection.clone(),
                generation,
            });
            state.items.clear();
        }

        let task = runtime.spawn(drain(
            stream,
            Arc::clone(&self.state),
            tenant_id.clone(),
            generation,
            on_delta,
            Arc::clone(&self.on_error),
        ));

        tracing::info!(tenant_id = %tenant_id, %collection, generation, "pricing cache initialized");

        self.subscription = Some(SubscriptionHandle {
            tenant_id,
            generation,
            task,
        });
        Ok(())
    }

    /// Cancel the subscription and return to the empty, unbound state.
    ///
    /// Safe to call when nothing is active.
    pub fn teardown(&mut self) {
        if let Some(handle) = self.subscription.take() {
            tracing::info!(
                tenant_id = %handle.tenant_id(),
                generation = handle.generation(),
                "pricing cache torn down"
            );
            handle.cancel();
        }

        let mut state = write_state(&self.state);
        state.binding = None;
        state.items.clear();
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.subscription.as_ref().map(SubscriptionHandle::tenant_id)
    }

    /// Snapshot of the items, ordered by creation time.
    pub fn get_all(&self) -> Vec<PriceItem> {
        read_state(&self.state).items.clone()
    }

    pub fn len(&self) -> usize {
        read_state(&self.state).items.len()
    }

    pub fn is_empty(&self) -> bool {
        read_state(&self.state).items.is_empty()
    }

    fn bound_collection(&self) -> Option<CollectionPath> {
        read_state(&self.state)
            .binding
            .as_ref()
            .map(|b| b.collection.clone())
    }

    /// Persist `items` in one atomic batch.
    ///
    /// Placeholder ids become creates (store-assigned id and `createdAt`); persisted
    /// ids become updates of name, description and price, leaving `createdAt` as is.
    /// Items with neither are skipped. The local items are not touched.
    pub async fn save_batch(&self, items: &[PriceItem]) -> Result<SaveOutcome, PricingError> {
        let collection = self.bound_collection().ok_or(PricingError::NotInitialized)?;

        let mut batch = WriteBatch::new(collection.clone());
        let mut outcome = SaveOutcome::default();

        for item in items {
            match item.id.key() {
                ItemKey::Placeholder => {
                    let mut fields = item.to_fields();
                    fields.insert(FIELD_CREATED_AT.to_string(), FieldValue::ServerTimestamp);
                    batch.create(fields);
                    outcome.created += 1;
                }
                ItemKey::Persisted(id) => {
                    batch.update(id, item.to_fields());
                    outcome.updated += 1;
                }
                ItemKey::Missing => outcome.skipped += 1,
            }
        }

        if batch.is_empty() {
            tracing::debug!(%collection, skipped = outcome.skipped, "nothing to save");
            return Ok(outcome);
        }

        let result = self.store.commit(batch).await.inspect_err(|err| {
            tracing::warn!(%collection, error = %err, "pricing batch rejected");
        })?;
        outcome.created_ids = result.created;

        tracing::info!(
            %collection,
            created = outcome.created,
            updated = outcome.updated,
            skipped = outcome.skipped,
            "pricing batch saved"
        );
        Ok(outcome)
    }

    /// Delete one item from the store.
    ///
    /// No-op when unbound, or when `item_id` is blank or a placeholder (never persisted).
    pub async fn delete_one(&self, item_id: &ItemId) -> Result<(), PricingError> {
        let Some(collection) = self.bound_collection() else {
            tracing::debug!(item_id = %item_id, "delete ignored: cache not initialized");
            return Ok(());
        };

        let id = match item_id.key() {
            ItemKey::Persisted(id) => id,
            ItemKey::Placeholder | ItemKey::Missing => {
                tracing::debug!(item_id = %item_id, "delete ignored: item was never persisted");
                return Ok(());
            }
        };

        self.store.delete(&collection, &id).await?;
        tracing::debug!(%collection, item_id = %id, "pricing item deleted");
        Ok(())
    }
}

async fn drain<F>(
    mut stream: StoreStream,
    state: Arc<RwLock<CacheState>>,
    tenant_id: TenantId,
    generation: u64,
    on_delta: F,
    on_error: ErrorObserver,
) where
    F: Fn(ChangeKind, &PriceItem),
{
    while let Some(delivery) = stream.next().await {
        match delivery {
            Ok(batch) => {
                if !batch.belongs_to(&tenant_id) {
                    tracing::warn!(
                        expected = %tenant_id,
                        found = %batch.tenant_id(),
                        "dropping change batch for another tenant"
                    );
                    continue;
                }
                if !apply_batch(&state, generation, batch, &on_delta) {
                    break;
                }
            }
            Err(err) => {
                if !read_state(&state).is_bound_to(generation) {
                    break;
                }
                on_error(&err);
            }
        }
    }

    tracing::debug!(tenant_id = %tenant_id, generation, "pricing subscription ended");
}

/// Returns `false` once the binding has moved on; the caller stops draining.
fn apply_batch<F>(
    state: &RwLock<CacheState>,
    generation: u64,
    batch: ChangeBatch<Document>,
    on_delta: &F,
) -> bool
where
    F: Fn(ChangeKind, &PriceItem),
{
    let mut summary = reconcile::ReconcileSummary::default();

    for change in batch.into_changes() {
        let item = PriceItem::from_document(&change.document);
        {
            let mut guard = write_state(state);
            if !guard.is_bound_to(generation) {
                return false;
            }
            summary.record(reconcile::apply_change(&mut guard.items, change.kind, item.clone()));
        }
        if !read_state(state).is_bound_to(generation) {
            return false;
        }
        on_delta(change.kind, &item);
    }

    let mut guard = write_state(state);
    if !guard.is_bound_to(generation) {
        return false;
    }
    reconcile::sort_by_created_at(&mut guard.items);

    tracing::trace!(
        inserted = summary.inserted,
        replaced = summary.replaced,
        removed = summary.removed,
        ignored = summary.ignored,
        items = guard.items.len(),
        "change batch reconciled"
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use gestor_infra::InMemoryDocumentStore;
    use serde_json::Map;
    use std::sync::Mutex;

    fn tenant() -> TenantId {
        TenantId::new("acme").unwrap()
    }

    fn doc(id: &str, name: &str, created_ms: i64) -> Document {
        Document::new(DocumentId::new(id).unwrap(), Map::new())
            .with_field("name", name)
            .with_field("price", 1.0)
            .with_field("createdAt", created_ms)
    }

    fn bound_state(generation: u64) -> RwLock<CacheState> {
        let collection = StoreConfig::default()
            .pricing_collection_for(tenant())
            .unwrap();
        RwLock::new(CacheState {
            binding: Some(Binding {
                collection,
                generation,
            }),
            items: Vec::new(),
        })
    }

    #[test]
    fn apply_batch_notifies_each_change_before_resort() {
        let state = bound_state(1);
        let seen = Mutex::new(Vec::new());

        let batch = ChangeBatch::new(
            tenant(),
            vec![
                gestor_events::DocumentChange::added(doc("a", "Corte Laser", 1)),
                gestor_events::DocumentChange::added(doc("b", "Dobra", 0)),
            ],
        );

        let applied = apply_batch(&state, 1, batch, &|kind: ChangeKind, item: &PriceItem| {
            // Mutation for this change is visible; the batch is not resorted yet.
            let visible: Vec<String> = read_state(&state)
                .items
                .iter()
                .map(|i| i.id.to_string())
                .collect();
            seen.lock().unwrap().push((kind, item.id.to_string(), visible));
        });

        assert!(applied);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (ChangeKind::Added, "a".to_string(), vec!["a".to_string()]),
                (
                    ChangeKind::Added,
                    "b".to_string(),
                    vec!["a".to_string(), "b".to_string()]
                ),
            ]
        );
        let ids: Vec<_> = read_state(&state)
            .items
            .iter()
            .map(|i| i.id.to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn apply_batch_drops_stale_generation() {
        let state = bound_state(2);
        let batch = ChangeBatch::new(
            tenant(),
            vec![gestor_events::DocumentChange::added(doc("a", "x", 1))],
        );

        assert!(!apply_batch(&state, 1, batch, &|_: ChangeKind, _: &PriceItem| {}));
        assert!(read_state(&state).items.is_empty());
    }

    #[test]
    fn apply_batch_skips_callback_once_unbound() {
        let state = bound_state(1);
        let calls = Mutex::new(0usize);

        let batch = ChangeBatch::new(
            tenant(),
            vec![
                gestor_events::DocumentChange::added(doc("a", "x", 1)),
                gestor_events::DocumentChange::added(doc("b", "y", 2)),
            ],
        );

        let applied = apply_batch(&state, 1, batch, &|_: ChangeKind, _: &PriceItem| {
            *calls.lock().unwrap() += 1;
            // Torn down from inside the first callback.
            write_state(&state).binding = None;
        });

        assert!(!applied);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn initialize_outside_runtime_is_an_error() {
        let mut cache = PricingCache::new(InMemoryDocumentStore::new());
        let err = cache.initialize(tenant(), |_, _| {}).unwrap_err();
        assert!(matches!(err, PricingError::NoRuntime));
        assert!(!cache.is_active());
    }

    #[tokio::test]
    async fn writes_before_initialize() {
        let cache = PricingCache::new(InMemoryDocumentStore::new());

        let err = cache
            .save_batch(&[PriceItem::draft("X", "", "3")])
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::NotInitialized));

        cache.delete_one(&ItemId::new("abc")).await.unwrap();
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let mut cache = PricingCache::new(InMemoryDocumentStore::new());
        cache.teardown();

        cache.initialize(tenant(), |_, _| {}).unwrap();
        assert!(cache.is_active());
        assert_eq!(cache.tenant_id(), Some(&tenant()));

        cache.teardown();
        cache.teardown();
        assert!(!cache.is_active());
        assert!(cache.tenant_id().is_none());
        assert!(cache.is_empty());
    }
}
