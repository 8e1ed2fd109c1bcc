//! Remote document store boundary.
//!
//! This module defines the infrastructure-facing abstraction for a managed,
//! collection-oriented document database: change-stream subscriptions, atomic
//! multi-document batches and server-assigned ids/timestamps.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryDocumentStore;
pub use r#trait::{
    CollectionPath, CommitResult, Document, DocumentStore, FieldValue, Fields, OrderBy,
    SortDirection, StoreError, StoreStream, WriteBatch, WriteOp,
};
