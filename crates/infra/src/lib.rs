//! Infrastructure layer: remote document store boundary and configuration.

pub mod config;
pub mod document_store;

pub use config::{ConfigError, StoreConfig};
pub use document_store::{
    CollectionPath, CommitResult, Document, DocumentStore, FieldValue, Fields,
    InMemoryDocumentStore, OrderBy, SortDirection, StoreError, StoreStream, WriteBatch, WriteOp,
};
