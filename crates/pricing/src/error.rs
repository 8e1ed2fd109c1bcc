use thiserror::Error;

use gestor_core::DomainError;
use gestor_infra::StoreError;

/// Errors surfaced by [`crate::PricingCache`] operations.
#[derive(Debug, Error)]
pub enum PricingError {
    /// A write was attempted before `initialize` (or after `teardown`).
    #[error("pricing cache is not bound to a tenant")]
    NotInitialized,

    /// `initialize` was called outside a tokio runtime.
    #[error("no async runtime available to drive the subscription")]
    NoRuntime,

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
