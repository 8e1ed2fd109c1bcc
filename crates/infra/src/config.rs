//! Configuration loading and representation.

use std::env;

use thiserror::Error;

use gestor_core::{DomainError, TenantId};

use crate::document_store::CollectionPath;
use crate::document_store::r#trait::{DEFAULT_TENANT_ROOT, validate_segment};

pub const TENANT_ROOT_VAR: &str = "GESTOR_TENANT_ROOT";
pub const PRICING_COLLECTION_VAR: &str = "GESTOR_PRICING_COLLECTION";

pub const DEFAULT_PRICING_COLLECTION: &str = "pricing_items";

/// Where tenant data lives in the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// First path segment of every tenant-scoped collection.
    pub tenant_root: String,
    /// Name of the pricing items collection under each tenant.
    pub pricing_collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            tenant_root: DEFAULT_TENANT_ROOT.to_string(),
            pricing_collection: DEFAULT_PRICING_COLLECTION.to_string(),
        }
    }
}

impl StoreConfig {
    /// Constructs the configuration from environment variables, falling back to
    /// defaults for unset values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`StoreConfig::from_env`] but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let tenant_root = lookup(TENANT_ROOT_VAR).unwrap_or(defaults.tenant_root);
        validate_segment("tenant root", &tenant_root).map_err(|_| ConfigError::InvalidSegment {
            var: TENANT_ROOT_VAR,
            value: tenant_root.clone(),
        })?;

        let pricing_collection =
            lookup(PRICING_COLLECTION_VAR).unwrap_or(defaults.pricing_collection);
        validate_segment("pricing collection", &pricing_collection).map_err(|_| {
            ConfigError::InvalidSegment {
                var: PRICING_COLLECTION_VAR,
                value: pricing_collection.clone(),
            }
        })?;

        Ok(Self {
            tenant_root,
            pricing_collection,
        })
    }

    /// The pricing items collection of `tenant_id`.
    pub fn pricing_collection_for(&self, tenant_id: TenantId) -> Result<CollectionPath, DomainError> {
        CollectionPath::new(
            self.tenant_root.clone(),
            tenant_id,
            self.pricing_collection.clone(),
        )
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a single non-empty path segment (got '{value}')")]
    InvalidSegment { var: &'static str, value: String },
}
