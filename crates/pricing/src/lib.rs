//! `gestor-pricing`: the pricing table of a tenant, mirrored locally.
//!
//! [`PricingCache`] subscribes to the tenant's pricing items collection, keeps an
//! ordered in-memory copy current by reconciling change batches, and writes back
//! through atomic batches. Writes never touch the local copy directly: it converges
//! when the store reports the resulting changes.

pub mod cache;
pub mod error;
pub mod item;
pub mod reconcile;

pub use cache::{PricingCache, SaveOutcome};
pub use error::PricingError;
pub use item::{ItemId, ItemKey, Price, PriceItem, retain_persistable};
pub use reconcile::{Applied, ReconcileSummary};
