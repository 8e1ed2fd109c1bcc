//! Change-stream mechanics shared by document stores and their consumers.
//!
//! A store delivers [`ChangeBatch`]es through a [`ChangeStream`]; consumers keep
//! local mirrors in sync by applying each [`DocumentChange`] in delivery order.

pub mod change;
pub mod stream;
pub mod tenant;

pub use change::{ChangeBatch, ChangeKind, DocumentChange};
pub use stream::{ChangeSender, ChangeStream, change_channel};
pub use tenant::TenantScoped;
