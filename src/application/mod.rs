//! Application layer containing the purchase coordination logic.
//!
//! `BillingCoordinator` is the entry point. It follows an actor pattern: one
//! `tokio` task owns the catalog cache, the open transactions and the fetched
//! purchase history, and every provider callback is funnelled back to it
//! through a channel. The other modules are the synchronous pieces that task
//! drives.

pub mod catalog;
pub mod coordinator;
pub mod purchase;
pub mod registry;
pub mod restore;
