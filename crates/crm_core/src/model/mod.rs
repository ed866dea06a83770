//! CRM domain model.
//!
//! # Responsibility
//! - Define the records the account core persists and validates.
//! - Keep pure business rules (validation, display helpers) next to the data.
//!
//! # Invariants
//! - Deletion is a `deleted_at` tombstone, never a physical delete.
//! - Polymorphic links (permissions, tasks, comments) go through `AssetRef`.

pub mod account;
pub mod asset;
pub mod association;
pub mod lead;
pub mod task;
pub mod user;
