//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into account use-cases.
//! - Keep callers decoupled from storage details and transactions.

pub mod account_registrar;
pub mod account_service;
