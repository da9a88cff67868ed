//! Flashcards with SM-2 spaced repetition
//!
//! This module provides:
//! - Card CRUD scoped per user, with a per-user card limit kept by atomic transactions
//! - SM-2 scheduling
//! - Due-card queries
//! - Review submission with bounded per-card history and an audit log

pub mod algorithm;
pub mod due;
pub mod errors;
pub mod models;
pub mod review;
pub mod storage;
pub mod transaction;

pub use due::DueIndex;
pub use errors::{CardError, Result};
pub use models::*;
pub use review::{ReviewLog, ReviewOrchestrator};
pub use storage::CardStore;
pub use transaction::{TransactionCoordinator, MAX_CARDS_PER_USER};
