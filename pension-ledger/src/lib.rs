//! PensionRail Ledger
//!
//! Append-only contribution ledger for micro-pension accounts.
//!
//! # Architecture
//!
//! - **Event Sourcing**: Balances are derived from immutable entries
//! - **Single Writer**: One logical writer task eliminates race conditions
//! - **Atomic Batches**: Multi-entry operations commit in one write batch
//! - **Derived Reads**: No stored balances; every read folds the log
//!
//! # Invariants
//!
//! - Entries are never modified or deleted after append
//! - Transfers conserve value: the debit and credit land atomically
//! - No operation may drive a balance negative
//! - Withdrawals are capped at half of a user's own accumulated funds

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod balance;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod mirror;
pub mod projection;
pub mod storage;
pub mod types;

// Re-exports
pub use config::{Config, MirrorConfig, PolicyConfig};
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use mirror::{ChainMirror, NoopMirror};
pub use storage::Storage;
pub use types::{
    BulkContributionReceipt, ContributionReceipt, Employer, EmployerPatch, Entry, EntryKind,
    EntryQuery, NewEmployer, NewEntry, NewUser, Role, TransferDirection, TransferReceipt,
    TransferRecord, User, UserPatch, WithdrawalReceipt,
};
