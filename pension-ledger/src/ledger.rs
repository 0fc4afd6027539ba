//! Main ledger orchestration layer
//!
//! This module ties together storage, the single-writer actor, and the
//! optional chain mirror into a high-level API for pension accounting.
//!
//! # Example
//!
//! ```no_run
//! use pension_ledger::{Config, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> pension_ledger::Result<()> {
//!     let config = Config::default();
//!     let ledger = Ledger::open(config).await?;
//!
//!     // let receipt = ledger.contribute(user_id, amount, "upi").await?;
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    balance,
    metrics::Metrics,
    mirror::{mirror_or_log, ChainMirror},
    projection::{self, ProjectionInput, ProjectionOutcome, Scenario},
    types::{
        BulkContributionReceipt, ContributionReceipt, Employer, EmployerPatch, Entry, EntryKind,
        EntryQuery, NewEmployer, NewUser, TransferDirection, TransferReceipt, TransferRecord,
        User, UserPatch, WithdrawalReceipt,
    },
    Config, Error, Result, Storage,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Main ledger interface
///
/// Mutations go through the actor handle (serialized, atomic appends);
/// reads recompute from storage on every call, so they can never diverge
/// from the entry log.
pub struct Ledger {
    /// Actor handle for mutating operations
    handle: LedgerHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Optional chain mirror side channel
    mirror: Option<Arc<dyn ChainMirror>>,

    /// Metrics collector
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        let handle = spawn_ledger_actor(storage.clone(), config.policy.clone(), metrics.clone());

        Ok(Self {
            handle,
            storage,
            mirror: None,
            metrics,
            config,
        })
    }

    /// Attach a chain mirror side channel
    pub fn with_mirror(mut self, mirror: Arc<dyn ChainMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Metrics collector (for scraping)
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }

    // Registry operations

    /// Register a new user
    pub async fn create_user(&self, input: NewUser) -> Result<User> {
        self.handle.create_user(input).await
    }

    /// Onboard a new employer
    pub async fn create_employer(&self, input: NewEmployer) -> Result<Employer> {
        self.handle.create_employer(input).await
    }

    /// Patch a user's mutable profile fields
    pub async fn update_user(&self, user_id: Uuid, patch: UserPatch) -> Result<User> {
        self.handle.update_user(user_id, patch).await
    }

    /// Patch an employer's mutable fields
    pub async fn update_employer(
        &self,
        employer_id: Uuid,
        patch: EmployerPatch,
    ) -> Result<Employer> {
        self.handle.update_employer(employer_id, patch).await
    }

    /// Get user by ID
    pub fn find_user(&self, user_id: Uuid) -> Result<User> {
        self.storage.find_user(user_id)
    }

    /// Get user by email
    pub fn find_user_by_email(&self, email: &str) -> Result<User> {
        self.storage.find_user_by_email(email)
    }

    /// All users except the given one (recipient pickers)
    pub fn list_users_except(&self, user_id: Uuid) -> Result<Vec<User>> {
        self.storage.list_users_except(user_id)
    }

    /// Get employer by ID
    pub fn find_employer(&self, employer_id: Uuid) -> Result<Employer> {
        self.storage.find_employer(employer_id)
    }

    /// Get employer by operating account
    pub fn find_employer_by_owner(&self, user_id: Uuid) -> Result<Employer> {
        self.storage.find_employer_by_owner(user_id)
    }

    // Mutating engines

    /// Record a worker deposit with its derived match and yield entries
    ///
    /// If a chain mirror is attached and enabled, one bounded attempt is
    /// made first; its hash (if any) is stored on the contribution entry.
    /// Mirror failure never blocks the local append.
    pub async fn contribute(
        &self,
        user_id: Uuid,
        amount: Decimal,
        payment_method: &str,
    ) -> Result<ContributionReceipt> {
        let mirror_hash = self.try_mirror(user_id, amount).await;
        self.handle
            .contribute(user_id, amount, payment_method.to_string(), mirror_hash)
            .await
    }

    /// Employer payroll contribution for a batch of employees (no yield)
    pub async fn bulk_contribute(
        &self,
        employer_user_id: Uuid,
        employee_ids: &[Uuid],
        amount: Decimal,
    ) -> Result<BulkContributionReceipt> {
        self.handle
            .bulk_contribute(employer_user_id, employee_ids.to_vec(), amount)
            .await
    }

    /// Move value to another user (selector is a user id or email)
    pub async fn transfer(
        &self,
        from_user_id: Uuid,
        to: &str,
        amount: Decimal,
        note: Option<String>,
    ) -> Result<TransferReceipt> {
        self.handle
            .transfer(from_user_id, to.to_string(), amount, note)
            .await
    }

    /// Emergency withdrawal under the cap/penalty policy
    pub async fn withdraw(
        &self,
        user_id: Uuid,
        amount: Decimal,
        reason: Option<String>,
    ) -> Result<WithdrawalReceipt> {
        let mirror_hash = self.try_mirror(user_id, amount).await;
        self.handle
            .withdraw(user_id, amount, reason, mirror_hash)
            .await
    }

    async fn try_mirror(&self, user_id: Uuid, amount: Decimal) -> Option<String> {
        if !self.config.mirror.enabled {
            return None;
        }
        let mirror = self.mirror.as_ref()?;
        let timeout = Duration::from_millis(self.config.mirror.timeout_ms);
        mirror_or_log(mirror.as_ref(), user_id, amount, timeout, &self.metrics).await
    }

    // Read side (always recomputed from the entry log)

    /// Current net balance
    pub fn balance(&self, user_id: Uuid) -> Result<Decimal> {
        self.storage.find_user(user_id)?;
        let entries = self.storage.entries_for_user(user_id, &EntryQuery::default())?;
        Ok(balance::net_balance(&entries))
    }

    /// Net sum over the given kinds since a timestamp (inclusive)
    pub fn sum_since(
        &self,
        user_id: Uuid,
        kinds: &[EntryKind],
        since: DateTime<Utc>,
    ) -> Result<Decimal> {
        let entries = self.storage.entries_for_user(user_id, &EntryQuery::default())?;
        Ok(balance::sum_since(&entries, kinds, since))
    }

    /// Query a user's entries
    pub fn entries(&self, user_id: Uuid, query: &EntryQuery) -> Result<Vec<Entry>> {
        self.storage.entries_for_user(user_id, query)
    }

    /// Approximate total entry count (RocksDB estimate, for startup logs
    /// and dashboards)
    pub fn entry_count(&self) -> Result<u64> {
        self.storage.approximate_entry_count()
    }

    /// Transfer history with counterpart identities resolved via the
    /// shared correlation token
    pub fn transfer_history(&self, user_id: Uuid) -> Result<Vec<TransferRecord>> {
        let transfers = self.storage.entries_for_user(
            user_id,
            &EntryQuery::kinds(&[EntryKind::TransferIn, EntryKind::TransferOut]),
        )?;

        let mut records = Vec::with_capacity(transfers.len());
        for entry in transfers {
            let token = entry.tx_token.clone().ok_or_else(|| {
                Error::InvariantViolation(format!("Transfer entry {} has no token", entry.id))
            })?;

            let counterpart = self
                .storage
                .entries_for_token(&token)?
                .into_iter()
                .find(|e| e.id != entry.id && e.user_id != entry.user_id)
                .ok_or_else(|| {
                    Error::InvariantViolation(format!("Unpaired transfer entry {}", entry.id))
                })?;

            let other = self.storage.find_user(counterpart.user_id)?;
            let direction = match entry.kind {
                EntryKind::TransferOut => TransferDirection::Sent,
                _ => TransferDirection::Received,
            };

            records.push(TransferRecord {
                direction,
                amount: entry.amount,
                other_party: other.party(),
                created_at: entry.created_at,
                token,
            });
        }

        Ok(records)
    }

    /// Retirement projection for a user
    ///
    /// `scenarios` of `None` uses the standard three-scenario view.
    pub fn projection(
        &self,
        user_id: Uuid,
        scenarios: Option<&[Scenario]>,
    ) -> Result<Vec<ProjectionOutcome>> {
        let user = self.storage.find_user(user_id)?;
        let entries = self.storage.entries_for_user(user_id, &EntryQuery::default())?;

        let input = ProjectionInput {
            balance: balance::net_balance(&entries),
            age: user.age,
            account_age_days: (Utc::now() - user.created_at).num_days(),
            has_contributions: entries.iter().any(|e| e.kind == EntryKind::Contribution),
        };

        let defaults;
        let scenarios = match scenarios {
            Some(s) => s,
            None => {
                defaults = projection::default_scenarios();
                &defaults
            }
        };

        Ok(projection::project(&input, scenarios, &self.config.policy))
    }
}
