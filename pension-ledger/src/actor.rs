//! Actor-based concurrency for the ledger
//!
//! All mutating operations flow through one actor task (single-writer
//! pattern): the balance check and the subsequent append run back to back
//! inside the actor, so two concurrent transfers debiting the same sender
//! can never both validate against a stale pre-debit balance. Reads go
//! straight to storage; RocksDB `WriteBatch` atomicity guarantees a reader
//! never observes half a transfer.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │            Request handlers (out of scope)            │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ mpsc::channel (bounded)
//! ┌─────────────────────▼────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │   validate -> append (atomic WriteBatch) -> reply     │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::{
    balance,
    config::PolicyConfig,
    metrics::Metrics,
    types::{
        BulkContributionReceipt, ContributionReceipt, EmployeeContribution, Employer,
        EmployerPatch, EntryKind, NewEmployer, NewEntry, NewUser, TransferReceipt, User,
        UserPatch, WithdrawalReceipt,
    },
    Error, Result, Storage,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Record a worker deposit (principal + optional match + yield)
    Contribute {
        /// Contributing account
        user_id: Uuid,
        /// Deposit amount
        amount: Decimal,
        /// Payment rail label
        payment_method: String,
        /// Chain-mirror hash, if the side channel succeeded
        mirror_hash: Option<String>,
        /// Reply channel
        response: oneshot::Sender<Result<ContributionReceipt>>,
    },

    /// Employer payroll contribution for a batch of employees (no yield)
    BulkContribute {
        /// Account operating the employer
        employer_user_id: Uuid,
        /// Employee accounts to credit
        employee_ids: Vec<Uuid>,
        /// Per-employee contribution amount
        amount: Decimal,
        /// Reply channel
        response: oneshot::Sender<Result<BulkContributionReceipt>>,
    },

    /// Move value between two users as one atomic pair of entries
    Transfer {
        /// Sender account
        from_user_id: Uuid,
        /// Recipient selector (user id or email)
        to: String,
        /// Transfer amount
        amount: Decimal,
        /// Optional note stored on both entries
        note: Option<String>,
        /// Reply channel
        response: oneshot::Sender<Result<TransferReceipt>>,
    },

    /// Emergency withdrawal under the cap/penalty policy
    Withdraw {
        /// Withdrawing account
        user_id: Uuid,
        /// Gross amount to debit
        amount: Decimal,
        /// Optional reason stored on the entry
        reason: Option<String>,
        /// Chain-mirror hash, if the side channel succeeded
        mirror_hash: Option<String>,
        /// Reply channel
        response: oneshot::Sender<Result<WithdrawalReceipt>>,
    },

    /// Register a user
    CreateUser {
        /// Registration input
        input: NewUser,
        /// Reply channel
        response: oneshot::Sender<Result<User>>,
    },

    /// Onboard an employer
    CreateEmployer {
        /// Onboarding input
        input: NewEmployer,
        /// Reply channel
        response: oneshot::Sender<Result<Employer>>,
    },

    /// Patch a user's mutable profile fields
    UpdateUser {
        /// Target user
        user_id: Uuid,
        /// Fields to change
        patch: UserPatch,
        /// Reply channel
        response: oneshot::Sender<Result<User>>,
    },

    /// Patch an employer's mutable fields
    UpdateEmployer {
        /// Target employer
        employer_id: Uuid,
        /// Fields to change
        patch: EmployerPatch,
        /// Reply channel
        response: oneshot::Sender<Result<Employer>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger messages
pub struct LedgerActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Policy constants
    policy: PolicyConfig,

    /// Metrics collector
    metrics: Metrics,

    /// RNG for the stochastic yield bonus
    rng: StdRng,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<LedgerMessage>,
        policy: PolicyConfig,
        metrics: Metrics,
    ) -> Self {
        Self {
            storage,
            mailbox,
            policy,
            metrics,
            rng: StdRng::from_entropy(),
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown => break,
                _ => self.handle_message(msg),
            }
        }
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::Contribute {
                user_id,
                amount,
                payment_method,
                mirror_hash,
                response,
            } => {
                let result = self.contribute(user_id, amount, payment_method, mirror_hash);
                let _ = response.send(result);
            }

            LedgerMessage::BulkContribute {
                employer_user_id,
                employee_ids,
                amount,
                response,
            } => {
                let result = self.bulk_contribute(employer_user_id, &employee_ids, amount);
                let _ = response.send(result);
            }

            LedgerMessage::Transfer {
                from_user_id,
                to,
                amount,
                note,
                response,
            } => {
                let result = self.transfer(from_user_id, &to, amount, note);
                let _ = response.send(result);
            }

            LedgerMessage::Withdraw {
                user_id,
                amount,
                reason,
                mirror_hash,
                response,
            } => {
                let result = self.withdraw(user_id, amount, reason, mirror_hash);
                let _ = response.send(result);
            }

            LedgerMessage::CreateUser { input, response } => {
                let _ = response.send(self.storage.create_user(input));
            }

            LedgerMessage::CreateEmployer { input, response } => {
                let _ = response.send(self.storage.create_employer(input));
            }

            LedgerMessage::UpdateUser {
                user_id,
                patch,
                response,
            } => {
                let _ = response.send(self.storage.update_user(user_id, patch));
            }

            LedgerMessage::UpdateEmployer {
                employer_id,
                patch,
                response,
            } => {
                let _ = response.send(self.storage.update_employer(employer_id, patch));
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    fn validate_amount(&self, amount: Decimal) -> Result<()> {
        if amount < self.policy.minimum_amount {
            self.metrics.record_rejection();
            return Err(Error::Validation(format!(
                "Amount must be at least {}, got {}",
                self.policy.minimum_amount, amount
            )));
        }
        Ok(())
    }

    // Contribution engine

    fn contribute(
        &mut self,
        user_id: Uuid,
        amount: Decimal,
        payment_method: String,
        mirror_hash: Option<String>,
    ) -> Result<ContributionReceipt> {
        self.validate_amount(amount)?;
        let user = self.storage.find_user(user_id)?;

        let mut inputs = Vec::with_capacity(3);

        let mut principal =
            NewEntry::new(user_id, EntryKind::Contribution, amount, &payment_method);
        principal.tx_token = mirror_hash;
        inputs.push(principal);

        let has_match = match user.current_employer_id {
            Some(employer_id) => {
                let employer = self.storage.find_employer(employer_id)?;
                let match_amount = employer.match_amount(amount);
                let mut matched =
                    NewEntry::new(user_id, EntryKind::Match, match_amount, "employer");
                matched.employer_match = match_amount;
                matched.employer_id = Some(employer.id);
                inputs.push(matched);
                true
            }
            None => false,
        };

        let bonus = yield_bonus(amount, &self.policy, &mut self.rng);
        inputs.push(NewEntry::new(user_id, EntryKind::Yield, bonus, "defi"));

        let started = Instant::now();
        let mut stored = self.storage.append_entries(inputs)?;
        self.metrics
            .record_append_duration(started.elapsed().as_secs_f64());
        self.metrics.record_entries_appended(stored.len());

        let yield_bonus_entry = stored.pop().ok_or_else(|| {
            Error::InvariantViolation("Contribution batch came back empty".to_string())
        })?;
        let employer_match = if has_match { stored.pop() } else { None };
        let contribution = stored.pop().ok_or_else(|| {
            Error::InvariantViolation("Contribution batch missing principal".to_string())
        })?;

        let total_added = contribution.amount
            + employer_match.as_ref().map_or(Decimal::ZERO, |e| e.amount)
            + yield_bonus_entry.amount;

        tracing::info!(
            %user_id,
            %amount,
            matched = has_match,
            %total_added,
            "Contribution recorded"
        );

        Ok(ContributionReceipt {
            contribution,
            employer_match,
            yield_bonus: yield_bonus_entry,
            total_added,
        })
    }

    // Employer bulk contribution (match logic without the yield step)

    fn bulk_contribute(
        &mut self,
        employer_user_id: Uuid,
        employee_ids: &[Uuid],
        amount: Decimal,
    ) -> Result<BulkContributionReceipt> {
        self.validate_amount(amount)?;
        let employer = self.storage.find_employer_by_owner(employer_user_id)?;
        let match_amount = employer.match_amount(amount);

        let mut inputs = Vec::new();
        let mut credited = Vec::new();
        let mut skipped = Vec::new();

        for &employee_id in employee_ids {
            match self.storage.find_user(employee_id) {
                Ok(_) => {
                    let mut principal =
                        NewEntry::new(employee_id, EntryKind::Contribution, amount, "employer");
                    principal.employer_id = Some(employer.id);
                    inputs.push(principal);

                    let mut matched =
                        NewEntry::new(employee_id, EntryKind::Match, match_amount, "employer");
                    matched.employer_match = match_amount;
                    matched.employer_id = Some(employer.id);
                    inputs.push(matched);

                    credited.push(employee_id);
                }
                Err(Error::NotFound(_)) => skipped.push(employee_id),
                Err(e) => return Err(e),
            }
        }

        let started = Instant::now();
        let stored = self.storage.append_entries(inputs)?;
        self.metrics
            .record_append_duration(started.elapsed().as_secs_f64());
        self.metrics.record_entries_appended(stored.len());

        let contributions: Vec<EmployeeContribution> = credited
            .iter()
            .zip(stored.chunks_exact(2))
            .map(|(&user_id, pair)| EmployeeContribution {
                user_id,
                contribution: pair[0].clone(),
                employer_match: pair[1].clone(),
            })
            .collect();

        let total_contributed: Decimal = stored.iter().map(|e| e.amount).sum();

        tracing::info!(
            employer_id = %employer.id,
            credited = contributions.len(),
            skipped = skipped.len(),
            %total_contributed,
            "Bulk contribution recorded"
        );

        Ok(BulkContributionReceipt {
            employer_id: employer.id,
            contributions,
            skipped,
            total_contributed,
        })
    }

    // Transfer engine

    fn transfer(
        &mut self,
        from_user_id: Uuid,
        to: &str,
        amount: Decimal,
        note: Option<String>,
    ) -> Result<TransferReceipt> {
        self.validate_amount(amount)?;
        let sender = self.storage.find_user(from_user_id)?;
        let recipient = self.storage.resolve_user(to)?;

        if recipient.id == sender.id {
            self.metrics.record_rejection();
            return Err(Error::Validation(
                "Cannot transfer to your own account".to_string(),
            ));
        }

        // Check-then-append runs inside the single writer, so this read
        // cannot go stale before the append below.
        let entries = self
            .storage
            .entries_for_user(sender.id, &Default::default())?;
        let available = balance::available_for_transfer(&entries);
        if amount > available {
            self.metrics.record_rejection();
            return Err(Error::InsufficientBalance { available });
        }

        let token = Uuid::new_v4().simple().to_string();

        let mut debit = NewEntry::new(sender.id, EntryKind::TransferOut, amount, "internal");
        debit.tx_token = Some(token.clone());
        debit.note = note.clone();
        let mut credit = NewEntry::new(recipient.id, EntryKind::TransferIn, amount, "internal");
        credit.tx_token = Some(token.clone());
        credit.note = note.clone();

        let started = Instant::now();
        let stored = self.storage.append_entries(vec![debit, credit])?;
        self.metrics
            .record_append_duration(started.elapsed().as_secs_f64());
        self.metrics.record_entries_appended(stored.len());
        self.metrics.record_transfer();

        tracing::info!(
            from = %sender.id,
            to = %recipient.id,
            %amount,
            token = %token,
            "Transfer recorded"
        );

        Ok(TransferReceipt {
            token,
            from: sender.party(),
            to: recipient.party(),
            amount,
            note,
            created_at: stored[0].created_at,
        })
    }

    // Withdrawal engine

    fn withdraw(
        &mut self,
        user_id: Uuid,
        amount: Decimal,
        reason: Option<String>,
        mirror_hash: Option<String>,
    ) -> Result<WithdrawalReceipt> {
        self.validate_amount(amount)?;
        self.storage.find_user(user_id)?;

        let entries = self.storage.entries_for_user(user_id, &Default::default())?;
        let available = balance::available_for_withdrawal(&entries);
        let cap = available * self.policy.withdrawal_cap_ratio;
        if amount > cap {
            self.metrics.record_rejection();
            return Err(Error::WithdrawalCapExceeded { cap, available });
        }

        // Penalty is informational: the ledger records the gross amount,
        // only the net conceptually reaches the user.
        let penalty = (amount * self.policy.withdrawal_penalty_ratio)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let net = amount - penalty;
        let remaining_balance = balance::net_balance(&entries) - amount;

        let mut withdrawal =
            NewEntry::new(user_id, EntryKind::Withdrawal, amount, "bank_transfer");
        withdrawal.tx_token = mirror_hash;
        withdrawal.note = reason;

        let started = Instant::now();
        let entry = self.storage.append_entry(withdrawal)?;
        self.metrics
            .record_append_duration(started.elapsed().as_secs_f64());
        self.metrics.record_entries_appended(1);
        self.metrics.record_withdrawal();

        tracing::info!(%user_id, gross = %amount, %penalty, %net, "Withdrawal recorded");

        Ok(WithdrawalReceipt {
            gross: amount,
            penalty,
            net,
            remaining_balance,
            entry,
        })
    }
}

/// Stochastic yield bonus for a contribution
///
/// A fraction of the contribution drawn uniformly from the configured
/// range (0.1%-0.4% by default), rounded to 2 decimals. Models an
/// instantaneous simulated investment return.
pub fn yield_bonus(amount: Decimal, policy: &PolicyConfig, rng: &mut impl Rng) -> Decimal {
    let min = policy.yield_bonus_min_ratio.to_f64().unwrap_or(0.001);
    let max = policy.yield_bonus_max_ratio.to_f64().unwrap_or(0.004);
    let ratio = rng.gen_range(min..=max);
    let ratio = Decimal::from_f64(ratio).unwrap_or(policy.yield_bonus_min_ratio);
    (amount * ratio).round_dp(2)
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Record a contribution
    pub async fn contribute(
        &self,
        user_id: Uuid,
        amount: Decimal,
        payment_method: String,
        mirror_hash: Option<String>,
    ) -> Result<ContributionReceipt> {
        self.request(|response| LedgerMessage::Contribute {
            user_id,
            amount,
            payment_method,
            mirror_hash,
            response,
        })
        .await
    }

    /// Record an employer bulk contribution
    pub async fn bulk_contribute(
        &self,
        employer_user_id: Uuid,
        employee_ids: Vec<Uuid>,
        amount: Decimal,
    ) -> Result<BulkContributionReceipt> {
        self.request(|response| LedgerMessage::BulkContribute {
            employer_user_id,
            employee_ids,
            amount,
            response,
        })
        .await
    }

    /// Execute a transfer
    pub async fn transfer(
        &self,
        from_user_id: Uuid,
        to: String,
        amount: Decimal,
        note: Option<String>,
    ) -> Result<TransferReceipt> {
        self.request(|response| LedgerMessage::Transfer {
            from_user_id,
            to,
            amount,
            note,
            response,
        })
        .await
    }

    /// Execute a withdrawal
    pub async fn withdraw(
        &self,
        user_id: Uuid,
        amount: Decimal,
        reason: Option<String>,
        mirror_hash: Option<String>,
    ) -> Result<WithdrawalReceipt> {
        self.request(|response| LedgerMessage::Withdraw {
            user_id,
            amount,
            reason,
            mirror_hash,
            response,
        })
        .await
    }

    /// Register a user
    pub async fn create_user(&self, input: NewUser) -> Result<User> {
        self.request(|response| LedgerMessage::CreateUser { input, response })
            .await
    }

    /// Onboard an employer
    pub async fn create_employer(&self, input: NewEmployer) -> Result<Employer> {
        self.request(|response| LedgerMessage::CreateEmployer { input, response })
            .await
    }

    /// Patch a user
    pub async fn update_user(&self, user_id: Uuid, patch: UserPatch) -> Result<User> {
        self.request(|response| LedgerMessage::UpdateUser {
            user_id,
            patch,
            response,
        })
        .await
    }

    /// Patch an employer
    pub async fn update_employer(
        &self,
        employer_id: Uuid,
        patch: EmployerPatch,
    ) -> Result<Employer> {
        self.request(|response| LedgerMessage::UpdateEmployer {
            employer_id,
            patch,
            response,
        })
        .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    storage: Arc<Storage>,
    policy: PolicyConfig,
    metrics: Metrics,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(1000); // Bounded channel for backpressure
    let actor = LedgerActor::new(storage, rx, policy, metrics);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use crate::Config;

    fn spawn_test_actor() -> (LedgerHandle, Arc<Storage>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();

        let storage = Arc::new(Storage::open(&config).unwrap());
        let handle = spawn_ledger_actor(
            storage.clone(),
            config.policy.clone(),
            Metrics::new().unwrap(),
        );
        (handle, storage, temp_dir)
    }

    fn register(storage: &Storage, email: &str) -> User {
        storage
            .create_user(NewUser {
                email: email.to_string(),
                name: email.split('@').next().unwrap().to_string(),
                age: Some(30),
                role: Role::Worker,
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (handle, _storage, _temp) = spawn_test_actor();
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_contribute() {
        let (handle, storage, _temp) = spawn_test_actor();
        let user = register(&storage, "asha@example.com");

        let receipt = handle
            .contribute(user.id, Decimal::from(100), "upi".to_string(), None)
            .await
            .unwrap();

        assert_eq!(receipt.contribution.amount, Decimal::from(100));
        assert!(receipt.employer_match.is_none());
        assert!(receipt.yield_bonus.amount >= Decimal::new(10, 2));
        assert!(receipt.yield_bonus.amount <= Decimal::new(40, 2));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_transfers_cannot_overdraw() {
        let (handle, storage, _temp) = spawn_test_actor();
        let alice = register(&storage, "alice@example.com");
        let bob = register(&storage, "bob@example.com");

        storage
            .append_entry(NewEntry::new(
                alice.id,
                EntryKind::Contribution,
                Decimal::from(10),
                "upi",
            ))
            .unwrap();

        // Five racing transfers, each for the full balance; exactly one
        // may pass the availability check.
        let mut tasks = Vec::new();
        for _ in 0..5 {
            let handle = handle.clone();
            let to = bob.id.to_string();
            tasks.push(tokio::spawn(async move {
                handle
                    .transfer(alice.id, to, Decimal::from(10), None)
                    .await
            }));
        }

        let mut successes = 0;
        let mut shortfalls = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(Error::InsufficientBalance { .. }) => shortfalls += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(shortfalls, 4);

        let alice_entries = storage
            .entries_for_user(alice.id, &Default::default())
            .unwrap();
        assert!(balance::net_balance(&alice_entries) >= Decimal::ZERO);

        handle.shutdown().await.unwrap();
    }

    #[test]
    fn test_yield_bonus_range_and_rounding() {
        let policy = PolicyConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let bonus = yield_bonus(Decimal::from(100), &policy, &mut rng);
            assert!(bonus >= Decimal::new(10, 2), "bonus {} below 0.10", bonus);
            assert!(bonus <= Decimal::new(40, 2), "bonus {} above 0.40", bonus);
            assert_eq!(bonus, bonus.round_dp(2));
        }
    }
}
