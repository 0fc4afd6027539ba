//! Core types for the pension ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for money)
//! - Append-only entries (an `Entry` is never mutated after storage)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of ledger entry
///
/// The six kinds split into credits (money flowing into an account) and
/// debits (money flowing out). Balances are derived by folding entries
/// with [`EntryKind::is_credit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryKind {
    /// Worker deposit
    Contribution = 1,
    /// Employer match paired with a contribution
    Match = 2,
    /// Simulated investment return credited on contribution
    Yield = 3,
    /// Emergency withdrawal (gross amount)
    Withdrawal = 4,
    /// Incoming side of a transfer
    TransferIn = 5,
    /// Outgoing side of a transfer
    TransferOut = 6,
}

impl EntryKind {
    /// All entry kinds, in discriminant order
    pub const ALL: [EntryKind; 6] = [
        EntryKind::Contribution,
        EntryKind::Match,
        EntryKind::Yield,
        EntryKind::Withdrawal,
        EntryKind::TransferIn,
        EntryKind::TransferOut,
    ];

    /// Whether this kind credits the owning account
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            EntryKind::Contribution | EntryKind::Match | EntryKind::Yield | EntryKind::TransferIn
        )
    }

    /// Stable lowercase label, used for display and logging
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Contribution => "contribution",
            EntryKind::Match => "match",
            EntryKind::Yield => "yield",
            EntryKind::Withdrawal => "withdrawal",
            EntryKind::TransferIn => "transfer_in",
            EntryKind::TransferOut => "transfer_out",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// An immutable ledger entry
///
/// Once appended, an entry is never mutated or deleted. Corrections are
/// modeled as new offsetting entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Unique entry ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Store-assigned sequence number; strictly increasing, the
    /// insertion-order tie-break when two entries share a timestamp
    pub seq: u64,

    /// Owning account
    pub user_id: Uuid,

    /// Non-negative amount; the sign is implied by [`EntryKind`]
    pub amount: Decimal,

    /// Informational sub-amount; zero unless kind is `Match`, where it
    /// equals `amount`
    pub employer_match: Decimal,

    /// Entry kind
    pub kind: EntryKind,

    /// Free-form payment rail label (`upi`, `employer`, `defi`, ...);
    /// display-only, no behavior depends on it
    pub payment_method: String,

    /// Correlation token. A transfer's two entries share one token; for
    /// contributions/withdrawals this may carry a chain-mirror hash.
    pub tx_token: Option<String>,

    /// Employer whose match/contribution context produced this entry
    pub employer_id: Option<Uuid>,

    /// Caller-supplied note (transfer note, withdrawal reason)
    pub note: Option<String>,

    /// Creation timestamp; the sort key for all queries
    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// Amount signed by kind: positive for credits, negative for debits
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}

/// Input for appending an entry; the store assigns `id`, `seq`, and
/// `created_at` (when absent)
#[derive(Debug, Clone)]
pub struct NewEntry {
    /// Owning account
    pub user_id: Uuid,
    /// Non-negative amount
    pub amount: Decimal,
    /// Informational match sub-amount
    pub employer_match: Decimal,
    /// Entry kind
    pub kind: EntryKind,
    /// Payment rail label
    pub payment_method: String,
    /// Correlation token
    pub tx_token: Option<String>,
    /// Employer link
    pub employer_id: Option<Uuid>,
    /// Caller-supplied note
    pub note: Option<String>,
    /// Explicit timestamp; `None` means "now"
    pub created_at: Option<DateTime<Utc>>,
}

impl NewEntry {
    /// Plain entry of the given kind with defaults for the optional fields
    pub fn new(user_id: Uuid, kind: EntryKind, amount: Decimal, payment_method: &str) -> Self {
        Self {
            user_id,
            amount,
            employer_match: Decimal::ZERO,
            kind,
            payment_method: payment_method.to_string(),
            tx_token: None,
            employer_id: None,
            note: None,
            created_at: None,
        }
    }
}

/// Filter for entry queries; all fields optional
#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
    /// Restrict to these kinds (`None` = all kinds)
    pub kinds: Option<Vec<EntryKind>>,
    /// Inclusive lower bound on `created_at`
    pub since: Option<DateTime<Utc>>,
    /// Maximum number of entries to return
    pub limit: Option<usize>,
    /// Number of entries to skip (after sorting)
    pub offset: usize,
}

impl EntryQuery {
    /// Restrict to a set of kinds
    pub fn kinds(kinds: &[EntryKind]) -> Self {
        Self {
            kinds: Some(kinds.to_vec()),
            ..Self::default()
        }
    }

    fn matches_kind(&self, kind: EntryKind) -> bool {
        match &self.kinds {
            Some(kinds) => kinds.contains(&kind),
            None => true,
        }
    }

    /// Whether an entry passes the kind and since filters
    pub fn matches(&self, entry: &Entry) -> bool {
        if !self.matches_kind(entry.kind) {
            return false;
        }
        match self.since {
            Some(since) => entry.created_at >= since,
            None => true,
        }
    }
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Regular worker making contributions
    Worker,
    /// Account operating an employer
    Employer,
}

/// Investment risk appetite, informational only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskProfile {
    /// Capital preservation
    Low,
    /// Balanced
    Moderate,
    /// Growth
    High,
}

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,
    /// Unique email, immutable after registration
    pub email: String,
    /// Display name
    pub name: String,
    /// Age in years; `None` falls back to the configured default
    pub age: Option<u32>,
    /// Declared monthly income, informational
    pub income: Option<Decimal>,
    /// Risk appetite
    pub risk_profile: Option<RiskProfile>,
    /// Account role
    pub role: Role,
    /// Active employer for auto-match purposes
    pub current_employer_id: Option<Uuid>,
    /// Linked on-chain wallet, if any
    pub wallet_address: Option<String>,
    /// Registration timestamp; used to compute tenure for projections
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Public identity exposed in transfer receipts and history
    pub fn party(&self) -> Party {
        Party {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Registration input for a new user
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Unique email
    pub email: String,
    /// Display name
    pub name: String,
    /// Age in years
    pub age: Option<u32>,
    /// Account role
    pub role: Role,
}

/// Mutable profile fields of a [`User`]; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    /// New display name
    pub name: Option<String>,
    /// New age
    pub age: Option<u32>,
    /// New declared income
    pub income: Option<Decimal>,
    /// New risk appetite
    pub risk_profile: Option<RiskProfile>,
    /// Employer linkage; `Some(None)` detaches the user
    pub current_employer_id: Option<Option<Uuid>>,
    /// Wallet linkage; `Some(None)` unlinks
    pub wallet_address: Option<Option<String>>,
}

impl UserPatch {
    /// Apply to a user in place; entries are never touched
    pub fn apply(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(age) = self.age {
            user.age = Some(age);
        }
        if let Some(income) = self.income {
            user.income = Some(income);
        }
        if let Some(risk) = self.risk_profile {
            user.risk_profile = Some(risk);
        }
        if let Some(employer) = self.current_employer_id {
            user.current_employer_id = employer;
        }
        if let Some(wallet) = self.wallet_address {
            user.wallet_address = wallet;
        }
    }
}

/// An employer, itself operated by a [`User`] with role `Employer`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employer {
    /// Unique employer ID
    pub id: Uuid,
    /// Company display name
    pub company_name: String,
    /// Match percentage (0-100) applied to worker contributions
    pub match_percentage: Decimal,
    /// Operating account
    pub user_id: Uuid,
    /// Onboarding timestamp
    pub created_at: DateTime<Utc>,
}

impl Employer {
    /// Match amount for a given contribution
    pub fn match_amount(&self, contribution: Decimal) -> Decimal {
        contribution * self.match_percentage / Decimal::ONE_HUNDRED
    }
}

/// Onboarding input for a new employer
#[derive(Debug, Clone)]
pub struct NewEmployer {
    /// Company display name
    pub company_name: String,
    /// Match percentage (0-100)
    pub match_percentage: Decimal,
    /// Operating account
    pub user_id: Uuid,
}

/// Mutable fields of an [`Employer`]
#[derive(Debug, Clone, Default)]
pub struct EmployerPatch {
    /// New company name
    pub company_name: Option<String>,
    /// New match percentage (0-100)
    pub match_percentage: Option<Decimal>,
}

impl EmployerPatch {
    /// Apply to an employer in place
    pub fn apply(self, employer: &mut Employer) {
        if let Some(name) = self.company_name {
            employer.company_name = name;
        }
        if let Some(pct) = self.match_percentage {
            employer.match_percentage = pct;
        }
    }
}

/// Public identity of a transfer party
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    /// User ID
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Email
    pub email: String,
}

/// Result of a successful contribution
#[derive(Debug, Clone)]
pub struct ContributionReceipt {
    /// The principal entry
    pub contribution: Entry,
    /// The paired employer match, absent when the user has no employer
    pub employer_match: Option<Entry>,
    /// The stochastic yield bonus
    pub yield_bonus: Entry,
    /// Sum of all entries appended by this contribution
    pub total_added: Decimal,
}

/// One employee's slice of a bulk contribution
#[derive(Debug, Clone)]
pub struct EmployeeContribution {
    /// Employee account
    pub user_id: Uuid,
    /// Principal entry
    pub contribution: Entry,
    /// Paired employer match
    pub employer_match: Entry,
}

/// Result of an employer bulk contribution
#[derive(Debug, Clone)]
pub struct BulkContributionReceipt {
    /// Contributing employer
    pub employer_id: Uuid,
    /// Per-employee entries, in request order
    pub contributions: Vec<EmployeeContribution>,
    /// Employee ids that did not resolve to a user; the rest of the
    /// batch proceeds without them
    pub skipped: Vec<Uuid>,
    /// Total value appended (contributions plus matches)
    pub total_contributed: Decimal,
}

/// Direction of a transfer relative to the queried user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDirection {
    /// The user was the sender
    Sent,
    /// The user was the recipient
    Received,
}

/// Result of a successful transfer
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    /// Correlation token shared by the debit and credit entries
    pub token: String,
    /// Sender identity
    pub from: Party,
    /// Recipient identity
    pub to: Party,
    /// Transferred amount
    pub amount: Decimal,
    /// Caller-supplied note
    pub note: Option<String>,
    /// Timestamp of both entries
    pub created_at: DateTime<Utc>,
}

/// One item of a user's transfer history
#[derive(Debug, Clone)]
pub struct TransferRecord {
    /// Sent or received
    pub direction: TransferDirection,
    /// Transferred amount
    pub amount: Decimal,
    /// The opposite party, resolved via the shared token
    pub other_party: Party,
    /// When the transfer happened
    pub created_at: DateTime<Utc>,
    /// Correlation token
    pub token: String,
}

/// Result of a successful withdrawal
#[derive(Debug, Clone)]
pub struct WithdrawalReceipt {
    /// Gross amount debited from the ledger
    pub gross: Decimal,
    /// Informational penalty (10%, rounded to whole units); no separate
    /// entry is appended for it
    pub penalty: Decimal,
    /// Amount that conceptually reaches the user
    pub net: Decimal,
    /// Full balance after the withdrawal
    pub remaining_balance: Decimal,
    /// The single gross withdrawal entry
    pub entry: Entry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind_credit_split() {
        let credits: Vec<EntryKind> = EntryKind::ALL
            .into_iter()
            .filter(|k| k.is_credit())
            .collect();
        assert_eq!(
            credits,
            vec![
                EntryKind::Contribution,
                EntryKind::Match,
                EntryKind::Yield,
                EntryKind::TransferIn,
            ]
        );
        assert!(!EntryKind::Withdrawal.is_credit());
        assert!(!EntryKind::TransferOut.is_credit());
    }

    #[test]
    fn test_entry_kind_labels_unique() {
        let labels: std::collections::HashSet<&str> =
            EntryKind::ALL.iter().map(|k| k.label()).collect();
        assert_eq!(labels.len(), EntryKind::ALL.len());
    }

    #[test]
    fn test_employer_match_amount() {
        let employer = Employer {
            id: Uuid::new_v4(),
            company_name: "Acme".to_string(),
            match_percentage: Decimal::from(50),
            user_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        assert_eq!(employer.match_amount(Decimal::from(100)), Decimal::from(50));
        assert_eq!(
            employer.match_amount(Decimal::from(3)),
            Decimal::new(15, 1) // 1.5
        );
    }

    #[test]
    fn test_user_patch_leaves_unset_fields() {
        let mut user = User {
            id: Uuid::new_v4(),
            email: "a@b.c".to_string(),
            name: "Asha".to_string(),
            age: Some(31),
            income: None,
            risk_profile: Some(RiskProfile::Moderate),
            role: Role::Worker,
            current_employer_id: None,
            wallet_address: None,
            created_at: Utc::now(),
        };

        let patch = UserPatch {
            age: Some(32),
            wallet_address: Some(Some("0xabc".to_string())),
            ..UserPatch::default()
        };
        patch.apply(&mut user);

        assert_eq!(user.age, Some(32));
        assert_eq!(user.name, "Asha");
        assert_eq!(user.wallet_address.as_deref(), Some("0xabc"));
        assert_eq!(user.risk_profile, Some(RiskProfile::Moderate));
    }

    #[test]
    fn test_user_patch_detaches_employer() {
        let employer_id = Uuid::new_v4();
        let mut user = User {
            id: Uuid::new_v4(),
            email: "a@b.c".to_string(),
            name: "Asha".to_string(),
            age: None,
            income: None,
            risk_profile: None,
            role: Role::Worker,
            current_employer_id: Some(employer_id),
            wallet_address: None,
            created_at: Utc::now(),
        };

        let patch = UserPatch {
            current_employer_id: Some(None),
            ..UserPatch::default()
        };
        patch.apply(&mut user);
        assert_eq!(user.current_employer_id, None);
    }

    #[test]
    fn test_entry_query_filters() {
        let entry = Entry {
            id: Uuid::now_v7(),
            seq: 1,
            user_id: Uuid::new_v4(),
            amount: Decimal::from(10),
            employer_match: Decimal::ZERO,
            kind: EntryKind::Contribution,
            payment_method: "upi".to_string(),
            tx_token: None,
            employer_id: None,
            note: None,
            created_at: Utc::now(),
        };

        assert!(EntryQuery::default().matches(&entry));
        assert!(EntryQuery::kinds(&[EntryKind::Contribution]).matches(&entry));
        assert!(!EntryQuery::kinds(&[EntryKind::Withdrawal]).matches(&entry));

        let future = EntryQuery {
            since: Some(Utc::now() + chrono::Duration::days(1)),
            ..EntryQuery::default()
        };
        assert!(!future.matches(&entry));

        // Boundary is inclusive of `since`
        let at_creation = EntryQuery {
            since: Some(entry.created_at),
            ..EntryQuery::default()
        };
        assert!(at_creation.matches(&entry));
    }

    #[test]
    fn test_signed_amount() {
        let mut entry = Entry {
            id: Uuid::now_v7(),
            seq: 1,
            user_id: Uuid::new_v4(),
            amount: Decimal::from(25),
            employer_match: Decimal::ZERO,
            kind: EntryKind::Contribution,
            payment_method: "upi".to_string(),
            tx_token: None,
            employer_id: None,
            note: None,
            created_at: Utc::now(),
        };
        assert_eq!(entry.signed_amount(), Decimal::from(25));

        entry.kind = EntryKind::TransferOut;
        assert_eq!(entry.signed_amount(), Decimal::from(-25));
    }
}
