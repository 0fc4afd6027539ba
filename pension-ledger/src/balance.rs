//! Pure balance derivation over ledger entries
//!
//! Balances are never stored. Every read folds the owning user's entries
//! fresh, so a balance can never diverge from the entry log. The cost is
//! O(n) in that user's entry count, which the product accepts.

use crate::types::{Entry, EntryKind};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Kinds that fund a transfer
pub const TRANSFER_CREDIT_KINDS: [EntryKind; 4] = [
    EntryKind::Contribution,
    EntryKind::Match,
    EntryKind::Yield,
    EntryKind::TransferIn,
];

/// Kinds that reduce transferable funds
pub const TRANSFER_DEBIT_KINDS: [EntryKind; 2] = [EntryKind::Withdrawal, EntryKind::TransferOut];

/// Kinds that fund an emergency withdrawal (transfers excluded)
pub const WITHDRAWAL_CREDIT_KINDS: [EntryKind; 3] =
    [EntryKind::Contribution, EntryKind::Match, EntryKind::Yield];

/// Sum of amounts over the given kinds
pub fn sum_of(entries: &[Entry], kinds: &[EntryKind]) -> Decimal {
    entries
        .iter()
        .filter(|e| kinds.contains(&e.kind))
        .map(|e| e.amount)
        .sum()
}

/// Net balance: Σ credits − Σ debits
pub fn net_balance(entries: &[Entry]) -> Decimal {
    entries.iter().map(Entry::signed_amount).sum()
}

/// Net sum over the given kinds restricted to `created_at >= since`
/// (inclusive boundary)
pub fn sum_since(entries: &[Entry], kinds: &[EntryKind], since: DateTime<Utc>) -> Decimal {
    entries
        .iter()
        .filter(|e| kinds.contains(&e.kind) && e.created_at >= since)
        .map(Entry::signed_amount)
        .sum()
}

/// Funds available to a transfer:
/// Σ(contribution, match, yield, transfer_in) − Σ(withdrawal, transfer_out)
pub fn available_for_transfer(entries: &[Entry]) -> Decimal {
    sum_of(entries, &TRANSFER_CREDIT_KINDS) - sum_of(entries, &TRANSFER_DEBIT_KINDS)
}

/// Funds available to an emergency withdrawal:
/// Σ(contribution, match, yield) − Σ(withdrawal)
pub fn available_for_withdrawal(entries: &[Entry]) -> Decimal {
    sum_of(entries, &WITHDRAWAL_CREDIT_KINDS) - sum_of(entries, &[EntryKind::Withdrawal])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn entry(kind: EntryKind, amount: i64, days_ago: i64) -> Entry {
        Entry {
            id: Uuid::now_v7(),
            seq: 0,
            user_id: Uuid::new_v4(),
            amount: Decimal::from(amount),
            employer_match: Decimal::ZERO,
            kind,
            payment_method: "upi".to_string(),
            tx_token: None,
            employer_id: None,
            note: None,
            created_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn test_net_balance_formula() {
        let entries = vec![
            entry(EntryKind::Contribution, 100, 5),
            entry(EntryKind::Match, 50, 5),
            entry(EntryKind::Yield, 1, 5),
            entry(EntryKind::TransferIn, 20, 3),
            entry(EntryKind::Withdrawal, 30, 2),
            entry(EntryKind::TransferOut, 10, 1),
        ];
        // 100 + 50 + 1 + 20 - 30 - 10
        assert_eq!(net_balance(&entries), Decimal::from(131));
    }

    #[test]
    fn test_balance_of_empty_log_is_zero() {
        assert_eq!(net_balance(&[]), Decimal::ZERO);
        assert_eq!(available_for_transfer(&[]), Decimal::ZERO);
        assert_eq!(available_for_withdrawal(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_withdrawal_availability_excludes_transfers() {
        let entries = vec![
            entry(EntryKind::Contribution, 100, 2),
            entry(EntryKind::TransferIn, 500, 1),
        ];
        assert_eq!(available_for_withdrawal(&entries), Decimal::from(100));
        assert_eq!(available_for_transfer(&entries), Decimal::from(600));
    }

    #[test]
    fn test_transfer_out_reduces_transferable_funds() {
        let entries = vec![
            entry(EntryKind::Contribution, 100, 2),
            entry(EntryKind::TransferOut, 40, 1),
        ];
        assert_eq!(available_for_transfer(&entries), Decimal::from(60));
        // Transfers out do not reduce the withdrawal base
        assert_eq!(available_for_withdrawal(&entries), Decimal::from(100));
    }

    #[test]
    fn test_sum_since_inclusive_boundary() {
        let old = entry(EntryKind::Contribution, 10, 10);
        let recent = entry(EntryKind::Contribution, 20, 0);
        let boundary = recent.created_at;
        let entries = vec![old, recent];

        assert_eq!(
            sum_since(&entries, &[EntryKind::Contribution], boundary),
            Decimal::from(20)
        );
        assert_eq!(
            sum_since(
                &entries,
                &[EntryKind::Contribution],
                boundary - Duration::days(30)
            ),
            Decimal::from(30)
        );
    }

    #[test]
    fn test_sum_of_filters_kinds() {
        let entries = vec![
            entry(EntryKind::Contribution, 10, 0),
            entry(EntryKind::Yield, 3, 0),
            entry(EntryKind::Withdrawal, 5, 0),
        ];
        assert_eq!(sum_of(&entries, &[EntryKind::Yield]), Decimal::from(3));
        assert_eq!(
            sum_of(&entries, &[EntryKind::Contribution, EntryKind::Yield]),
            Decimal::from(13)
        );
    }
}
