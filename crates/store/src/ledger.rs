use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_core::Stream;

use domain::{Account, AccountId, AccountStatus, LedgerEntry, Money};

use crate::{Result, StoreError};

/// A guarded balance write for one account row.
///
/// The mutation only applies if the row is still at `expected_version`;
/// otherwise the whole transaction fails with
/// [`StoreError::VersionConflict`] and the caller re-reads and retries.
#[derive(Debug, Clone)]
pub struct BalanceMutation {
    /// Account row to mutate.
    pub account_id: AccountId,

    /// Balance the row should hold afterwards. Never negative.
    pub new_balance: Money,

    /// Version the row must still be at for the write to apply.
    pub expected_version: i64,
}

/// A stream of ledger entries in recorded order.
pub type EntryStream = Pin<Box<dyn Stream<Item = Result<LedgerEntry>> + Send>>;

/// Validates the shape of a ledger transaction before any write.
///
/// The accounts the entry references must be exactly the accounts being
/// mutated, the amount must be positive, and no mutation may drive a
/// balance negative. Every implementation calls this first.
pub fn validate_transaction(mutations: &[BalanceMutation], entry: &LedgerEntry) -> Result<()> {
    if mutations.is_empty() || mutations.len() > 2 {
        return Err(StoreError::InvalidTransaction(format!(
            "expected one or two balance mutations, got {}",
            mutations.len()
        )));
    }

    if mutations.len() == 2 && mutations[0].account_id == mutations[1].account_id {
        return Err(StoreError::InvalidTransaction(
            "both mutations target the same account".to_string(),
        ));
    }

    if !entry.amount.is_positive() {
        return Err(StoreError::InvalidTransaction(format!(
            "entry amount must be positive, got {}",
            entry.amount
        )));
    }

    for mutation in mutations {
        if mutation.new_balance.is_negative() {
            return Err(StoreError::InvalidTransaction(format!(
                "mutation would leave account {} at {}",
                mutation.account_id, mutation.new_balance
            )));
        }
    }

    let mut entry_accounts: Vec<AccountId> =
        entry.source.into_iter().chain(entry.destination).collect();
    let mut mutated: Vec<AccountId> = mutations.iter().map(|m| m.account_id).collect();
    entry_accounts.sort();
    mutated.sort();
    if entry_accounts != mutated {
        return Err(StoreError::InvalidTransaction(
            "entry accounts do not match mutated accounts".to_string(),
        ));
    }

    Ok(())
}

/// Storage for accounts and the append-only entry ledger.
///
/// All implementations must be thread-safe (Send + Sync). A ledger
/// transaction (mutations + one entry) is atomic: either every balance
/// write and the entry land together, or nothing does.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts a freshly opened account.
    ///
    /// Fails with [`StoreError::AccountExists`] if the ID is taken.
    async fn insert_account(&self, account: &Account) -> Result<()>;

    /// Fetches an account by ID.
    ///
    /// Returns None if the account doesn't exist.
    async fn get_account(&self, account_id: AccountId) -> Result<Option<Account>>;

    /// Administratively changes an account's status.
    ///
    /// Bumps the row version so in-flight balance mutations that read the
    /// old status lose their optimistic check and re-validate.
    async fn update_account_status(
        &self,
        account_id: AccountId,
        status: AccountStatus,
    ) -> Result<()>;

    /// Atomically applies one or two balance mutations and appends the
    /// single entry recording them.
    ///
    /// Rows move to `expected_version + 1` on success. Any version
    /// mismatch aborts the whole transaction with
    /// [`StoreError::VersionConflict`].
    async fn apply_transaction(
        &self,
        mutations: &[BalanceMutation],
        entry: &LedgerEntry,
    ) -> Result<()>;

    /// Fetches all entries touching an account within the half-open
    /// interval `[from, to)`, ascending by recorded time.
    async fn entries_for_account(
        &self,
        account_id: AccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>>;

    /// Streams every entry in the ledger in recorded order.
    ///
    /// Used for statement export and reporting; never loads the whole
    /// ledger into memory at once on the Postgres side.
    async fn stream_entries(&self) -> Result<EntryStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutation(account_id: AccountId, cents: i64) -> BalanceMutation {
        BalanceMutation {
            account_id,
            new_balance: Money::from_cents(cents),
            expected_version: 1,
        }
    }

    #[test]
    fn test_validate_accepts_matching_deposit() {
        let account = AccountId::new();
        let entry = LedgerEntry::deposit(account, Money::from_cents(100), "ok");
        assert!(validate_transaction(&[mutation(account, 100)], &entry).is_ok());
    }

    #[test]
    fn test_validate_accepts_matching_transfer() {
        let from = AccountId::new();
        let to = AccountId::new();
        let entry = LedgerEntry::transfer(from, to, Money::from_cents(100), "ok");
        let mutations = [mutation(from, 0), mutation(to, 100)];
        assert!(validate_transaction(&mutations, &entry).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_mutations() {
        let entry = LedgerEntry::deposit(AccountId::new(), Money::from_cents(100), "x");
        let result = validate_transaction(&[], &entry);
        assert!(matches!(result, Err(StoreError::InvalidTransaction(_))));
    }

    #[test]
    fn test_validate_rejects_negative_resulting_balance() {
        let account = AccountId::new();
        let entry = LedgerEntry::withdrawal(account, Money::from_cents(100), "x");
        let result = validate_transaction(&[mutation(account, -1)], &entry);
        assert!(matches!(result, Err(StoreError::InvalidTransaction(_))));
    }

    #[test]
    fn test_validate_rejects_nonpositive_amount() {
        let account = AccountId::new();
        let entry = LedgerEntry::deposit(account, Money::zero(), "x");
        let result = validate_transaction(&[mutation(account, 100)], &entry);
        assert!(matches!(result, Err(StoreError::InvalidTransaction(_))));
    }

    #[test]
    fn test_validate_rejects_mismatched_accounts() {
        let account = AccountId::new();
        let entry = LedgerEntry::deposit(account, Money::from_cents(100), "x");
        let result = validate_transaction(&[mutation(AccountId::new(), 100)], &entry);
        assert!(matches!(result, Err(StoreError::InvalidTransaction(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_mutation_target() {
        let from = AccountId::new();
        let to = AccountId::new();
        let entry = LedgerEntry::transfer(from, to, Money::from_cents(100), "x");
        let mutations = [mutation(from, 0), mutation(from, 100)];
        let result = validate_transaction(&mutations, &entry);
        assert!(matches!(result, Err(StoreError::InvalidTransaction(_))));
    }
}
