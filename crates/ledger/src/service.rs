//! Ledger service enforcing balance, status, and credential invariants.

use chrono::{DateTime, Utc};
use common::ActorId;
use domain::{
    Account, AccountClass, AccountId, AccountStatus, Credential, LedgerEntry, Money,
};
use store::{BalanceMutation, LedgerStore, StoreError};

use crate::error::{LedgerError, Result};

/// How many times a balance mutation is retried after losing the
/// storage-level optimistic check. Validation failures are never retried.
const MAX_CAS_RETRIES: u32 = 5;

/// Service for accounts and monetary operations.
///
/// Every balance change goes through here: the service re-reads the
/// account, validates, and applies the mutation together with its ledger
/// entry as one atomic storage transaction. A lost version check means a
/// concurrent mutation won; the service re-reads and re-validates a
/// bounded number of times before giving up.
pub struct LedgerService<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> LedgerService<S> {
    /// Creates a new ledger service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Opens a new active account.
    ///
    /// A positive initial deposit becomes the account's first `Deposit`
    /// entry; a zero deposit opens an empty account. Negative amounts are
    /// rejected with [`LedgerError::InvalidAmount`].
    #[tracing::instrument(skip(self, secret))]
    pub async fn open_account(
        &self,
        owner: ActorId,
        class: AccountClass,
        secret: &str,
        initial_deposit: Money,
    ) -> Result<Account> {
        if initial_deposit.is_negative() {
            return Err(LedgerError::InvalidAmount(initial_deposit));
        }

        let account = Account::open(owner, class, Credential::derive(secret));
        self.store.insert_account(&account).await?;

        if initial_deposit.is_positive() {
            self.deposit(account.id, initial_deposit, "Initial deposit")
                .await?;
        }

        metrics::counter!("ledger_accounts_opened_total").increment(1);
        tracing::info!(account_id = %account.id, %owner, "account opened");

        self.require_account(account.id).await
    }

    /// Credits an active account and appends one `Deposit` entry.
    #[tracing::instrument(skip(self))]
    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount: Money,
        memo: &str,
    ) -> Result<LedgerEntry> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let account = self.require_account(account_id).await?;
            if !account.is_active() {
                return Err(LedgerError::AccountNotActive(account_id));
            }

            let entry = LedgerEntry::deposit(account_id, amount, memo);
            let mutation = BalanceMutation {
                account_id,
                new_balance: account.balance + amount,
                expected_version: account.version,
            };

            match self.store.apply_transaction(&[mutation], &entry).await {
                Ok(()) => {
                    metrics::counter!("ledger_transactions_total", "kind" => "deposit")
                        .increment(1);
                    return Ok(entry);
                }
                Err(StoreError::VersionConflict { .. }) if attempt < MAX_CAS_RETRIES => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Debits an active account and appends one `Withdrawal` entry.
    ///
    /// The presented secret is checked before the balance: a wrong
    /// credential never reveals whether the funds would have sufficed.
    #[tracing::instrument(skip(self, secret))]
    pub async fn withdraw(
        &self,
        account_id: AccountId,
        amount: Money,
        secret: &str,
        memo: &str,
    ) -> Result<LedgerEntry> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let account = self.require_account(account_id).await?;
            if !account.is_active() {
                return Err(LedgerError::AccountNotActive(account_id));
            }
            if !account.credential.verify(secret) {
                return Err(LedgerError::InvalidCredential);
            }
            if !account.balance.covers(amount) {
                return Err(LedgerError::InsufficientFunds {
                    requested: amount,
                    available: account.balance,
                });
            }

            let entry = LedgerEntry::withdrawal(account_id, amount, memo);
            let mutation = BalanceMutation {
                account_id,
                new_balance: account.balance - amount,
                expected_version: account.version,
            };

            match self.store.apply_transaction(&[mutation], &entry).await {
                Ok(()) => {
                    metrics::counter!("ledger_transactions_total", "kind" => "withdrawal")
                        .increment(1);
                    return Ok(entry);
                }
                Err(StoreError::VersionConflict { .. }) if attempt < MAX_CAS_RETRIES => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Moves money between two active accounts.
    ///
    /// The source is validated exactly as for a withdrawal; the
    /// destination must exist and be active. Both balance writes and the
    /// single `Transfer` entry land atomically; no partial state is ever
    /// visible.
    #[tracing::instrument(skip(self, secret))]
    pub async fn transfer(
        &self,
        source: AccountId,
        destination: AccountId,
        amount: Money,
        secret: &str,
        memo: &str,
    ) -> Result<LedgerEntry> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if source == destination {
            return Err(LedgerError::SameAccount(source));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let from = self.require_account(source).await?;
            if !from.is_active() {
                return Err(LedgerError::AccountNotActive(source));
            }
            if !from.credential.verify(secret) {
                return Err(LedgerError::InvalidCredential);
            }
            if !from.balance.covers(amount) {
                return Err(LedgerError::InsufficientFunds {
                    requested: amount,
                    available: from.balance,
                });
            }
            let to = self
                .store
                .get_account(destination)
                .await?
                .filter(|a| a.is_active())
                .ok_or(LedgerError::DestinationNotActive(destination))?;

            let entry = LedgerEntry::transfer(source, destination, amount, memo);
            let mutations = [
                BalanceMutation {
                    account_id: source,
                    new_balance: from.balance - amount,
                    expected_version: from.version,
                },
                BalanceMutation {
                    account_id: destination,
                    new_balance: to.balance + amount,
                    expected_version: to.version,
                },
            ];

            match self.store.apply_transaction(&mutations, &entry).await {
                Ok(()) => {
                    metrics::counter!("ledger_transactions_total", "kind" => "transfer")
                        .increment(1);
                    return Ok(entry);
                }
                Err(StoreError::VersionConflict { .. }) if attempt < MAX_CAS_RETRIES => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Compensation credit: returns previously debited money to an
    /// account regardless of its status.
    ///
    /// Settlement uses this to unwind a payment whose stock commit
    /// failed. The status gate is deliberately bypassed: money taken out
    /// of an account must always be returnable, even to a frozen one. No
    /// credential is required since the credit restores rather than
    /// moves funds.
    #[tracing::instrument(skip(self))]
    pub async fn refund(
        &self,
        account_id: AccountId,
        amount: Money,
        memo: &str,
    ) -> Result<LedgerEntry> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let account = self.require_account(account_id).await?;

            let entry = LedgerEntry::deposit(account_id, amount, memo);
            let mutation = BalanceMutation {
                account_id,
                new_balance: account.balance + amount,
                expected_version: account.version,
            };

            match self.store.apply_transaction(&[mutation], &entry).await {
                Ok(()) => {
                    metrics::counter!("ledger_transactions_total", "kind" => "refund")
                        .increment(1);
                    tracing::info!(%account_id, %amount, "compensation credit applied");
                    return Ok(entry);
                }
                Err(StoreError::VersionConflict { .. }) if attempt < MAX_CAS_RETRIES => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Returns the entries touching an account within `[from, to)`,
    /// ascending by recorded time.
    #[tracing::instrument(skip(self))]
    pub async fn history(
        &self,
        account_id: AccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>> {
        self.require_account(account_id).await?;
        Ok(self.store.entries_for_account(account_id, from, to).await?)
    }

    /// Returns the current account projection.
    #[tracing::instrument(skip(self))]
    pub async fn account_info(&self, account_id: AccountId) -> Result<Account> {
        self.require_account(account_id).await
    }

    /// Administratively changes an account's status.
    ///
    /// Closure is terminal: once `Closed`, no further change is accepted.
    #[tracing::instrument(skip(self))]
    pub async fn set_status(&self, account_id: AccountId, status: AccountStatus) -> Result<()> {
        let account = self.require_account(account_id).await?;
        if account.status.is_terminal() {
            return Err(LedgerError::AccountClosed(account_id));
        }

        self.store.update_account_status(account_id, status).await?;
        tracing::info!(%account_id, from = %account.status, to = %status, "account status changed");
        Ok(())
    }

    async fn require_account(&self, account_id: AccountId) -> Result<Account> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::EntryKind;
    use store::InMemoryStore;

    fn service() -> LedgerService<InMemoryStore> {
        LedgerService::new(InMemoryStore::new())
    }

    #[tokio::test]
    async fn open_account_records_initial_deposit() {
        let svc = service();
        let account = svc
            .open_account(ActorId::new(), AccountClass::Checking, "1234", Money::from_dollars(100))
            .await
            .unwrap();

        assert_eq!(account.balance, Money::from_dollars(100));
        let entries = svc
            .history(account.id, account.created_at, Utc::now())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Deposit);
        assert_eq!(entries[0].memo, "Initial deposit");
    }

    #[tokio::test]
    async fn open_account_with_zero_deposit_writes_no_entry() {
        let svc = service();
        let account = svc
            .open_account(ActorId::new(), AccountClass::Savings, "1234", Money::zero())
            .await
            .unwrap();

        assert!(account.balance.is_zero());
        let entries = svc
            .history(account.id, account.created_at, Utc::now())
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn open_account_rejects_negative_deposit() {
        let svc = service();
        let result = svc
            .open_account(ActorId::new(), AccountClass::Checking, "1234", Money::from_cents(-1))
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));
    }

    #[tokio::test]
    async fn deposit_rejects_nonpositive_amount() {
        let svc = service();
        let account = svc
            .open_account(ActorId::new(), AccountClass::Checking, "1234", Money::zero())
            .await
            .unwrap();

        for cents in [0, -100] {
            let result = svc
                .deposit(account.id, Money::from_cents(cents), "bad")
                .await;
            assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));
        }
    }

    #[tokio::test]
    async fn deposit_rejects_inactive_account() {
        let svc = service();
        let account = svc
            .open_account(ActorId::new(), AccountClass::Checking, "1234", Money::zero())
            .await
            .unwrap();
        svc.set_status(account.id, AccountStatus::Lost).await.unwrap();

        let result = svc.deposit(account.id, Money::from_cents(100), "x").await;
        assert!(matches!(result, Err(LedgerError::AccountNotActive(_))));
    }

    #[tokio::test]
    async fn withdraw_checks_credential_before_balance() {
        let svc = service();
        let account = svc
            .open_account(ActorId::new(), AccountClass::Checking, "1234", Money::from_dollars(10))
            .await
            .unwrap();

        // Wrong secret with an amount the balance could not cover: the
        // credential failure must win.
        let result = svc
            .withdraw(account.id, Money::from_dollars(100), "wrong", "x")
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidCredential)));

        let info = svc.account_info(account.id).await.unwrap();
        assert_eq!(info.balance, Money::from_dollars(10));
    }

    #[tokio::test]
    async fn withdraw_rejects_insufficient_funds() {
        let svc = service();
        let account = svc
            .open_account(ActorId::new(), AccountClass::Checking, "1234", Money::from_dollars(150))
            .await
            .unwrap();

        let result = svc
            .withdraw(account.id, Money::from_dollars(200), "1234", "too much")
            .await;
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds { .. })
        ));
        let info = svc.account_info(account.id).await.unwrap();
        assert_eq!(info.balance, Money::from_dollars(150));
    }

    #[tokio::test]
    async fn transfer_moves_money_with_single_entry() {
        let svc = service();
        let a = svc
            .open_account(ActorId::new(), AccountClass::Checking, "1234", Money::from_dollars(100))
            .await
            .unwrap();
        let b = svc
            .open_account(ActorId::new(), AccountClass::Checking, "5678", Money::zero())
            .await
            .unwrap();

        let entry = svc
            .transfer(a.id, b.id, Money::from_dollars(40), "1234", "books")
            .await
            .unwrap();

        assert_eq!(entry.kind, EntryKind::Transfer);
        assert_eq!(entry.source, Some(a.id));
        assert_eq!(entry.destination, Some(b.id));
        assert_eq!(
            svc.account_info(a.id).await.unwrap().balance,
            Money::from_dollars(60)
        );
        assert_eq!(
            svc.account_info(b.id).await.unwrap().balance,
            Money::from_dollars(40)
        );
    }

    #[tokio::test]
    async fn transfer_rejects_same_account() {
        let svc = service();
        let a = svc
            .open_account(ActorId::new(), AccountClass::Checking, "1234", Money::from_dollars(10))
            .await
            .unwrap();

        let result = svc
            .transfer(a.id, a.id, Money::from_dollars(1), "1234", "loop")
            .await;
        assert!(matches!(result, Err(LedgerError::SameAccount(_))));
    }

    #[tokio::test]
    async fn transfer_rejects_inactive_destination() {
        let svc = service();
        let a = svc
            .open_account(ActorId::new(), AccountClass::Checking, "1234", Money::from_dollars(10))
            .await
            .unwrap();
        let b = svc
            .open_account(ActorId::new(), AccountClass::Checking, "5678", Money::zero())
            .await
            .unwrap();
        svc.set_status(b.id, AccountStatus::Limited).await.unwrap();

        let result = svc
            .transfer(a.id, b.id, Money::from_dollars(1), "1234", "x")
            .await;
        assert!(matches!(result, Err(LedgerError::DestinationNotActive(_))));
        assert_eq!(
            svc.account_info(a.id).await.unwrap().balance,
            Money::from_dollars(10)
        );
    }

    #[tokio::test]
    async fn refund_credits_inactive_account() {
        let svc = service();
        let account = svc
            .open_account(ActorId::new(), AccountClass::Checking, "1234", Money::from_dollars(10))
            .await
            .unwrap();
        svc.set_status(account.id, AccountStatus::Limited)
            .await
            .unwrap();

        svc.refund(account.id, Money::from_dollars(5), "refund")
            .await
            .unwrap();

        let info = svc.account_info(account.id).await.unwrap();
        assert_eq!(info.balance, Money::from_dollars(15));
    }

    #[tokio::test]
    async fn set_status_rejects_leaving_closed() {
        let svc = service();
        let account = svc
            .open_account(ActorId::new(), AccountClass::Checking, "1234", Money::zero())
            .await
            .unwrap();

        svc.set_status(account.id, AccountStatus::Closed)
            .await
            .unwrap();
        let result = svc.set_status(account.id, AccountStatus::Active).await;
        assert!(matches!(result, Err(LedgerError::AccountClosed(_))));
    }

    #[tokio::test]
    async fn operations_on_missing_account_fail() {
        let svc = service();
        let missing = AccountId::new();

        assert!(matches!(
            svc.deposit(missing, Money::from_cents(100), "x").await,
            Err(LedgerError::AccountNotFound(_))
        ));
        assert!(matches!(
            svc.account_info(missing).await,
            Err(LedgerError::AccountNotFound(_))
        ));
    }
}
