use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use domain::{Account, AccountId, AccountStatus, LedgerEntry, Order, OrderId, OrderLine};

use crate::{
    Result, StoreError,
    compensation::{CompensationId, CompensationStore, PendingCompensation},
    ledger::{BalanceMutation, EntryStream, LedgerStore, validate_transaction},
    orders::{OrderStore, StatusTransition},
};

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<AccountId, Account>,
    entries: Vec<LedgerEntry>,
    orders: HashMap<OrderId, Order>,
    lines: HashMap<OrderId, Vec<OrderLine>>,
    compensations: Vec<PendingCompensation>,
}

/// In-memory store implementation for testing and wiring.
///
/// Holds all three stores behind one lock so every logical transaction
/// is trivially atomic, and provides the same interface and error
/// behavior as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of ledger entries stored.
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Clears all accounts, entries, orders, and compensation records.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.accounts.clear();
        state.entries.clear();
        state.orders.clear();
        state.lines.clear();
        state.compensations.clear();
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn insert_account(&self, account: &Account) -> Result<()> {
        let mut state = self.state.write().await;
        if state.accounts.contains_key(&account.id) {
            return Err(StoreError::AccountExists(account.id));
        }
        state.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_account(&self, account_id: AccountId) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(&account_id).cloned())
    }

    async fn update_account_status(
        &self,
        account_id: AccountId,
        status: AccountStatus,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(&account_id)
            .ok_or(StoreError::AccountNotFound(account_id))?;
        account.status = status;
        account.version += 1;
        Ok(())
    }

    async fn apply_transaction(
        &self,
        mutations: &[BalanceMutation],
        entry: &LedgerEntry,
    ) -> Result<()> {
        validate_transaction(mutations, entry)?;

        let mut state = self.state.write().await;

        // Check every row before touching any, so a conflict on the
        // second row of a transfer leaves the first untouched.
        for mutation in mutations {
            let account = state
                .accounts
                .get(&mutation.account_id)
                .ok_or(StoreError::AccountNotFound(mutation.account_id))?;
            if account.version != mutation.expected_version {
                return Err(StoreError::VersionConflict {
                    account_id: mutation.account_id,
                    expected: mutation.expected_version,
                    actual: account.version,
                });
            }
        }

        for mutation in mutations {
            let account = state
                .accounts
                .get_mut(&mutation.account_id)
                .expect("checked above");
            account.balance = mutation.new_balance;
            account.version += 1;
        }
        state.entries.push(entry.clone());

        Ok(())
    }

    async fn entries_for_account(
        &self,
        account_id: AccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .entries
            .iter()
            .filter(|e| e.touches(account_id) && e.recorded_at >= from && e.recorded_at < to)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.recorded_at);
        Ok(entries)
    }

    async fn stream_entries(&self) -> Result<EntryStream> {
        use futures_util::stream;

        let state = self.state.read().await;
        let mut entries = state.entries.clone();
        entries.sort_by(|a, b| {
            a.recorded_at
                .cmp(&b.recorded_at)
                .then(a.id.as_uuid().cmp(&b.id.as_uuid()))
        });

        let stream = stream::iter(entries.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: &Order, lines: &[OrderLine]) -> Result<()> {
        let mut state = self.state.write().await;
        state.orders.insert(order.id, order.clone());
        state.lines.insert(order.id, lines.to_vec());
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&order_id).cloned())
    }

    async fn lines_for_order(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let state = self.state.read().await;
        Ok(state.lines.get(&order_id).cloned().unwrap_or_default())
    }

    async fn transition_order(
        &self,
        order_id: OrderId,
        transition: StatusTransition,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        if order.status != transition.expected {
            return Err(StoreError::StatusConflict {
                order_id,
                expected: transition.expected,
                actual: order.status,
            });
        }

        order.status = transition.to;
        if let Some(payment) = transition.payment {
            order.payment_method = Some(payment.method);
            order.payment_status = payment.status;
        }
        order.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl CompensationStore for InMemoryStore {
    async fn insert_compensation(&self, record: &PendingCompensation) -> Result<()> {
        let mut state = self.state.write().await;
        state.compensations.push(record.clone());
        Ok(())
    }

    async fn remove_compensation(&self, id: CompensationId) -> Result<()> {
        let mut state = self.state.write().await;
        let index = state
            .compensations
            .iter()
            .position(|r| r.id == id)
            .ok_or(StoreError::CompensationNotFound(id))?;
        state.compensations.remove(index);
        Ok(())
    }

    async fn record_compensation_attempt(&self, id: CompensationId, error: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let record = state
            .compensations
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::CompensationNotFound(id))?;
        record.attempts += 1;
        record.last_error = Some(error.to_string());
        Ok(())
    }

    async fn list_pending_compensations(&self) -> Result<Vec<PendingCompensation>> {
        let state = self.state.read().await;
        Ok(state.compensations.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ActorId;
    use domain::{AccountClass, Credential, Money, OrderStatus, PaymentMethod, PaymentStatus};

    fn test_account() -> Account {
        Account::open(
            ActorId::new(),
            AccountClass::Checking,
            Credential::derive("1234"),
        )
    }

    fn deposit_mutation(account: &Account, cents: i64) -> BalanceMutation {
        BalanceMutation {
            account_id: account.id,
            new_balance: account.balance + Money::from_cents(cents),
            expected_version: account.version,
        }
    }

    #[tokio::test]
    async fn insert_and_get_account() {
        let store = InMemoryStore::new();
        let account = test_account();

        store.insert_account(&account).await.unwrap();
        let fetched = store.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(fetched, account);
    }

    #[tokio::test]
    async fn insert_duplicate_account_fails() {
        let store = InMemoryStore::new();
        let account = test_account();

        store.insert_account(&account).await.unwrap();
        let result = store.insert_account(&account).await;
        assert!(matches!(result, Err(StoreError::AccountExists(_))));
    }

    #[tokio::test]
    async fn get_missing_account_returns_none() {
        let store = InMemoryStore::new();
        assert!(store.get_account(AccountId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn apply_deposit_updates_balance_and_appends_entry() {
        let store = InMemoryStore::new();
        let account = test_account();
        store.insert_account(&account).await.unwrap();

        let entry = LedgerEntry::deposit(account.id, Money::from_cents(500), "cash in");
        store
            .apply_transaction(&[deposit_mutation(&account, 500)], &entry)
            .await
            .unwrap();

        let fetched = store.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(fetched.balance, Money::from_cents(500));
        assert_eq!(fetched.version, account.version + 1);
        assert_eq!(store.entry_count().await, 1);
    }

    #[tokio::test]
    async fn version_conflict_on_stale_mutation() {
        let store = InMemoryStore::new();
        let account = test_account();
        store.insert_account(&account).await.unwrap();

        let entry = LedgerEntry::deposit(account.id, Money::from_cents(500), "first");
        store
            .apply_transaction(&[deposit_mutation(&account, 500)], &entry)
            .await
            .unwrap();

        // Same expected_version again: the row has moved on.
        let stale = LedgerEntry::deposit(account.id, Money::from_cents(500), "stale");
        let result = store
            .apply_transaction(&[deposit_mutation(&account, 500)], &stale)
            .await;

        assert!(matches!(result, Err(StoreError::VersionConflict { .. })));
        assert_eq!(store.entry_count().await, 1);
    }

    #[tokio::test]
    async fn transaction_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let source = test_account();
        let destination = test_account();
        store.insert_account(&source).await.unwrap();
        store.insert_account(&destination).await.unwrap();

        // Fund the source first.
        let funding = LedgerEntry::deposit(source.id, Money::from_cents(1000), "fund");
        store
            .apply_transaction(&[deposit_mutation(&source, 1000)], &funding)
            .await
            .unwrap();
        let source = store.get_account(source.id).await.unwrap().unwrap();

        // Transfer with a stale destination version: nothing may change.
        let entry =
            LedgerEntry::transfer(source.id, destination.id, Money::from_cents(400), "move");
        let mutations = [
            BalanceMutation {
                account_id: source.id,
                new_balance: Money::from_cents(600),
                expected_version: source.version,
            },
            BalanceMutation {
                account_id: destination.id,
                new_balance: Money::from_cents(400),
                expected_version: destination.version + 7,
            },
        ];
        let result = store.apply_transaction(&mutations, &entry).await;
        assert!(matches!(result, Err(StoreError::VersionConflict { .. })));

        let source_after = store.get_account(source.id).await.unwrap().unwrap();
        let destination_after = store.get_account(destination.id).await.unwrap().unwrap();
        assert_eq!(source_after.balance, Money::from_cents(1000));
        assert_eq!(destination_after.balance, Money::zero());
        assert_eq!(store.entry_count().await, 1);
    }

    #[tokio::test]
    async fn entries_for_account_filters_half_open_interval() {
        let store = InMemoryStore::new();
        let account = test_account();
        store.insert_account(&account).await.unwrap();

        let base = Utc::now();
        let mut account_state = account.clone();
        let mut times = Vec::new();
        for (i, cents) in [100, 200, 300].into_iter().enumerate() {
            let mut entry = LedgerEntry::deposit(account.id, Money::from_cents(cents), "tick");
            entry.recorded_at = base + chrono::Duration::seconds(i as i64);
            times.push(entry.recorded_at);
            store
                .apply_transaction(&[deposit_mutation(&account_state, cents)], &entry)
                .await
                .unwrap();
            account_state = store.get_account(account.id).await.unwrap().unwrap();
        }

        // [t0, t2) keeps the first two entries only.
        let window = store
            .entries_for_account(account.id, times[0], times[2])
            .await
            .unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].amount, Money::from_cents(100));
        assert_eq!(window[1].amount, Money::from_cents(200));
    }

    #[tokio::test]
    async fn entries_for_account_ignores_other_accounts() {
        let store = InMemoryStore::new();
        let a = test_account();
        let b = test_account();
        store.insert_account(&a).await.unwrap();
        store.insert_account(&b).await.unwrap();

        let entry = LedgerEntry::deposit(a.id, Money::from_cents(100), "a only");
        store
            .apply_transaction(&[deposit_mutation(&a, 100)], &entry)
            .await
            .unwrap();

        let window = store
            .entries_for_account(b.id, entry.recorded_at, Utc::now())
            .await
            .unwrap();
        assert!(window.is_empty());
    }

    #[tokio::test]
    async fn update_status_bumps_version() {
        let store = InMemoryStore::new();
        let account = test_account();
        store.insert_account(&account).await.unwrap();

        store
            .update_account_status(account.id, AccountStatus::Lost)
            .await
            .unwrap();

        let fetched = store.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, AccountStatus::Lost);
        assert_eq!(fetched.version, account.version + 1);
    }

    #[tokio::test]
    async fn insert_order_with_lines_roundtrip() {
        let store = InMemoryStore::new();
        let order = Order::create(ActorId::new(), Money::from_cents(4000));
        let lines = vec![
            OrderLine::new(order.id, "SKU-001", 2, Money::from_cents(1000)),
            OrderLine::new(order.id, "SKU-002", 1, Money::from_cents(2000)),
        ];

        store.insert_order(&order, &lines).await.unwrap();

        let fetched = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(fetched, order);
        let fetched_lines = store.lines_for_order(order.id).await.unwrap();
        assert_eq!(fetched_lines, lines);
    }

    #[tokio::test]
    async fn transition_order_applies_payment_fields() {
        let store = InMemoryStore::new();
        let order = Order::create(ActorId::new(), Money::from_cents(4000));
        store.insert_order(&order, &[]).await.unwrap();

        store
            .transition_order(
                order.id,
                StatusTransition::with_payment(
                    OrderStatus::Pending,
                    OrderStatus::Paid,
                    PaymentMethod::Balance,
                ),
            )
            .await
            .unwrap();

        let fetched = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, OrderStatus::Paid);
        assert_eq!(fetched.payment_status, PaymentStatus::Paid);
        assert_eq!(fetched.payment_method, Some(PaymentMethod::Balance));
        assert!(fetched.updated_at >= order.updated_at);
    }

    #[tokio::test]
    async fn transition_order_rejects_wrong_current_status() {
        let store = InMemoryStore::new();
        let order = Order::create(ActorId::new(), Money::from_cents(4000));
        store.insert_order(&order, &[]).await.unwrap();

        let result = store
            .transition_order(
                order.id,
                StatusTransition::new(OrderStatus::Paid, OrderStatus::Shipped),
            )
            .await;

        assert!(matches!(
            result,
            Err(StoreError::StatusConflict {
                expected: OrderStatus::Paid,
                actual: OrderStatus::Pending,
                ..
            })
        ));

        let fetched = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn transition_missing_order_fails() {
        let store = InMemoryStore::new();
        let result = store
            .transition_order(
                OrderId::new(),
                StatusTransition::new(OrderStatus::Pending, OrderStatus::Cancelled),
            )
            .await;
        assert!(matches!(result, Err(StoreError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn compensation_lifecycle() {
        let store = InMemoryStore::new();
        let record =
            PendingCompensation::new(OrderId::new(), AccountId::new(), Money::from_cents(4000));

        store.insert_compensation(&record).await.unwrap();
        assert_eq!(store.list_pending_compensations().await.unwrap().len(), 1);

        store
            .record_compensation_attempt(record.id, "pool closed")
            .await
            .unwrap();
        let listed = &store.list_pending_compensations().await.unwrap()[0];
        assert_eq!(listed.attempts, 1);
        assert_eq!(listed.last_error.as_deref(), Some("pool closed"));

        store.remove_compensation(record.id).await.unwrap();
        assert!(store.list_pending_compensations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_missing_compensation_fails() {
        let store = InMemoryStore::new();
        let result = store.remove_compensation(CompensationId::new()).await;
        assert!(matches!(result, Err(StoreError::CompensationNotFound(_))));
    }

    #[tokio::test]
    async fn stream_entries_yields_all_in_order() {
        use futures_util::StreamExt;

        let store = InMemoryStore::new();
        let account = test_account();
        store.insert_account(&account).await.unwrap();

        let mut account_state = account.clone();
        for cents in [100, 200] {
            let entry = LedgerEntry::deposit(account.id, Money::from_cents(cents), "tick");
            store
                .apply_transaction(&[deposit_mutation(&account_state, cents)], &entry)
                .await
                .unwrap();
            account_state = store.get_account(account.id).await.unwrap().unwrap();
        }

        let stream = store.stream_entries().await.unwrap();
        let entries: Vec<_> = stream.collect().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].as_ref().unwrap().amount, Money::from_cents(100));
    }
}
