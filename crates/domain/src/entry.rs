//! Append-only ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::AccountId;
use crate::money::Money;

/// Unique identifier for a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Creates a new random transaction ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a transaction ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TransactionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<TransactionId> for Uuid {
    fn from(id: TransactionId) -> Self {
        id.0
    }
}

/// The kind of movement an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Money entered an account from outside the ledger.
    Deposit,

    /// Money left an account to outside the ledger.
    Withdrawal,

    /// Money moved between two accounts.
    Transfer,
}

impl EntryKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Deposit => "Deposit",
            EntryKind::Withdrawal => "Withdrawal",
            EntryKind::Transfer => "Transfer",
        }
    }

    /// Parses a kind from its `as_str` form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Deposit" => Some(EntryKind::Deposit),
            "Withdrawal" => Some(EntryKind::Withdrawal),
            "Transfer" => Some(EntryKind::Transfer),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settlement status of an entry.
///
/// Entries the services write are always `Completed`; `Active` marks an
/// in-flight row and never survives a finished operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    /// In-flight.
    Active,

    /// Settled.
    Completed,
}

impl EntryStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Active => "Active",
            EntryStatus::Completed => "Completed",
        }
    }

    /// Parses a status from its `as_str` form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(EntryStatus::Active),
            "Completed" => Some(EntryStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable row in the append-only ledger.
///
/// Exactly one of `source`/`destination` is absent for deposits and
/// withdrawals; a transfer carries both. The amount is always positive.
/// Once written, an entry is never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique transaction identifier.
    pub id: TransactionId,

    /// Account debited, when one exists.
    pub source: Option<AccountId>,

    /// Account credited, when one exists.
    pub destination: Option<AccountId>,

    /// Amount moved; always positive.
    pub amount: Money,

    /// What kind of movement this entry records.
    pub kind: EntryKind,

    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,

    /// Human-readable memo.
    pub memo: String,

    /// Settlement status.
    pub status: EntryStatus,
}

impl LedgerEntry {
    /// Builds a deposit entry crediting `destination`.
    pub fn deposit(destination: AccountId, amount: Money, memo: impl Into<String>) -> Self {
        Self {
            id: TransactionId::new(),
            source: None,
            destination: Some(destination),
            amount,
            kind: EntryKind::Deposit,
            recorded_at: Utc::now(),
            memo: memo.into(),
            status: EntryStatus::Completed,
        }
    }

    /// Builds a withdrawal entry debiting `source`.
    pub fn withdrawal(source: AccountId, amount: Money, memo: impl Into<String>) -> Self {
        Self {
            id: TransactionId::new(),
            source: Some(source),
            destination: None,
            amount,
            kind: EntryKind::Withdrawal,
            recorded_at: Utc::now(),
            memo: memo.into(),
            status: EntryStatus::Completed,
        }
    }

    /// Builds the single entry recording a transfer between two accounts.
    pub fn transfer(
        source: AccountId,
        destination: AccountId,
        amount: Money,
        memo: impl Into<String>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            source: Some(source),
            destination: Some(destination),
            amount,
            kind: EntryKind::Transfer,
            recorded_at: Utc::now(),
            memo: memo.into(),
            status: EntryStatus::Completed,
        }
    }

    /// Returns true if the entry debits or credits the given account.
    pub fn touches(&self, account: AccountId) -> bool {
        self.source == Some(account) || self.destination == Some(account)
    }

    /// Signed effect of this entry on the given account's balance.
    pub fn net_effect_on(&self, account: AccountId) -> Money {
        let mut net = Money::zero();
        if self.source == Some(account) {
            net -= self.amount;
        }
        if self.destination == Some(account) {
            net += self.amount;
        }
        net
    }
}
