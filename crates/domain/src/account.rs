//! Accounts and their status lifecycle.

use chrono::{DateTime, Utc};
use common::ActorId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::credential::Credential;
use crate::money::Money;

/// Unique identifier for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Creates a new random account ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an account ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AccountId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AccountId> for Uuid {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

/// The class of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountClass {
    /// Standard campus account for day-to-day spending.
    Checking,

    /// Deposit account; same ledger rules, different reporting bucket.
    Savings,
}

impl AccountClass {
    /// Returns the class name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountClass::Checking => "Checking",
            AccountClass::Savings => "Savings",
        }
    }

    /// Parses a class from its `as_str` form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Checking" => Some(AccountClass::Checking),
            "Savings" => Some(AccountClass::Savings),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Administrative status of an account.
///
/// Only `Active` accounts accept monetary operations. Transitions are
/// administrative and independent of balance; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AccountStatus {
    /// Account accepts deposits, withdrawals, and transfers.
    #[default]
    Active,

    /// Reported lost; frozen until reissued.
    Lost,

    /// Administratively restricted.
    Limited,

    /// Closed for good (terminal state).
    Closed,
}

impl AccountStatus {
    /// Returns true if monetary operations are accepted in this status.
    pub fn can_transact(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }

    /// Returns true if no further status changes are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AccountStatus::Closed)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "Active",
            AccountStatus::Lost => "Lost",
            AccountStatus::Limited => "Limited",
            AccountStatus::Closed => "Closed",
        }
    }

    /// Parses a status from its `as_str` form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(AccountStatus::Active),
            "Lost" => Some(AccountStatus::Lost),
            "Limited" => Some(AccountStatus::Limited),
            "Closed" => Some(AccountStatus::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A monetary account.
///
/// The balance is never negative; every change to it goes through the
/// ledger store as an atomic balance mutation paired with exactly one
/// ledger entry. `version` backs the store's optimistic concurrency
/// check and increments on every balance mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier.
    pub id: AccountId,

    /// Owning actor.
    pub owner: ActorId,

    /// Salted one-way hash of the account secret.
    pub credential: Credential,

    /// Account class.
    pub class: AccountClass,

    /// Current balance.
    pub balance: Money,

    /// Administrative status.
    pub status: AccountStatus,

    /// When the account was opened.
    pub created_at: DateTime<Utc>,

    /// Optimistic concurrency counter for balance mutations.
    pub version: i64,
}

impl Account {
    /// Opens a new active account with a zero balance.
    pub fn open(owner: ActorId, class: AccountClass, credential: Credential) -> Self {
        Self {
            id: AccountId::new(),
            owner,
            credential,
            class,
            balance: Money::zero(),
            status: AccountStatus::Active,
            created_at: Utc::now(),
            version: 1,
        }
    }

    /// Returns true if the account currently accepts monetary operations.
    pub fn is_active(&self) -> bool {
        self.status.can_transact()
    }
}
