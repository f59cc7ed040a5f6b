//! Durable records of compensation credits that have not yet landed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain::{AccountId, Money, OrderId};

use crate::Result;

/// Unique identifier for a pending-compensation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompensationId(Uuid);

impl CompensationId {
    /// Creates a new random compensation ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a compensation ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CompensationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CompensationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A credit-back that was owed but not yet confirmed.
///
/// Written before the compensating deposit is attempted and removed only
/// once the credit is confirmed, so a crash or storage failure between
/// the two leaves a durable trail the sweeper can re-drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCompensation {
    /// Unique record identifier.
    pub id: CompensationId,

    /// Order whose payment is being unwound.
    pub order_id: OrderId,

    /// Account owed the credit.
    pub account_id: AccountId,

    /// Amount to credit back.
    pub amount: Money,

    /// When the record was written.
    pub created_at: DateTime<Utc>,

    /// How many credit attempts have failed so far.
    pub attempts: i32,

    /// Last failure, for operators.
    pub last_error: Option<String>,
}

impl PendingCompensation {
    /// Creates a fresh record for a credit that is about to be attempted.
    pub fn new(order_id: OrderId, account_id: AccountId, amount: Money) -> Self {
        Self {
            id: CompensationId::new(),
            order_id,
            account_id,
            amount,
            created_at: Utc::now(),
            attempts: 0,
            last_error: None,
        }
    }
}

/// Storage for pending-compensation records.
#[async_trait]
pub trait CompensationStore: Send + Sync {
    /// Writes a new pending record.
    async fn insert_compensation(&self, record: &PendingCompensation) -> Result<()>;

    /// Removes a record whose credit has been confirmed.
    async fn remove_compensation(&self, id: CompensationId) -> Result<()>;

    /// Records one more failed credit attempt against a record.
    async fn record_compensation_attempt(&self, id: CompensationId, error: &str) -> Result<()>;

    /// Lists every record still awaiting its credit, oldest first.
    async fn list_pending_compensations(&self) -> Result<Vec<PendingCompensation>>;
}
