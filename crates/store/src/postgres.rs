use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use common::ActorId;
use domain::{
    Account, AccountClass, AccountId, AccountStatus, Credential, EntryKind, EntryStatus,
    LedgerEntry, LineId, Money, Order, OrderId, OrderLine, OrderStatus, PaymentMethod,
    PaymentStatus, ProductId, TransactionId,
};

use crate::{
    Result, StoreError,
    compensation::{CompensationId, CompensationStore, PendingCompensation},
    ledger::{BalanceMutation, EntryStream, LedgerStore, validate_transaction},
    orders::{OrderStore, StatusTransition},
};

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_account(row: PgRow) -> Result<Account> {
        let class_raw: String = row.try_get("class")?;
        let class = AccountClass::parse(&class_raw)
            .ok_or_else(|| StoreError::Decode(format!("unknown account class: {class_raw}")))?;
        let status_raw: String = row.try_get("status")?;
        let status = AccountStatus::parse(&status_raw)
            .ok_or_else(|| StoreError::Decode(format!("unknown account status: {status_raw}")))?;

        Ok(Account {
            id: AccountId::from_uuid(row.try_get::<Uuid, _>("id")?),
            owner: ActorId::from_uuid(row.try_get::<Uuid, _>("owner")?),
            credential: Credential::from_parts(
                row.try_get("credential_salt")?,
                row.try_get("credential_digest")?,
            ),
            class,
            balance: Money::from_cents(row.try_get("balance_cents")?),
            status,
            created_at: row.try_get("created_at")?,
            version: row.try_get("version")?,
        })
    }

    fn row_to_entry(row: PgRow) -> Result<LedgerEntry> {
        let kind_raw: String = row.try_get("kind")?;
        let kind = EntryKind::parse(&kind_raw)
            .ok_or_else(|| StoreError::Decode(format!("unknown entry kind: {kind_raw}")))?;
        let status_raw: String = row.try_get("status")?;
        let status = EntryStatus::parse(&status_raw)
            .ok_or_else(|| StoreError::Decode(format!("unknown entry status: {status_raw}")))?;

        Ok(LedgerEntry {
            id: TransactionId::from_uuid(row.try_get::<Uuid, _>("id")?),
            source: row
                .try_get::<Option<Uuid>, _>("source_account")?
                .map(AccountId::from_uuid),
            destination: row
                .try_get::<Option<Uuid>, _>("destination_account")?
                .map(AccountId::from_uuid),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            kind,
            recorded_at: row.try_get("recorded_at")?,
            memo: row.try_get("memo")?,
            status,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status_raw: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_raw)
            .ok_or_else(|| StoreError::Decode(format!("unknown order status: {status_raw}")))?;
        let payment_status_raw: String = row.try_get("payment_status")?;
        let payment_status = PaymentStatus::parse(&payment_status_raw).ok_or_else(|| {
            StoreError::Decode(format!("unknown payment status: {payment_status_raw}"))
        })?;
        let payment_method = row
            .try_get::<Option<String>, _>("payment_method")?
            .map(|raw| {
                PaymentMethod::parse(&raw)
                    .ok_or_else(|| StoreError::Decode(format!("unknown payment method: {raw}")))
            })
            .transpose()?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            owner: ActorId::from_uuid(row.try_get::<Uuid, _>("owner")?),
            total: Money::from_cents(row.try_get("total_cents")?),
            status,
            payment_method,
            payment_status,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_line(row: PgRow) -> Result<OrderLine> {
        Ok(OrderLine {
            id: LineId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            quantity: row.try_get::<i32, _>("quantity")? as u32,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
        })
    }

    fn row_to_compensation(row: PgRow) -> Result<PendingCompensation> {
        Ok(PendingCompensation {
            id: CompensationId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            account_id: AccountId::from_uuid(row.try_get::<Uuid, _>("account_id")?),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            created_at: row.try_get("created_at")?,
            attempts: row.try_get("attempts")?,
            last_error: row.try_get("last_error")?,
        })
    }
}

#[async_trait]
impl LedgerStore for PostgresStore {
    async fn insert_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, owner, credential_salt, credential_digest, class, balance_cents, status, created_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(account.owner.as_uuid())
        .bind(account.credential.salt())
        .bind(account.credential.digest())
        .bind(account.class.as_str())
        .bind(account.balance.cents())
        .bind(account.status.as_str())
        .bind(account.created_at)
        .bind(account.version)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("accounts_pkey")
            {
                return StoreError::AccountExists(account.id);
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get_account(&self, account_id: AccountId) -> Result<Option<Account>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, owner, credential_salt, credential_digest, class, balance_cents, status, created_at, version
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(account_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_account).transpose()
    }

    async fn update_account_status(
        &self,
        account_id: AccountId,
        status: AccountStatus,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE accounts SET status = $2, version = version + 1 WHERE id = $1")
                .bind(account_id.as_uuid())
                .bind(status.as_str())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AccountNotFound(account_id));
        }
        Ok(())
    }

    async fn apply_transaction(
        &self,
        mutations: &[BalanceMutation],
        entry: &LedgerEntry,
    ) -> Result<()> {
        validate_transaction(mutations, entry)?;

        let mut tx = self.pool.begin().await?;

        // Rows are updated in ascending account id order so two
        // concurrent transfers over the same pair cannot deadlock.
        let mut ordered: Vec<&BalanceMutation> = mutations.iter().collect();
        ordered.sort_by_key(|m| m.account_id);

        for mutation in ordered {
            let result = sqlx::query(
                "UPDATE accounts SET balance_cents = $2, version = version + 1 WHERE id = $1 AND version = $3",
            )
            .bind(mutation.account_id.as_uuid())
            .bind(mutation.new_balance.cents())
            .bind(mutation.expected_version)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls back earlier updates.
                let actual: Option<i64> =
                    sqlx::query_scalar("SELECT version FROM accounts WHERE id = $1")
                        .bind(mutation.account_id.as_uuid())
                        .fetch_optional(&mut *tx)
                        .await?;

                return Err(match actual {
                    Some(actual) => StoreError::VersionConflict {
                        account_id: mutation.account_id,
                        expected: mutation.expected_version,
                        actual,
                    },
                    None => StoreError::AccountNotFound(mutation.account_id),
                });
            }
        }

        sqlx::query(
            r#"
            INSERT INTO ledger_entries (id, source_account, destination_account, amount_cents, kind, recorded_at, memo, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.source.map(|a| a.as_uuid()))
        .bind(entry.destination.map(|a| a.as_uuid()))
        .bind(entry.amount.cents())
        .bind(entry.kind.as_str())
        .bind(entry.recorded_at)
        .bind(&entry.memo)
        .bind(entry.status.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn entries_for_account(
        &self,
        account_id: AccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, source_account, destination_account, amount_cents, kind, recorded_at, memo, status
            FROM ledger_entries
            WHERE (source_account = $1 OR destination_account = $1)
              AND recorded_at >= $2
              AND recorded_at < $3
            ORDER BY recorded_at ASC
            "#,
        )
        .bind(account_id.as_uuid())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn stream_entries(&self) -> Result<EntryStream> {
        use futures_util::StreamExt;

        let stream = sqlx::query(
            r#"
            SELECT id, source_account, destination_account, amount_cents, kind, recorded_at, memo, status
            FROM ledger_entries
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .fetch(&self.pool)
        .map(|result| match result {
            Ok(row) => Self::row_to_entry(row),
            Err(e) => Err(StoreError::Database(e)),
        });

        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, order: &Order, lines: &[OrderLine]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, owner, total_cents, status, payment_method, payment_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.owner.as_uuid())
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .bind(order.payment_method.map(|m| m.as_str()))
        .bind(order.payment_status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (index, line) in lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (id, order_id, line_no, product_id, quantity, unit_price_cents, subtotal_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(line.id.as_uuid())
            .bind(line.order_id.as_uuid())
            .bind(index as i32)
            .bind(line.product_id.as_str())
            .bind(line.quantity as i32)
            .bind(line.unit_price.cents())
            .bind(line.subtotal.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, owner, total_cents, status, payment_method, payment_status, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn lines_for_order(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price_cents, subtotal_cents
            FROM order_lines
            WHERE order_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_line).collect()
    }

    async fn transition_order(
        &self,
        order_id: OrderId,
        transition: StatusTransition,
    ) -> Result<()> {
        let result = if let Some(payment) = transition.payment {
            sqlx::query(
                r#"
                UPDATE orders
                SET status = $2, payment_method = $3, payment_status = $4, updated_at = $5
                WHERE id = $1 AND status = $6
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(transition.to.as_str())
            .bind(payment.method.as_str())
            .bind(payment.status.as_str())
            .bind(Utc::now())
            .bind(transition.expected.as_str())
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE orders
                SET status = $2, updated_at = $3
                WHERE id = $1 AND status = $4
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(transition.to.as_str())
            .bind(Utc::now())
            .bind(transition.expected.as_str())
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            let actual: Option<String> =
                sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                    .bind(order_id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await?;

            return match actual {
                Some(raw) => {
                    let actual = OrderStatus::parse(&raw)
                        .ok_or_else(|| StoreError::Decode(format!("unknown order status: {raw}")))?;
                    Err(StoreError::StatusConflict {
                        order_id,
                        expected: transition.expected,
                        actual,
                    })
                }
                None => Err(StoreError::OrderNotFound(order_id)),
            };
        }

        Ok(())
    }
}

#[async_trait]
impl CompensationStore for PostgresStore {
    async fn insert_compensation(&self, record: &PendingCompensation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pending_compensations (id, order_id, account_id, amount_cents, created_at, attempts, last_error)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.order_id.as_uuid())
        .bind(record.account_id.as_uuid())
        .bind(record.amount.cents())
        .bind(record.created_at)
        .bind(record.attempts)
        .bind(&record.last_error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_compensation(&self, id: CompensationId) -> Result<()> {
        let result = sqlx::query("DELETE FROM pending_compensations WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::CompensationNotFound(id));
        }
        Ok(())
    }

    async fn record_compensation_attempt(&self, id: CompensationId, error: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE pending_compensations SET attempts = attempts + 1, last_error = $2 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::CompensationNotFound(id));
        }
        Ok(())
    }

    async fn list_pending_compensations(&self) -> Result<Vec<PendingCompensation>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, account_id, amount_cents, created_at, attempts, last_error
            FROM pending_compensations
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_compensation).collect()
    }
}
