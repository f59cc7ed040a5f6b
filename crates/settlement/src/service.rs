//! Settlement service: order lifecycle orchestration and compensation.

use std::time::Instant;

use common::ActorId;
use domain::{
    AccountId, Money, Order, OrderId, OrderLine, OrderStatus, PaymentMethod, ProductId,
};
use ledger::LedgerService;
use store::{
    CompensationStore, LedgerStore, OrderStore, PendingCompensation, StatusTransition, StoreError,
};

use crate::error::{Result, SettlementError};
use crate::gateways::{CartGateway, CartItemId, CartLine, InventoryGateway};
use crate::pricing::{DiscountPolicy, NoDiscount, OrderPreview, PricedLine};

/// What a successful order creation hands back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderReceipt {
    /// The new order's identifier.
    pub order_id: OrderId,

    /// The total that payment will debit.
    pub total: Money,
}

/// One line of an order detail, with its product name resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailLine {
    /// The frozen order line.
    pub line: OrderLine,

    /// Product name from the catalog, or the product ID when the
    /// catalog no longer knows it.
    pub product_name: String,
}

/// Read-only projection of an order and its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDetail {
    /// The order header.
    pub order: Order,

    /// The order's lines in insertion order.
    pub lines: Vec<DetailLine>,
}

/// Outcome of one compensation sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Records whose credit was re-attempted.
    pub retried: usize,

    /// Records whose credit landed and was removed.
    pub settled: usize,
}

/// Orchestrates the order lifecycle against the ledger, the cart and
/// inventory gateways, and the order store.
///
/// Payment is the one multi-resource step: it debits the ledger, then
/// commits inventory, and compensates the debit with a credit-back when
/// the commit fails. The compensating credit is written through a
/// durable pending-compensation record so a failed credit is never
/// silently lost.
pub struct SettlementService<S, L, C, I>
where
    S: OrderStore + CompensationStore,
    L: LedgerStore,
    C: CartGateway,
    I: InventoryGateway,
{
    store: S,
    ledger: LedgerService<L>,
    cart: C,
    inventory: I,
    discount: Box<dyn DiscountPolicy>,
}

impl<S, L, C, I> SettlementService<S, L, C, I>
where
    S: OrderStore + CompensationStore,
    L: LedgerStore,
    C: CartGateway,
    I: InventoryGateway,
{
    /// Creates a new settlement service with the identity discount.
    pub fn new(store: S, ledger: LedgerService<L>, cart: C, inventory: I) -> Self {
        Self {
            store,
            ledger,
            cart,
            inventory,
            discount: Box::new(NoDiscount),
        }
    }

    /// Replaces the discount policy.
    pub fn with_discount_policy(mut self, policy: impl DiscountPolicy + 'static) -> Self {
        self.discount = Box::new(policy);
        self
    }

    /// Prices the owner's cart without creating anything.
    ///
    /// Resolves the cart lines (optionally an explicit subset), prices
    /// each against the current catalog, and applies the discount
    /// policy. Read-only; an empty resolution is rejected exactly as
    /// `create` would reject it.
    #[tracing::instrument(skip(self))]
    pub async fn preview(
        &self,
        owner: ActorId,
        explicit: Option<&[CartItemId]>,
    ) -> Result<OrderPreview> {
        let lines = self.cart.resolve_lines(owner, explicit).await?;
        if lines.is_empty() {
            return Err(SettlementError::EmptyOrder);
        }
        self.price(owner, &lines).await
    }

    /// Turns the owner's cart into a pending order.
    ///
    /// Stock is checked for every line before anything is written: any
    /// shortfall aborts the whole call. On success the order header and
    /// its frozen lines land atomically, and the consumed cart lines
    /// are cleared on a best-effort basis.
    #[tracing::instrument(skip(self))]
    pub async fn create(
        &self,
        owner: ActorId,
        explicit: Option<&[CartItemId]>,
    ) -> Result<OrderReceipt> {
        let cart_lines = self.cart.resolve_lines(owner, explicit).await?;
        if cart_lines.is_empty() {
            return Err(SettlementError::EmptyOrder);
        }

        // All-or-nothing early check. Authoritative stock is only taken
        // at pay time; this keeps obviously doomed orders out.
        for line in &cart_lines {
            if !self
                .inventory
                .check_available(&line.product_id, line.quantity)
                .await?
            {
                return Err(SettlementError::InsufficientStock {
                    product: line.product_id.clone(),
                });
            }
        }

        let preview = self.price(owner, &cart_lines).await?;
        let order = Order::create(owner, preview.final_total);
        let order_lines: Vec<OrderLine> = preview
            .lines
            .iter()
            .map(|priced| {
                OrderLine::new(
                    order.id,
                    priced.product_id.clone(),
                    priced.quantity,
                    priced.unit_price,
                )
            })
            .collect();

        self.store.insert_order(&order, &order_lines).await?;

        // The order is durable at this point; a cart that fails to clear
        // only leaves stale lines behind, so it must not fail the call.
        let consumed: Vec<CartItemId> = cart_lines.iter().map(|line| line.id).collect();
        if let Err(e) = self.cart.clear(owner, &consumed).await {
            tracing::warn!(order_id = %order.id, %owner, error = %e, "consumed cart lines not cleared");
        }

        metrics::counter!("settlement_orders_created_total").increment(1);
        tracing::info!(order_id = %order.id, %owner, total = %order.total, "order created");

        Ok(OrderReceipt {
            order_id: order.id,
            total: order.total,
        })
    }

    /// Pays a pending order from a ledger account.
    ///
    /// Step 1 debits the account for the order total; any ledger
    /// failure aborts with no further effect. Step 2 commits inventory
    /// per line; a shortfall releases what was already committed and
    /// refunds the debit through the durable compensation path, leaving
    /// the order `Pending`. Step 3 flips the order to `Paid` under a
    /// status guard; losing that guard compensates the same way.
    #[tracing::instrument(skip(self, secret))]
    pub async fn pay(
        &self,
        owner: ActorId,
        order_id: OrderId,
        account_id: AccountId,
        secret: &str,
        method: PaymentMethod,
    ) -> Result<()> {
        let start = Instant::now();
        let order = self.require_owned(owner, order_id).await?;
        if !order.status.can_pay() {
            return Err(SettlementError::InvalidTransition {
                from: order.status,
                action: "pay",
            });
        }
        let lines = self.store.lines_for_order(order_id).await?;

        // Step 1: debit the account.
        self.ledger
            .withdraw(
                account_id,
                order.total,
                secret,
                &format!("Payment for order {order_id}"),
            )
            .await?;

        // Step 2: commit stock line by line.
        let mut committed: Vec<(ProductId, u32)> = Vec::with_capacity(lines.len());
        for line in &lines {
            match self.inventory.commit(&line.product_id, line.quantity).await {
                Ok(true) => committed.push((line.product_id.clone(), line.quantity)),
                Ok(false) => {
                    self.unwind_payment(order_id, account_id, order.total, &committed)
                        .await;
                    metrics::counter!("settlement_payments_total", "outcome" => "compensated")
                        .increment(1);
                    metrics::histogram!("settlement_pay_duration_seconds")
                        .record(start.elapsed().as_secs_f64());
                    return Err(SettlementError::InsufficientStock {
                        product: line.product_id.clone(),
                    });
                }
                Err(e) => {
                    self.unwind_payment(order_id, account_id, order.total, &committed)
                        .await;
                    metrics::counter!("settlement_payments_total", "outcome" => "compensated")
                        .increment(1);
                    return Err(e);
                }
            }
        }

        // Step 3: guarded flip to Paid.
        let transition =
            StatusTransition::with_payment(OrderStatus::Pending, OrderStatus::Paid, method);
        match self.store.transition_order(order_id, transition).await {
            Ok(()) => {
                metrics::counter!("settlement_payments_total", "outcome" => "paid").increment(1);
                metrics::histogram!("settlement_pay_duration_seconds")
                    .record(start.elapsed().as_secs_f64());
                tracing::info!(%order_id, %account_id, total = %order.total, "order paid");
                Ok(())
            }
            Err(StoreError::StatusConflict { actual, .. }) => {
                // A concurrent transition won between our status read
                // and the flip; everything taken so far is returned.
                self.unwind_payment(order_id, account_id, order.total, &committed)
                    .await;
                metrics::counter!("settlement_payments_total", "outcome" => "compensated")
                    .increment(1);
                Err(SettlementError::InvalidTransition {
                    from: actual,
                    action: "pay",
                })
            }
            Err(e) => {
                self.unwind_payment(order_id, account_id, order.total, &committed)
                    .await;
                metrics::counter!("settlement_payments_total", "outcome" => "compensated")
                    .increment(1);
                Err(e.into())
            }
        }
    }

    /// Staff action: moves a paid order to `Shipped`.
    #[tracing::instrument(skip(self))]
    pub async fn deliver(&self, actor: ActorId, order_id: OrderId) -> Result<()> {
        let order = self.require_order(order_id).await?;
        if !order.status.can_ship() {
            return Err(SettlementError::InvalidTransition {
                from: order.status,
                action: "deliver",
            });
        }

        self.store
            .transition_order(
                order_id,
                StatusTransition::new(OrderStatus::Paid, OrderStatus::Shipped),
            )
            .await
            .map_err(|e| map_conflict(e, "deliver"))?;

        tracing::info!(%order_id, staff = %actor, "order shipped");
        Ok(())
    }

    /// Owner confirms receipt, completing the order.
    ///
    /// Accepted from `Paid` as well as `Shipped`, covering in-person
    /// pickup where nothing ships.
    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, owner: ActorId, order_id: OrderId) -> Result<()> {
        let order = self.require_owned(owner, order_id).await?;
        if !order.status.can_confirm() {
            return Err(SettlementError::InvalidTransition {
                from: order.status,
                action: "confirm",
            });
        }

        self.store
            .transition_order(
                order_id,
                StatusTransition::new(order.status, OrderStatus::Completed),
            )
            .await
            .map_err(|e| map_conflict(e, "confirm"))?;

        tracing::info!(%order_id, "order completed");
        Ok(())
    }

    /// Owner cancels a still-unpaid order.
    ///
    /// Nothing was debited or committed at `Pending`, so no rollback of
    /// any kind is needed.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, owner: ActorId, order_id: OrderId) -> Result<()> {
        let order = self.require_owned(owner, order_id).await?;
        if !order.status.can_cancel() {
            return Err(SettlementError::InvalidTransition {
                from: order.status,
                action: "cancel",
            });
        }

        self.store
            .transition_order(
                order_id,
                StatusTransition::new(OrderStatus::Pending, OrderStatus::Cancelled),
            )
            .await
            .map_err(|e| map_conflict(e, "cancel"))?;

        tracing::info!(%order_id, "order cancelled");
        Ok(())
    }

    /// Read-only projection of an order, its lines, and product names.
    #[tracing::instrument(skip(self))]
    pub async fn detail(&self, owner: ActorId, order_id: OrderId) -> Result<OrderDetail> {
        let order = self.require_owned(owner, order_id).await?;
        let lines = self.store.lines_for_order(order_id).await?;

        let mut detail_lines = Vec::with_capacity(lines.len());
        for line in lines {
            let product_name = self
                .inventory
                .name_of(&line.product_id)
                .await?
                .unwrap_or_else(|| line.product_id.to_string());
            detail_lines.push(DetailLine { line, product_name });
        }

        Ok(OrderDetail {
            order,
            lines: detail_lines,
        })
    }

    /// Re-drives every pending compensation credit.
    ///
    /// Operator-facing sweeper: records whose credit lands are removed;
    /// the rest get one more recorded attempt and stay for the next
    /// sweep.
    #[tracing::instrument(skip(self))]
    pub async fn retry_pending_compensations(&self) -> Result<SweepReport> {
        let pending = self.store.list_pending_compensations().await?;
        let retried = pending.len();
        let mut settled = 0;

        for record in pending {
            let memo = format!("Refund for order {}", record.order_id);
            match self.ledger.refund(record.account_id, record.amount, &memo).await {
                Ok(_) => {
                    self.store.remove_compensation(record.id).await?;
                    metrics::counter!("settlement_compensations_total").increment(1);
                    tracing::info!(
                        order_id = %record.order_id,
                        account_id = %record.account_id,
                        amount = %record.amount,
                        "pending compensation settled"
                    );
                    settled += 1;
                }
                Err(e) => {
                    tracing::error!(
                        order_id = %record.order_id,
                        account_id = %record.account_id,
                        amount = %record.amount,
                        error = %e,
                        "pending compensation still failing"
                    );
                    self.store
                        .record_compensation_attempt(record.id, &e.to_string())
                        .await?;
                }
            }
        }

        Ok(SweepReport { retried, settled })
    }

    /// Prices cart lines against the current catalog and applies the
    /// discount policy.
    async fn price(&self, owner: ActorId, cart_lines: &[CartLine]) -> Result<OrderPreview> {
        let mut lines = Vec::with_capacity(cart_lines.len());
        for cart_line in cart_lines {
            let unit_price = self.inventory.price_of(&cart_line.product_id).await?;
            lines.push(PricedLine {
                product_id: cart_line.product_id.clone(),
                quantity: cart_line.quantity,
                unit_price,
                subtotal: unit_price.multiply(cart_line.quantity),
            });
        }

        let original_total: Money = lines.iter().map(|line| line.subtotal).sum();
        let final_total = self.discount.apply(owner, original_total);

        Ok(OrderPreview {
            lines,
            original_total,
            final_total,
        })
    }

    /// Returns committed stock and credits the debit back, durably.
    ///
    /// The pending-compensation record is written before the credit is
    /// attempted and removed only once it lands, so a credit that fails
    /// here is never lost: the sweeper finds the record and re-drives
    /// it. If even the record cannot be written, the failure is
    /// escalated as a fatal operator-visible inconsistency.
    async fn unwind_payment(
        &self,
        order_id: OrderId,
        account_id: AccountId,
        amount: Money,
        committed: &[(ProductId, u32)],
    ) {
        for (product, quantity) in committed.iter().rev() {
            if let Err(e) = self.inventory.release(product, *quantity).await {
                tracing::warn!(%order_id, %product, quantity, error = %e, "stock release failed");
            }
        }

        let record = PendingCompensation::new(order_id, account_id, amount);
        let outbox_written = match self.store.insert_compensation(&record).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    %order_id, %account_id, %amount, error = %e,
                    "failed to record pending compensation before refund"
                );
                false
            }
        };

        let memo = format!("Refund for order {order_id}");
        match self.ledger.refund(account_id, amount, &memo).await {
            Ok(_) => {
                if outbox_written
                    && let Err(e) = self.store.remove_compensation(record.id).await
                {
                    tracing::warn!(%order_id, error = %e, "settled compensation record not removed");
                }
                metrics::counter!("settlement_compensations_total").increment(1);
                tracing::warn!(%order_id, %account_id, %amount, "payment compensated");
            }
            Err(e) => {
                metrics::counter!("settlement_compensation_failures_total").increment(1);
                tracing::error!(
                    %order_id, %account_id, %amount, error = %e,
                    "compensating credit failed; account debited without a fulfilled order"
                );
                if outbox_written
                    && let Err(attempt_err) = self
                        .store
                        .record_compensation_attempt(record.id, &e.to_string())
                        .await
                {
                    tracing::error!(%order_id, error = %attempt_err, "failed to record compensation attempt");
                }
            }
        }
    }

    async fn require_order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or(SettlementError::OrderNotFound(order_id))
    }

    async fn require_owned(&self, owner: ActorId, order_id: OrderId) -> Result<Order> {
        let order = self.require_order(order_id).await?;
        if !order.is_owned_by(owner) {
            return Err(SettlementError::Forbidden);
        }
        Ok(order)
    }
}

fn map_conflict(e: StoreError, action: &'static str) -> SettlementError {
    match e {
        StoreError::StatusConflict { actual, .. } => SettlementError::InvalidTransition {
            from: actual,
            action,
        },
        other => other.into(),
    }
}
