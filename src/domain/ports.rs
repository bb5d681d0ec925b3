use super::card::CardDetails;
use super::money::Amount;
use super::order::OrderId;
use super::pending::PendingPayment;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub type PendingStoreBox = Box<dyn PendingStore>;
pub type PaymentGatewayBox = Box<dyn PaymentGateway>;

/// Durable record of charge attempts awaiting a gateway answer.
#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Every recorded attempt for the account, oldest first.
    async fn list(&self, account_id: &str) -> Result<Vec<PendingPayment>>;

    /// Persists an attempt. Must be durable before the caller dispatches
    /// the charge it describes.
    async fn save(&self, account_id: &str, pending: PendingPayment) -> Result<()>;

    /// Drops a settled attempt. Removing an order that is not there is
    /// not an error.
    async fn remove(&self, account_id: &str, order_id: &OrderId) -> Result<()>;
}

/// Everything the collection ledger records ahead of a charge.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub order_id: OrderId,
    pub merchant_id: String,
    pub order_date: String,
    pub amount: Amount,
    pub product_summary: String,
    pub customer_id: String,
    pub account_id: String,
}

/// The charge dispatch payload. Holds the only live copy of the card.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub order_id: OrderId,
    pub merchant_id: String,
    pub order_date: String,
    pub amount: Amount,
    pub card: CardDetails,
}

/// Probe for a previously dispatched charge, built from its captured
/// fields so the gateway matches the original attempt exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRequest {
    pub order_id: OrderId,
    pub merchant_id: String,
    pub order_date: String,
    pub amount: Amount,
}

impl CheckRequest {
    pub fn for_pending(pending: &PendingPayment) -> Self {
        Self {
            order_id: pending.order_id.clone(),
            merchant_id: pending.merchant_id.clone(),
            order_date: pending.order_date.clone(),
            amount: pending.amount,
        }
    }
}

/// Answer to a charge dispatch.
///
/// `TimedOut` means the answer did not arrive, not that the charge failed;
/// the money may have moved and only a later check can tell.
#[derive(Debug, Clone, PartialEq)]
pub enum ChargeOutcome {
    Approved { approval_no: String },
    Declined { reason: String },
    TimedOut,
}

/// Answer to a result check for a recorded attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Approved { approval_no: String },
    Declined { reason: String },
    /// The gateway answered and the charge is still in flight.
    StillPending,
    /// The check itself went unanswered. Says nothing about the charge.
    QueryTimedOut,
}

/// Card-payment gateway operations in the order the collection flow
/// uses them.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Resolves the merchant account that collects for the given branch.
    async fn resolve_merchant(&self, branch_id: &str) -> Result<String>;

    /// Registers the attempt in the collection ledger. Must succeed before
    /// any charge for the same order is dispatched.
    async fn register_ledger(&self, entry: &LedgerEntry) -> Result<()>;

    /// Dispatches the charge and classifies the answer. Once this is called
    /// the money may move, so there is no error channel: transport failures
    /// and elapsed waits come back as `TimedOut`.
    async fn charge(&self, request: &ChargeRequest, wait: Duration) -> ChargeOutcome;

    /// Asks for the settled result of a previously dispatched charge.
    async fn check_result(&self, probe: &CheckRequest, wait: Duration) -> CheckOutcome;
}
