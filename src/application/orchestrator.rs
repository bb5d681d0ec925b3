use crate::domain::card::CardDetails;
use crate::domain::item::{ItemKey, ItemStatus, UnpaidItem};
use crate::domain::money::Amount;
use crate::domain::order::{OrderId, OrderIdGenerator};
use crate::domain::pending::PendingPayment;
use crate::domain::ports::{
    ChargeOutcome, ChargeRequest, CheckOutcome, CheckRequest, LedgerEntry, PaymentGatewayBox,
    PendingStoreBox,
};
use crate::error::{CollectionError, Result};
use chrono::Local;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::time::Duration;

/// Default bound on both the charge call and the result check.
pub const DEFAULT_GATEWAY_WAIT: Duration = Duration::from_secs(10);

/// The customer and payment account a collection session works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionTarget {
    pub customer_id: String,
    pub account_id: String,
}

impl CollectionTarget {
    pub fn new(customer_id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            account_id: account_id.into(),
        }
    }
}

/// Session-level knobs. The branch decides which merchant account
/// collects; the timeouts bound the only two long suspension points.
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub branch_id: String,
    pub charge_timeout: Duration,
    pub check_timeout: Duration,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            branch_id: String::new(),
            charge_timeout: DEFAULT_GATEWAY_WAIT,
            check_timeout: DEFAULT_GATEWAY_WAIT,
        }
    }
}

impl CollectionConfig {
    pub fn with_branch_id(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = branch_id.into();
        self
    }

    pub fn with_charge_timeout(mut self, timeout: Duration) -> Self {
        self.charge_timeout = timeout;
        self
    }

    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }
}

/// What a dispatched charge came back as.
///
/// `Pending` is the ambiguous branch: the attempt is durably recorded and
/// will be settled by a later [`CollectionOrchestrator::check_pending`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Paid {
        order_id: OrderId,
        amount: Amount,
        approval_no: String,
    },
    Pending {
        order_id: OrderId,
        amount: Amount,
    },
    Declined {
        order_id: OrderId,
        reason: String,
    },
}

/// What reconciling one pending attempt concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckStatus {
    Paid { approval_no: String },
    Declined { reason: String },
    /// The gateway answered: the charge is still in flight.
    StillPending,
    /// The check went unanswered; nothing is known and nothing changed.
    Unanswered,
}

/// The main entry point for deferred card-payment collection.
///
/// `CollectionOrchestrator` drives one payment account through selection,
/// charge dispatch and reconciliation. It owns the storage and gateway
/// backends; every state-transitioning operation takes `&mut self`, so no
/// two operations for the account can overlap.
///
/// `submit_payment` returns `Err(_)` only when no charge was dispatched.
/// Every dispatched attempt resolves to an explicit [`SubmitOutcome`].
pub struct CollectionOrchestrator {
    target: CollectionTarget,
    config: CollectionConfig,
    items: Vec<UnpaidItem>,
    selection: BTreeSet<ItemKey>,
    completed: BTreeSet<ItemKey>,
    store: PendingStoreBox,
    gateway: PaymentGatewayBox,
    order_ids: OrderIdGenerator,
}

impl CollectionOrchestrator {
    pub fn new(
        target: CollectionTarget,
        config: CollectionConfig,
        items: Vec<UnpaidItem>,
        store: PendingStoreBox,
        gateway: PaymentGatewayBox,
    ) -> Self {
        Self {
            target,
            config,
            items: Self::dedup_items(items),
            selection: BTreeSet::new(),
            completed: BTreeSet::new(),
            store,
            gateway,
            order_ids: OrderIdGenerator::new(),
        }
    }

    pub fn items(&self) -> &[UnpaidItem] {
        &self.items
    }

    /// Replaces the unpaid list after the caller reloaded balances.
    ///
    /// Selection drops keys that vanished; pending records keep their
    /// captured amounts regardless of how the new list drifted.
    pub fn refresh_items(&mut self, items: Vec<UnpaidItem>) {
        let items = Self::dedup_items(items);
        let listed: BTreeSet<ItemKey> = items.iter().map(UnpaidItem::key).collect();
        self.selection.retain(|key| listed.contains(key));
        self.completed.retain(|key| listed.contains(key));
        self.items = items;
    }

    /// Flips the selection state of one item.
    ///
    /// Keys covered by an in-flight attempt, already completed, or not in
    /// the list are not selectable; toggling them is a no-op. Returns
    /// whether the key is selected after the call.
    pub async fn toggle(&mut self, key: &ItemKey) -> Result<bool> {
        if self.selection.remove(key) {
            return Ok(false);
        }
        if !self.is_listed(key) || self.completed.contains(key) {
            return Ok(false);
        }
        if self.covered_keys().await?.contains(key) {
            return Ok(false);
        }
        self.selection.insert(key.clone());
        Ok(true)
    }

    /// Selects every eligible item. Returns the selection size.
    pub async fn select_all(&mut self) -> Result<usize> {
        let covered = self.covered_keys().await?;
        for key in self.items.iter().map(UnpaidItem::key) {
            if !covered.contains(&key) && !self.completed.contains(&key) {
                self.selection.insert(key);
            }
        }
        Ok(self.selection.len())
    }

    pub fn clear_all(&mut self) {
        self.selection.clear();
    }

    pub fn selection(&self) -> &BTreeSet<ItemKey> {
        &self.selection
    }

    /// Sum of the outstanding amounts of the selected items.
    pub fn selected_total(&self) -> Decimal {
        self.items
            .iter()
            .filter(|item| self.selection.contains(&item.key()))
            .map(|item| item.unpay_amt.value())
            .sum()
    }

    /// In-flight attempts for the account, oldest first.
    pub async fn pending(&self) -> Result<Vec<PendingPayment>> {
        self.store.list(&self.target.account_id).await
    }

    pub async fn pending_total(&self) -> Result<Decimal> {
        Ok(self
            .pending()
            .await?
            .iter()
            .map(|record| record.amount.value())
            .sum())
    }

    /// Every listed item with its derived status.
    pub async fn statuses(&self) -> Result<Vec<(UnpaidItem, ItemStatus)>> {
        let covered = self.covered_keys().await?;
        Ok(self
            .items
            .iter()
            .map(|item| {
                let key = item.key();
                let status = if covered.contains(&key) {
                    ItemStatus::Pending
                } else if self.completed.contains(&key) {
                    ItemStatus::Completed
                } else if self.selection.contains(&key) {
                    ItemStatus::Selected
                } else {
                    ItemStatus::Unselected
                };
                (item.clone(), status)
            })
            .collect())
    }

    /// Charges the selected items in one attempt.
    ///
    /// The sequence is fixed: verify the selection, resolve the merchant,
    /// register the ledger entry, persist the pending record, and only then
    /// dispatch the charge. Any failure up to and including the record
    /// write aborts with an error and no money at risk. After dispatch the
    /// three-way gateway answer maps onto [`SubmitOutcome`]; a missing
    /// answer retains the record as pending instead of failing.
    pub async fn submit_payment(&mut self, card: &CardDetails) -> Result<SubmitOutcome> {
        if self.selection.is_empty() {
            return Err(CollectionError::ValidationError(
                "Nothing is selected for payment".to_string(),
            ));
        }
        let amount = Amount::new(self.selected_total())?;

        // The store is the source of truth for the double-charge guard.
        let covered = self.covered_keys().await?;
        if let Some(key) = self.selection.iter().find(|key| covered.contains(*key)) {
            return Err(CollectionError::AlreadyPending(key.clone()));
        }

        let merchant_id = self.gateway.resolve_merchant(&self.config.branch_id).await?;

        let order_id = self.order_ids.next();
        let order_date = Local::now().format("%Y%m%d").to_string();

        self.gateway
            .register_ledger(&LedgerEntry {
                order_id: order_id.clone(),
                merchant_id: merchant_id.clone(),
                order_date: order_date.clone(),
                amount,
                product_summary: self.product_summary(),
                customer_id: self.target.customer_id.clone(),
                account_id: self.target.account_id.clone(),
            })
            .await?;

        // Durability precedes risk: the record must be on disk before the
        // charge leaves the process. A store failure aborts the attempt.
        let covers: BTreeSet<ItemKey> = std::mem::take(&mut self.selection);
        let record = PendingPayment::capture(
            order_id.clone(),
            merchant_id.clone(),
            order_date.clone(),
            amount,
            card,
            covers.clone(),
        );
        if let Err(err) = self.store.save(&self.target.account_id, record).await {
            self.selection = covers;
            return Err(err);
        }

        tracing::info!(order_id = %order_id, amount = %amount, "charge dispatched");
        let request = ChargeRequest {
            order_id: order_id.clone(),
            merchant_id,
            order_date,
            amount,
            card: card.clone(),
        };
        match self.gateway.charge(&request, self.config.charge_timeout).await {
            ChargeOutcome::Approved { approval_no } => {
                self.drop_record(&order_id).await;
                self.completed.extend(covers);
                tracing::info!(order_id = %order_id, approval_no = %approval_no, "payment approved");
                Ok(SubmitOutcome::Paid {
                    order_id,
                    amount,
                    approval_no,
                })
            }
            ChargeOutcome::Declined { reason } => {
                self.drop_record(&order_id).await;
                tracing::warn!(order_id = %order_id, reason = %reason, "payment declined");
                Ok(SubmitOutcome::Declined { order_id, reason })
            }
            ChargeOutcome::TimedOut => {
                tracing::warn!(order_id = %order_id, "no gateway answer, attempt retained as pending");
                Ok(SubmitOutcome::Pending { order_id, amount })
            }
        }
    }

    /// Reconciles one retained attempt against the gateway.
    ///
    /// The probe reuses the amount, order date and merchant captured at
    /// dispatch. An unknown order id is an error and changes nothing, so
    /// repeating a check after a definite outcome is harmless.
    pub async fn check_pending(&mut self, order_id: &OrderId) -> Result<CheckStatus> {
        let record = self
            .pending()
            .await?
            .into_iter()
            .find(|record| &record.order_id == order_id)
            .ok_or_else(|| CollectionError::UnknownOrder(order_id.clone()))?;

        let probe = CheckRequest::for_pending(&record);
        match self.gateway.check_result(&probe, self.config.check_timeout).await {
            CheckOutcome::Approved { approval_no } => {
                self.drop_record(order_id).await;
                self.completed.extend(record.covers.iter().cloned());
                tracing::info!(order_id = %order_id, approval_no = %approval_no, "pending attempt settled as paid");
                Ok(CheckStatus::Paid { approval_no })
            }
            CheckOutcome::Declined { reason } => {
                self.drop_record(order_id).await;
                tracing::warn!(order_id = %order_id, reason = %reason, "pending attempt settled as declined");
                Ok(CheckStatus::Declined { reason })
            }
            CheckOutcome::StillPending => Ok(CheckStatus::StillPending),
            CheckOutcome::QueryTimedOut => {
                tracing::warn!(order_id = %order_id, "result check went unanswered");
                Ok(CheckStatus::Unanswered)
            }
        }
    }

    // Ignore duplicate (period, contract) rows: a key that summed every
    // matching export line would bill the period more than once.
    fn dedup_items(items: Vec<UnpaidItem>) -> Vec<UnpaidItem> {
        let mut seen = BTreeSet::new();
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            if seen.insert(item.key()) {
                kept.push(item);
            } else {
                tracing::warn!(key = %item.key(), "skipping duplicate unpaid row");
            }
        }
        kept
    }

    fn is_listed(&self, key: &ItemKey) -> bool {
        self.items.iter().any(|item| &item.key() == key)
    }

    async fn covered_keys(&self) -> Result<BTreeSet<ItemKey>> {
        let mut covered = BTreeSet::new();
        for record in self.pending().await? {
            covered.extend(record.covers.iter().cloned());
        }
        Ok(covered)
    }

    fn product_summary(&self) -> String {
        let mut names: Vec<&str> = Vec::new();
        for item in &self.items {
            if self.selection.contains(&item.key()) && !names.contains(&item.product_name.as_str())
            {
                names.push(&item.product_name);
            }
        }
        names.join("+")
    }

    // A settled attempt whose record cannot be dropped stays behind for a
    // later check to clear; that must not turn the outcome into an error.
    async fn drop_record(&self, order_id: &OrderId) {
        if let Err(err) = self.store.remove(&self.target.account_id, order_id).await {
            tracing::error!(order_id = %order_id, error = %err, "could not drop settled record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::HolderId;
    use crate::domain::item::BillYm;
    use crate::infrastructure::in_memory::InMemoryPendingStore;
    use crate::infrastructure::mock::MockGateway;
    use rust_decimal_macros::dec;

    fn key(bill_ym: &str) -> ItemKey {
        ItemKey::new(BillYm::new(bill_ym).unwrap(), "C2024010001")
    }

    fn item(bill_ym: &str, amount: Decimal, days: u32) -> UnpaidItem {
        UnpaidItem {
            bill_ym: BillYm::new(bill_ym).unwrap(),
            contract_id: "C2024010001".to_string(),
            product_name: "Giga Internet 500M".to_string(),
            bill_amt: Some(amount + dec!(3000)),
            unpay_amt: Amount::new(amount).unwrap(),
            unpay_days: days,
        }
    }

    fn sample_items() -> Vec<UnpaidItem> {
        vec![
            item("202401", dec!(30000), 45),
            item("202402", dec!(25000), 15),
        ]
    }

    fn card() -> CardDetails {
        CardDetails::new(
            "1234-5678-9012-3456",
            "07",
            "27",
            HolderId::birth("950101").unwrap(),
            0,
        )
        .unwrap()
    }

    fn orchestrator(gateway: MockGateway) -> CollectionOrchestrator {
        CollectionOrchestrator::new(
            CollectionTarget::new("CUST01", "ACNT01"),
            CollectionConfig::default().with_branch_id("SO10"),
            sample_items(),
            Box::new(InMemoryPendingStore::new()),
            Box::new(gateway),
        )
    }

    #[tokio::test]
    async fn test_toggle_selects_and_unselects() {
        let mut orch = orchestrator(MockGateway::new());

        assert!(orch.toggle(&key("202401")).await.unwrap());
        assert_eq!(orch.selection().len(), 1);
        assert!(!orch.toggle(&key("202401")).await.unwrap());
        assert!(orch.selection().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_ignores_unknown_keys() {
        let mut orch = orchestrator(MockGateway::new());

        assert!(!orch.toggle(&key("209912")).await.unwrap());
        assert!(orch.selection().is_empty());
    }

    #[tokio::test]
    async fn test_select_all_and_total() {
        let mut orch = orchestrator(MockGateway::new());

        assert_eq!(orch.select_all().await.unwrap(), 2);
        assert_eq!(orch.selected_total(), dec!(55000));

        orch.clear_all();
        assert!(orch.selection().is_empty());
        assert_eq!(orch.selected_total(), dec!(0));
    }

    #[tokio::test]
    async fn test_refresh_drops_vanished_selection() {
        let mut orch = orchestrator(MockGateway::new());
        orch.select_all().await.unwrap();

        orch.refresh_items(vec![item("202402", dec!(25000), 15)]);

        assert_eq!(orch.selection().len(), 1);
        assert!(orch.selection().contains(&key("202402")));
        assert_eq!(orch.selected_total(), dec!(25000));
    }

    #[tokio::test]
    async fn test_duplicate_rows_bill_once() {
        let mut items = sample_items();
        items.push(item("202401", dec!(30000), 45)); // repeats the first row
        let mut orch = CollectionOrchestrator::new(
            CollectionTarget::new("CUST01", "ACNT01"),
            CollectionConfig::default().with_branch_id("SO10"),
            items,
            Box::new(InMemoryPendingStore::new()),
            Box::new(MockGateway::new()),
        );

        // One key, one amount: the repeated row is dropped on intake.
        assert_eq!(orch.items().len(), 2);
        assert_eq!(orch.select_all().await.unwrap(), 2);
        assert_eq!(orch.selected_total(), dec!(55000));

        orch.refresh_items(vec![
            item("202402", dec!(25000), 15),
            item("202402", dec!(25000), 15),
        ]);
        assert_eq!(orch.items().len(), 1);
        assert_eq!(orch.selected_total(), dec!(25000));
    }

    #[tokio::test]
    async fn test_statuses_reflect_selection() {
        let mut orch = orchestrator(MockGateway::new());
        orch.toggle(&key("202401")).await.unwrap();

        let statuses = orch.statuses().await.unwrap();
        assert_eq!(statuses[0].1, ItemStatus::Selected);
        assert_eq!(statuses[1].1, ItemStatus::Unselected);
    }

    #[tokio::test]
    async fn test_submit_requires_selection() {
        let mut orch = orchestrator(MockGateway::new());

        let err = orch.submit_payment(&card()).await.unwrap_err();
        assert!(matches!(err, CollectionError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_submit_approved_completes_items() {
        let mut orch = orchestrator(MockGateway::new());
        orch.select_all().await.unwrap();

        let outcome = orch.submit_payment(&card()).await.unwrap();
        let SubmitOutcome::Paid { amount, .. } = outcome else {
            panic!("expected Paid, got {outcome:?}");
        };
        assert_eq!(amount.value(), dec!(55000));

        // Both periods settled, nothing left in flight.
        assert!(orch.pending().await.unwrap().is_empty());
        for (_, status) in orch.statuses().await.unwrap() {
            assert_eq!(status, ItemStatus::Completed);
        }
        assert!(orch.selection().is_empty());
    }

    #[tokio::test]
    async fn test_completed_items_are_not_reselectable() {
        let mut orch = orchestrator(MockGateway::new());
        orch.select_all().await.unwrap();
        orch.submit_payment(&card()).await.unwrap();

        assert!(!orch.toggle(&key("202401")).await.unwrap());
        assert_eq!(orch.select_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_merchant_failure_keeps_selection() {
        let mut orch = orchestrator(MockGateway::new().without_merchant());
        orch.select_all().await.unwrap();

        let err = orch.submit_payment(&card()).await.unwrap_err();
        assert!(matches!(err, CollectionError::ConfigurationError(_)));
        assert_eq!(orch.selection().len(), 2);
        assert!(orch.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_failure_leaves_no_record() {
        let mut orch = orchestrator(MockGateway::new().rejecting_ledger("account frozen"));
        orch.select_all().await.unwrap();

        let err = orch.submit_payment(&card()).await.unwrap_err();
        assert!(matches!(err, CollectionError::LedgerError(_)));
        assert_eq!(orch.selection().len(), 2);
        assert!(orch.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_entry_carries_the_captured_total() {
        let gateway = MockGateway::new();
        let mut orch = orchestrator(gateway.clone());
        orch.select_all().await.unwrap();
        orch.submit_payment(&card()).await.unwrap();

        let entries = gateway.ledger_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount.value(), dec!(55000));
        assert_eq!(entries[0].customer_id, "CUST01");
        assert_eq!(entries[0].account_id, "ACNT01");
        assert_eq!(entries[0].product_summary, "Giga Internet 500M");
    }
}
