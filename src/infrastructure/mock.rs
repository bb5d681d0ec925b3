use crate::domain::ports::{
    ChargeOutcome, ChargeRequest, CheckOutcome, CheckRequest, LedgerEntry, PaymentGateway,
};
use crate::error::{CollectionError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Merchant id the simulator resolves every branch to.
pub const SIMULATED_MERCHANT: &str = "MB001";

#[derive(Default)]
struct MockState {
    merchant_id: Mutex<Option<String>>,
    ledger_rejection: Mutex<Option<String>>,
    charge_script: Mutex<VecDeque<ChargeOutcome>>,
    check_script: Mutex<VecDeque<CheckOutcome>>,
    charges: Mutex<Vec<ChargeRequest>>,
    checks: Mutex<Vec<CheckRequest>>,
    ledger_entries: Mutex<Vec<LedgerEntry>>,
    approvals: AtomicU64,
}

/// Scripted payment gateway for tests and the CLI simulator mode.
///
/// Outcomes are served from FIFO scripts; an exhausted script approves.
/// Every charge and check request is recorded, so tests can assert on the
/// exact payloads that crossed the port. `Clone` shares the same state.
#[derive(Clone)]
pub struct MockGateway {
    state: Arc<MockState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockGateway {
    pub fn new() -> Self {
        let state = MockState {
            merchant_id: Mutex::new(Some(SIMULATED_MERCHANT.to_string())),
            ..MockState::default()
        };
        Self {
            state: Arc::new(state),
        }
    }

    pub fn with_merchant(self, merchant_id: impl Into<String>) -> Self {
        *lock(&self.state.merchant_id) = Some(merchant_id.into());
        self
    }

    /// Makes merchant resolution fail for every branch.
    pub fn without_merchant(self) -> Self {
        *lock(&self.state.merchant_id) = None;
        self
    }

    /// Makes ledger registration fail with the given reason.
    pub fn rejecting_ledger(self, reason: impl Into<String>) -> Self {
        *lock(&self.state.ledger_rejection) = Some(reason.into());
        self
    }

    /// Queues the next charge outcome.
    pub fn script_charge(self, outcome: ChargeOutcome) -> Self {
        lock(&self.state.charge_script).push_back(outcome);
        self
    }

    /// Queues the next check outcome.
    pub fn script_check(self, outcome: CheckOutcome) -> Self {
        lock(&self.state.check_script).push_back(outcome);
        self
    }

    pub fn charges(&self) -> Vec<ChargeRequest> {
        lock(&self.state.charges).clone()
    }

    pub fn checks(&self) -> Vec<CheckRequest> {
        lock(&self.state.checks).clone()
    }

    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        lock(&self.state.ledger_entries).clone()
    }

    fn next_approval_no(&self) -> String {
        format!("A{:07}", self.state.approvals.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn resolve_merchant(&self, branch_id: &str) -> Result<String> {
        lock(&self.state.merchant_id).clone().ok_or_else(|| {
            CollectionError::ConfigurationError(format!(
                "No merchant configured for branch {branch_id}"
            ))
        })
    }

    async fn register_ledger(&self, entry: &LedgerEntry) -> Result<()> {
        if let Some(reason) = lock(&self.state.ledger_rejection).clone() {
            return Err(CollectionError::LedgerError(reason));
        }
        lock(&self.state.ledger_entries).push(entry.clone());
        Ok(())
    }

    async fn charge(&self, request: &ChargeRequest, _wait: Duration) -> ChargeOutcome {
        lock(&self.state.charges).push(request.clone());
        lock(&self.state.charge_script)
            .pop_front()
            .unwrap_or_else(|| ChargeOutcome::Approved {
                approval_no: self.next_approval_no(),
            })
    }

    async fn check_result(&self, probe: &CheckRequest, _wait: Duration) -> CheckOutcome {
        lock(&self.state.checks).push(probe.clone());
        lock(&self.state.check_script)
            .pop_front()
            .unwrap_or_else(|| CheckOutcome::Approved {
                approval_no: self.next_approval_no(),
            })
    }
}
