use crate::domain::order::OrderId;
use crate::domain::pending::PendingPayment;
use crate::domain::ports::PendingStore;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory pending-payment store.
///
/// Uses `Arc<RwLock<HashMap<account, BTreeMap<OrderId, PendingPayment>>>>`
/// to allow shared concurrent access. The inner map keeps records ordered
/// by order id, which is oldest-first for generated ids. Ideal for tests
/// and single-run sessions where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryPendingStore {
    records: Arc<RwLock<HashMap<String, BTreeMap<OrderId, PendingPayment>>>>,
}

impl InMemoryPendingStore {
    /// Creates a new, empty in-memory pending store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PendingStore for InMemoryPendingStore {
    async fn list(&self, account_id: &str) -> Result<Vec<PendingPayment>> {
        let records = self.records.read().await;
        Ok(records
            .get(account_id)
            .map(|per_account| per_account.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn save(&self, account_id: &str, pending: PendingPayment) -> Result<()> {
        let mut records = self.records.write().await;
        records
            .entry(account_id.to_string())
            .or_default()
            .insert(pending.order_id.clone(), pending);
        Ok(())
    }

    async fn remove(&self, account_id: &str, order_id: &OrderId) -> Result<()> {
        let mut records = self.records.write().await;
        if let Some(per_account) = records.get_mut(account_id) {
            per_account.remove(order_id);
        }
        Ok(())
    }
}
