use crate::domain::order::OrderId;
use crate::domain::pending::PendingPayment;
use crate::domain::ports::PendingStore;
use crate::error::{CollectionError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;

/// Column Family for in-flight charge attempts.
pub const CF_PENDING: &str = "pending";

/// A persistent pending-payment store using RocksDB.
///
/// Records live in a single column family keyed by
/// `{account_id}\0{order_id}`, so one account's records are contiguous and
/// ordered oldest-first. Values are `serde_json`-encoded records.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbPendingStore {
    db: Arc<DB>,
}

impl RocksDbPendingStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required "pending" column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_pending = ColumnFamilyDescriptor::new(CF_PENDING, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_pending])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(CF_PENDING)
            .ok_or_else(|| CollectionError::StoreError("Pending column family not found".to_string()))
    }
}

fn record_key(account_id: &str, order_id: &OrderId) -> Vec<u8> {
    let mut key = Vec::with_capacity(account_id.len() + 1 + order_id.as_str().len());
    key.extend_from_slice(account_id.as_bytes());
    key.push(0);
    key.extend_from_slice(order_id.as_str().as_bytes());
    key
}

fn account_prefix(account_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(account_id.len() + 1);
    prefix.extend_from_slice(account_id.as_bytes());
    prefix.push(0);
    prefix
}

#[async_trait]
impl PendingStore for RocksDbPendingStore {
    async fn list(&self, account_id: &str) -> Result<Vec<PendingPayment>> {
        let cf = self.cf()?;
        let prefix = account_prefix(account_id);

        let mut records = Vec::new();
        let iter = self.db.iterator_cf(
            cf,
            rocksdb::IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );
        for entry in iter {
            let (key, value) = entry?;
            if !key.starts_with(&prefix) {
                break;
            }
            match serde_json::from_slice(&value) {
                Ok(record) => records.push(record),
                // One unreadable value must not hide the readable records.
                Err(err) => {
                    tracing::warn!(
                        key = %String::from_utf8_lossy(&key),
                        error = %err,
                        "skipping unreadable pending record"
                    );
                }
            }
        }
        Ok(records)
    }

    async fn save(&self, account_id: &str, pending: PendingPayment) -> Result<()> {
        let cf = self.cf()?;
        let key = record_key(account_id, &pending.order_id);
        let value = serde_json::to_vec(&pending)
            .map_err(|e| CollectionError::StoreError(format!("Serialization error: {}", e)))?;

        // Synced write: the record must survive a crash before the charge
        // it describes leaves the process.
        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(true);
        self.db.put_cf_opt(cf, key, value, &write_opts)?;

        Ok(())
    }

    async fn remove(&self, account_id: &str, order_id: &OrderId) -> Result<()> {
        let cf = self.cf()?;
        self.db.delete_cf(cf, record_key(account_id, order_id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::{CardDetails, HolderId};
    use crate::domain::item::{BillYm, ItemKey};
    use crate::domain::money::Amount;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn record(order_id: &str) -> PendingPayment {
        let card = CardDetails::new(
            "1234567890123456",
            "01",
            "27",
            HolderId::birth("950101").unwrap(),
            0,
        )
        .unwrap();
        PendingPayment::capture(
            OrderId::new(order_id),
            "MB001",
            "20240115",
            Amount::new(dec!(30000)).unwrap(),
            &card,
            BTreeSet::from([ItemKey::new(BillYm::new("202401").unwrap(), "C1")]),
        )
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDbPendingStore::open(dir.path()).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_PENDING).is_some());
    }

    #[tokio::test]
    async fn test_save_list_remove() {
        let dir = tempdir().unwrap();
        let store = RocksDbPendingStore::open(dir.path()).unwrap();

        store.save("ACNT01", record("1700000000000002")).await.unwrap();
        store.save("ACNT01", record("1700000000000001")).await.unwrap();
        store.save("ACNT02", record("1700000000000003")).await.unwrap();

        // Oldest first, and scoped to the account prefix.
        let listed = store.list("ACNT01").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].order_id, OrderId::new("1700000000000001"));

        store
            .remove("ACNT01", &OrderId::new("1700000000000001"))
            .await
            .unwrap();
        store
            .remove("ACNT01", &OrderId::new("1700000000000001"))
            .await
            .unwrap();
        assert_eq!(store.list("ACNT01").await.unwrap().len(), 1);
        assert_eq!(store.list("ACNT02").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempdir().unwrap();

        let store = RocksDbPendingStore::open(dir.path()).unwrap();
        store.save("ACNT01", record("1700000000000001")).await.unwrap();
        drop(store);

        let reopened = RocksDbPendingStore::open(dir.path()).unwrap();
        let listed = reopened.list("ACNT01").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].amount.value(), dec!(30000));
    }

    #[tokio::test]
    async fn test_list_skips_unreadable_values() {
        let dir = tempdir().unwrap();
        let store = RocksDbPendingStore::open(dir.path()).unwrap();

        store.save("ACNT01", record("1700000000000002")).await.unwrap();
        let cf = store.db.cf_handle(CF_PENDING).unwrap();
        store
            .db
            .put_cf(
                cf,
                record_key("ACNT01", &OrderId::new("1700000000000001")),
                b"not json",
            )
            .unwrap();

        let listed = store.list("ACNT01").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].order_id, OrderId::new("1700000000000002"));
    }
}
