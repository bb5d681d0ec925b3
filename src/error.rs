use crate::domain::item::ItemKey;
use crate::domain::order::OrderId;
use thiserror::Error;

/// Errors surfaced by the collection flow.
///
/// Every variant corresponds to a condition the operator UI can act on.
/// Ambiguous gateway outcomes (timeouts, unanswered result checks) are *not*
/// errors: they are carried in the orchestrator's outcome enums so they can
/// never be mistaken for a definite decline.
#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    /// Bad local input (card fields, empty selection). Nothing was sent.
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// No processing merchant could be resolved for the branch. Nothing was
    /// dispatched; re-submission may be attempted once configuration is fixed.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    /// The ledger pre-registration was rejected or unreachable. No pending
    /// record exists and no charge was dispatched.
    #[error("Ledger registration failed: {0}")]
    LedgerError(String),
    /// The item is already covered by an in-flight payment attempt.
    #[error("Billing period {0} already has a payment in flight")]
    AlreadyPending(ItemKey),
    /// No pending record with this order id (already reconciled, or never
    /// existed).
    #[error("No pending payment found for order {0}")]
    UnknownOrder(OrderId),
    /// The durable pending store failed. When raised during submission the
    /// charge was not dispatched.
    #[error("Store error: {0}")]
    StoreError(String),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for CollectionError {
    fn from(err: rocksdb::Error) -> Self {
        Self::StoreError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CollectionError>;
