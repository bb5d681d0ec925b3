use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Total digit count of every generated order id.
pub const ORDER_ID_DIGITS: usize = 16;

// 10 digits of epoch milliseconds followed by 6 suffix digits. The time
// component wraps every ~116 days, far beyond the life of any attempt.
const TIME_MODULUS: u64 = 10_000_000_000;
const SUFFIX_MODULUS: u64 = 1_000_000;

/// A gateway order reference, unique per charge attempt.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces order ids that are roughly time-ordered and unique with
/// overwhelming probability within the operational window.
///
/// `next` never fails: the suffix comes from the OS random source, and if
/// that source errors the generator falls back to a process-local counter.
#[derive(Debug, Default)]
pub struct OrderIdGenerator {
    fallback_seq: AtomicU64,
}

impl OrderIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> OrderId {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        OrderId(compose(millis, self.suffix()))
    }

    fn suffix(&self) -> u64 {
        let mut bytes = [0u8; 8];
        match OsRng.try_fill_bytes(&mut bytes) {
            Ok(()) => u64::from_le_bytes(bytes) % SUFFIX_MODULUS,
            Err(_) => self.fallback_seq.fetch_add(1, Ordering::Relaxed) % SUFFIX_MODULUS,
        }
    }
}

fn compose(epoch_millis: u64, suffix: u64) -> String {
    format!(
        "{:010}{:06}",
        epoch_millis % TIME_MODULUS,
        suffix % SUFFIX_MODULUS
    )
}
