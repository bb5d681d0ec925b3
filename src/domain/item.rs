use crate::domain::money::Amount;
use crate::error::CollectionError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A billing-period key: exactly six ASCII digits, `YYYYMM`.
///
/// Lexicographic order equals chronological order, so period keys sort
/// naturally inside `BTreeSet`s and reports.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BillYm(String);

impl BillYm {
    pub fn new(value: impl Into<String>) -> Result<Self, CollectionError> {
        let value = value.into();
        if value.len() == 6 && value.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(value))
        } else {
            Err(CollectionError::ValidationError(format!(
                "Billing period must be six digits (YYYYMM), got {value:?}"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BillYm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one unpaid item: a billing period under a contract.
///
/// Selection and pending coverage are keyed by the full identity so that two
/// contracts owing the same month on one payment account stay independent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub bill_ym: BillYm,
    pub contract_id: String,
}

impl ItemKey {
    pub fn new(bill_ym: BillYm, contract_id: impl Into<String>) -> Self {
        Self {
            bill_ym,
            contract_id: contract_id.into(),
        }
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bill_ym, self.contract_id)
    }
}

/// Derived per-item state as shown to the operator.
///
/// Never stored on the item: `Pending` is computed from the store's coverage,
/// `Completed` from the session's applied outcomes.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Unselected,
    Selected,
    Pending,
    Completed,
}

/// One billable period owed by a customer.
///
/// Immutable from the collection flow's perspective; only its derived
/// [`ItemStatus`] changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnpaidItem {
    pub bill_ym: BillYm,
    pub contract_id: String,
    pub product_name: String,
    /// Originally billed amount, when the export carries it.
    pub bill_amt: Option<Decimal>,
    pub unpay_amt: Amount,
    pub unpay_days: u32,
}

impl UnpaidItem {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.bill_ym.clone(), self.contract_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bill_ym_rejects_malformed_keys() {
        assert!(BillYm::new("202401").is_ok());
        assert!(BillYm::new("20240").is_err());
        assert!(BillYm::new("2024011").is_err());
        assert!(BillYm::new("2024AB").is_err());
        assert!(BillYm::new("").is_err());
    }

    #[test]
    fn test_bill_ym_orders_chronologically() {
        let jan = BillYm::new("202401").unwrap();
        let feb = BillYm::new("202402").unwrap();
        let prev_dec = BillYm::new("202312").unwrap();
        assert!(jan < feb);
        assert!(prev_dec < jan);
    }

    #[test]
    fn test_item_key_display() {
        let key = ItemKey::new(BillYm::new("202401").unwrap(), "C2024010001");
        assert_eq!(key.to_string(), "202401/C2024010001");
    }

    #[test]
    fn test_item_key_matches_item() {
        let item = UnpaidItem {
            bill_ym: BillYm::new("202401").unwrap(),
            contract_id: "C2024010001".to_string(),
            product_name: "Giga Internet 500M".to_string(),
            bill_amt: Some(dec!(33000)),
            unpay_amt: Amount::new(dec!(30000)).unwrap(),
            unpay_days: 45,
        };
        assert_eq!(
            item.key(),
            ItemKey::new(BillYm::new("202401").unwrap(), "C2024010001")
        );
    }
}
