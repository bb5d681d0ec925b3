use crate::domain::card::CardDetails;
use crate::domain::item::ItemKey;
use crate::domain::money::Amount;
use crate::domain::order::OrderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A charge attempt whose gateway answer never arrived.
///
/// The record is written before the charge is dispatched, so a later
/// reconciliation can ask the gateway about exactly this attempt. Card data
/// survives only in masked form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub order_id: OrderId,
    pub merchant_id: String,
    pub order_date: String,
    pub amount: Amount,
    pub card_last4: String,
    pub card_expiry_masked: String,
    pub holder_masked: String,
    pub installments: u8,
    pub created_at: DateTime<Utc>,
    pub covers: BTreeSet<ItemKey>,
}

impl PendingPayment {
    /// Captures everything a later status check needs, masking the card.
    pub fn capture(
        order_id: OrderId,
        merchant_id: impl Into<String>,
        order_date: impl Into<String>,
        amount: Amount,
        card: &CardDetails,
        covers: BTreeSet<ItemKey>,
    ) -> Self {
        Self {
            order_id,
            merchant_id: merchant_id.into(),
            order_date: order_date.into(),
            amount,
            card_last4: card.last4().to_string(),
            card_expiry_masked: card.masked_expiry(),
            holder_masked: card.masked_holder(),
            installments: card.installments(),
            created_at: Utc::now(),
            covers,
        }
    }

    pub fn covers_item(&self, key: &ItemKey) -> bool {
        self.covers.contains(key)
    }

    /// Whole days since the attempt was recorded.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::HolderId;
    use crate::domain::item::BillYm;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn sample_card() -> CardDetails {
        CardDetails::new(
            "1234-5678-9012-3456",
            "07",
            "27",
            HolderId::birth("950101").unwrap(),
            1,
        )
        .unwrap()
    }

    fn key(bill_ym: &str) -> ItemKey {
        ItemKey::new(BillYm::new(bill_ym).unwrap(), "C2024010001")
    }

    #[test]
    fn test_capture_masks_the_card() {
        let covers = BTreeSet::from([key("202401")]);
        let pending = PendingPayment::capture(
            OrderId::new("1700000000000001"),
            "MB001",
            "20240115",
            Amount::new(dec!(55000)).unwrap(),
            &sample_card(),
            covers,
        );

        assert_eq!(pending.card_last4, "3456");
        assert_eq!(pending.card_expiry_masked, "**/27");
        assert_eq!(pending.holder_masked, "95****");
        assert_eq!(pending.installments, 1);
        assert!(!format!("{pending:?}").contains("1234-5678"));
    }

    #[test]
    fn test_covers_item() {
        let pending = PendingPayment::capture(
            OrderId::new("1700000000000002"),
            "MB001",
            "20240115",
            Amount::new(dec!(30000)).unwrap(),
            &sample_card(),
            BTreeSet::from([key("202401"), key("202402")]),
        );

        assert!(pending.covers_item(&key("202401")));
        assert!(!pending.covers_item(&key("202403")));
    }

    #[test]
    fn test_age_days() {
        let pending = PendingPayment::capture(
            OrderId::new("1700000000000003"),
            "MB001",
            "20240115",
            Amount::new(dec!(30000)).unwrap(),
            &sample_card(),
            BTreeSet::new(),
        );

        let later = pending.created_at + Duration::days(3) + Duration::hours(4);
        assert_eq!(pending.age_days(later), 3);
        assert_eq!(pending.age_days(pending.created_at), 0);
    }
}
