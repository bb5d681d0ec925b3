use crate::domain::item::{ItemStatus, UnpaidItem};
use crate::domain::pending::PendingPayment;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct StatusRecord<'a> {
    bill_ym: &'a str,
    contract: &'a str,
    product: &'a str,
    amount: Decimal,
    days: u32,
    status: ItemStatus,
}

#[derive(Debug, Serialize)]
struct PendingRecord<'a> {
    order_id: &'a str,
    order_date: &'a str,
    amount: Decimal,
    card: String,
    installments: u8,
    age_days: i64,
    covers: String,
}

/// Writes the operator's item-status and pending-attempt reports as CSV.
pub struct ReportWriter<W: Write> {
    out: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// One row per listed item with its derived status.
    pub fn write_statuses(&mut self, statuses: &[(UnpaidItem, ItemStatus)]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(&mut self.out);
        for (item, status) in statuses {
            writer.serialize(StatusRecord {
                bill_ym: item.bill_ym.as_str(),
                contract: &item.contract_id,
                product: &item.product_name,
                amount: item.unpay_amt.value(),
                days: item.unpay_days,
                status: *status,
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    /// One row per in-flight attempt. `age_days` lets operators spot stale
    /// records; `covers` joins the settled periods with `+`.
    pub fn write_pending(&mut self, records: &[PendingPayment], now: DateTime<Utc>) -> Result<()> {
        let mut writer = csv::Writer::from_writer(&mut self.out);
        for record in records {
            let covers = record
                .covers
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("+");
            writer.serialize(PendingRecord {
                order_id: record.order_id.as_str(),
                order_date: &record.order_date,
                amount: record.amount.value(),
                card: format!("****-****-****-{}", record.card_last4),
                installments: record.installments,
                age_days: record.age_days(now),
                covers,
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}
