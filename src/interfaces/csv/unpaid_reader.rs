use crate::domain::item::{BillYm, UnpaidItem};
use crate::domain::money::Amount;
use crate::error::{CollectionError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of the operator's unpaid-balance export, upstream field names.
#[derive(Debug, Deserialize)]
struct UnpaidRow {
    #[serde(rename = "BILL_YM")]
    bill_ym: String,
    #[serde(rename = "CTRT_ID")]
    contract_id: String,
    #[serde(rename = "PROD_NM")]
    product_name: String,
    #[serde(rename = "BILL_AMT", default)]
    bill_amt: Option<Decimal>,
    #[serde(rename = "UNPAY_AMT")]
    unpay_amt: Decimal,
    #[serde(rename = "UNPAY_DAYS")]
    unpay_days: u32,
}

impl TryFrom<UnpaidRow> for UnpaidItem {
    type Error = CollectionError;

    fn try_from(row: UnpaidRow) -> Result<Self> {
        Ok(UnpaidItem {
            bill_ym: BillYm::new(row.bill_ym)?,
            contract_id: row.contract_id,
            product_name: row.product_name,
            bill_amt: row.bill_amt,
            unpay_amt: Amount::new(row.unpay_amt)?,
            unpay_days: row.unpay_days,
        })
    }
}

/// Reads unpaid items from a CSV export.
///
/// This reader wraps `csv::Reader` and provides an iterator over
/// `Result<UnpaidItem>`. It handles whitespace trimming and flexible record
/// lengths automatically; rows that fail parsing or validation come out as
/// row-level errors so the caller can skip-and-report.
pub struct UnpaidReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> UnpaidReader<R> {
    /// Creates a new `UnpaidReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and validates items.
    pub fn items(self) -> impl Iterator<Item = Result<UnpaidItem>> {
        self.reader.into_deserialize::<UnpaidRow>().map(|result| {
            result
                .map_err(CollectionError::from)
                .and_then(UnpaidItem::try_from)
        })
    }
}
