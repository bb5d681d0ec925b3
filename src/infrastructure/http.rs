use crate::domain::ports::{
    ChargeOutcome, ChargeRequest, CheckOutcome, CheckRequest, LedgerEntry, PaymentGateway,
};
use crate::error::{CollectionError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

const RESULT_OK: &str = "0000";

const OP_GET_CARD_VENDOR: &str = "getCardVendorBySoId";
const OP_INSERT_CARD_PAY_STAGE: &str = "insertCardPayStage";
const OP_PROCESS_CARD_PAYMENT: &str = "processCardPayment";
const OP_GET_CARD_PAY_RESULT: &str = "getCardPayResult";

const PAY_STAT_APPROVED: &str = "01";
const PAY_STAT_DECLINED: &str = "03";

/// Every proxy response arrives wrapped in this envelope.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(rename = "resultCode")]
    result_code: String,
    #[serde(rename = "resultMsg", default)]
    result_msg: String,
    #[serde(default)]
    data: Value,
}

impl ApiEnvelope {
    fn ok(&self) -> bool {
        self.result_code == RESULT_OK
    }

    fn data_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Base URL of the operator billing proxy.
    pub base_url: String,

    /// Connect timeout for every request. The per-call answer bound is the
    /// `wait` the orchestrator passes in.
    pub connect_timeout: Duration,
}

impl Default for HttpGatewayConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl HttpGatewayConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Payment gateway adapter for the operator billing proxy.
///
/// Speaks the proxy's JSON envelope. The two pre-risk calls surface their
/// failures as errors; `charge` and `check_result` never fail, mapping
/// transport problems and elapsed waits onto the ambiguous outcome.
pub struct HttpGateway {
    client: Client,
    config: HttpGatewayConfig,
}

impl HttpGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(CollectionError::ConfigurationError(
                "Gateway base URL not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|err| CollectionError::ConfigurationError(err.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, op: &str) -> String {
        format!(
            "{}/billing/payment/anony/{}",
            self.config.base_url.trim_end_matches('/'),
            op
        )
    }

    async fn post(&self, op: &str, payload: &Value) -> std::result::Result<ApiEnvelope, String> {
        let response = self
            .client
            .post(self.url(op))
            .json(payload)
            .send()
            .await
            .map_err(|err| format!("{op}: {err}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("{op}: HTTP {status}"));
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|err| format!("{op}: unreadable response: {err}"))?;
        debug!(op, result_code = %envelope.result_code, "proxy answered");
        Ok(envelope)
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn resolve_merchant(&self, branch_id: &str) -> Result<String> {
        let envelope = self
            .post(OP_GET_CARD_VENDOR, &json!({ "SO_ID": branch_id }))
            .await
            .map_err(CollectionError::ConfigurationError)?;

        merchant_from(&envelope).map(str::to_string).ok_or_else(|| {
            CollectionError::ConfigurationError(format!(
                "No merchant configured for branch {branch_id}"
            ))
        })
    }

    async fn register_ledger(&self, entry: &LedgerEntry) -> Result<()> {
        let payload = json!({
            "CUST_ID": entry.customer_id,
            "PYM_ACNT_ID": entry.account_id,
            "PAY_MBR_ID": entry.merchant_id,
            "ORDER_NO": entry.order_id.as_str(),
            "ORDER_DT": entry.order_date,
            "PAY_AMT": entry.amount.value().to_string(),
            "PROD_NM": entry.product_summary,
        });
        let envelope = self
            .post(OP_INSERT_CARD_PAY_STAGE, &payload)
            .await
            .map_err(CollectionError::LedgerError)?;

        if !envelope.ok() {
            return Err(CollectionError::LedgerError(rejection_reason(&envelope)));
        }
        Ok(())
    }

    async fn charge(&self, request: &ChargeRequest, wait: Duration) -> ChargeOutcome {
        let payload = json!({
            "PAY_MBR_ID": request.merchant_id,
            "ORDER_NO": request.order_id.as_str(),
            "ORDER_DT": request.order_date,
            "PAY_AMT": request.amount.value().to_string(),
            "CARD_NO": request.card.number(),
            "EXPR_MM": request.card.expiry_month(),
            "EXPR_YY": request.card.expiry_year(),
            "OWNER_CHK_NO": request.card.holder().digits(),
            "INSTL_MM": format!("{:02}", request.card.installments()),
        });

        match tokio::time::timeout(wait, self.post(OP_PROCESS_CARD_PAYMENT, &payload)).await {
            Ok(Ok(envelope)) => classify_charge(&envelope),
            Ok(Err(err)) => {
                warn!(error = %err, "charge transport failed, outcome unknown");
                ChargeOutcome::TimedOut
            }
            Err(_) => {
                warn!(wait_ms = wait.as_millis() as u64, "charge wait elapsed, outcome unknown");
                ChargeOutcome::TimedOut
            }
        }
    }

    async fn check_result(&self, probe: &CheckRequest, wait: Duration) -> CheckOutcome {
        let payload = json!({
            "PAY_MBR_ID": probe.merchant_id,
            "ORDER_NO": probe.order_id.as_str(),
            "ORDER_DT": probe.order_date,
            "PAY_AMT": probe.amount.value().to_string(),
        });

        match tokio::time::timeout(wait, self.post(OP_GET_CARD_PAY_RESULT, &payload)).await {
            Ok(Ok(envelope)) => classify_check(&envelope),
            Ok(Err(err)) => {
                warn!(error = %err, "result check transport failed");
                CheckOutcome::QueryTimedOut
            }
            Err(_) => {
                warn!(wait_ms = wait.as_millis() as u64, "result check wait elapsed");
                CheckOutcome::QueryTimedOut
            }
        }
    }
}

fn merchant_from(envelope: &ApiEnvelope) -> Option<&str> {
    if !envelope.ok() {
        return None;
    }
    envelope.data_str("PAY_MBR_ID").filter(|id| !id.is_empty())
}

fn rejection_reason(envelope: &ApiEnvelope) -> String {
    if envelope.result_msg.is_empty() {
        format!("Rejected with code {}", envelope.result_code)
    } else {
        envelope.result_msg.clone()
    }
}

// Only a well-formed proxy answer may settle a charge; a rejected envelope
// is a definite decline because the processor saw and refused it.
fn classify_charge(envelope: &ApiEnvelope) -> ChargeOutcome {
    if envelope.ok() {
        ChargeOutcome::Approved {
            approval_no: envelope.data_str("APRV_NO").unwrap_or_default().to_string(),
        }
    } else {
        ChargeOutcome::Declined {
            reason: rejection_reason(envelope),
        }
    }
}

// A rejected check envelope says nothing about the charge itself.
fn classify_check(envelope: &ApiEnvelope) -> CheckOutcome {
    if !envelope.ok() {
        return CheckOutcome::QueryTimedOut;
    }
    match envelope.data_str("PAY_STAT_CD") {
        Some(PAY_STAT_APPROVED) => CheckOutcome::Approved {
            approval_no: envelope.data_str("APRV_NO").unwrap_or_default().to_string(),
        },
        Some(PAY_STAT_DECLINED) => CheckOutcome::Declined {
            reason: envelope
                .data_str("RJCT_RSN")
                .filter(|reason| !reason.is_empty())
                .unwrap_or("Declined by processor")
                .to_string(),
        },
        _ => CheckOutcome::StillPending,
    }
}
