use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result, bail};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use unpay_collect::application::orchestrator::{
    CheckStatus, CollectionConfig, CollectionOrchestrator, CollectionTarget, SubmitOutcome,
};
use unpay_collect::domain::card::{CardDetails, HolderId};
use unpay_collect::domain::item::{ItemKey, UnpaidItem};
use unpay_collect::domain::money::format_won;
use unpay_collect::domain::order::OrderId;
use unpay_collect::domain::ports::{
    ChargeOutcome, CheckOutcome, PaymentGatewayBox, PendingStoreBox,
};
use unpay_collect::infrastructure::http::{HttpGateway, HttpGatewayConfig};
use unpay_collect::infrastructure::in_memory::InMemoryPendingStore;
use unpay_collect::infrastructure::mock::MockGateway;
use unpay_collect::interfaces::csv::report_writer::ReportWriter;
use unpay_collect::interfaces::csv::unpaid_reader::UnpaidReader;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the persistent pending store (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Operator billing proxy base URL. Without it the built-in simulator answers.
    #[arg(long, global = true)]
    gateway_url: Option<String>,

    /// Simulator outcome when no gateway URL is given.
    #[arg(long, global = true, value_enum, default_value = "approve")]
    simulate: Simulate,

    /// Branch the merchant account is resolved for.
    #[arg(long, global = true, default_value = "SO10")]
    branch: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum Simulate {
    Approve,
    Decline,
    Timeout,
    StillPending,
}

#[derive(Subcommand)]
enum Command {
    /// Charge unpaid periods from an operator export and print the reports
    Collect {
        /// Unpaid items CSV export
        input: PathBuf,

        /// Customer the collection is booked under
        #[arg(long)]
        customer: String,

        /// Payment account holding the pending records
        #[arg(long)]
        account: String,

        /// Card number, 16 digits ('-' and spaces tolerated)
        #[arg(long)]
        card_number: String,

        /// Card expiry month (MM)
        #[arg(long)]
        expiry_month: String,

        /// Card expiry year (YY)
        #[arg(long)]
        expiry_year: String,

        /// 6-digit birth date of the card holder
        #[arg(long, conflicts_with = "business_no")]
        birth: Option<String>,

        /// 10-digit business registration number for corporate cards
        #[arg(long)]
        business_no: Option<String>,

        /// Installment months, 0 = lump sum
        #[arg(long, default_value_t = 0)]
        installments: u8,

        /// Billing periods to collect (comma separated). All eligible when omitted.
        #[arg(long, value_delimiter = ',')]
        periods: Vec<String>,
    },
    /// List in-flight attempts for a payment account
    Pending {
        #[arg(long)]
        account: String,
    },
    /// Reconcile one pending attempt against the gateway
    Check {
        #[arg(long)]
        account: String,

        /// Order id of the retained attempt
        #[arg(long)]
        order_id: String,
    },
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("UNPAY_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn build_store(db_path: Option<&Path>) -> Result<PendingStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = unpay_collect::infrastructure::rocksdb::RocksDbPendingStore::open(path)
                .into_diagnostic()?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => bail!("--db-path needs a build with the storage-rocksdb feature"),
        None => Ok(Box::new(InMemoryPendingStore::new())),
    }
}

fn build_gateway(cli: &Cli) -> Result<PaymentGatewayBox> {
    if let Some(url) = &cli.gateway_url {
        let gateway = HttpGateway::new(HttpGatewayConfig::default().with_base_url(url.clone()))
            .into_diagnostic()?;
        return Ok(Box::new(gateway));
    }

    let gateway = match cli.simulate {
        Simulate::Approve => MockGateway::new(),
        Simulate::Decline => MockGateway::new()
            .script_charge(ChargeOutcome::Declined {
                reason: "Declined by processor".to_string(),
            })
            .script_check(CheckOutcome::Declined {
                reason: "Declined by processor".to_string(),
            }),
        // A simulated timeout answers neither the charge nor the check.
        Simulate::Timeout => MockGateway::new()
            .script_charge(ChargeOutcome::TimedOut)
            .script_check(CheckOutcome::QueryTimedOut),
        Simulate::StillPending => MockGateway::new()
            .script_charge(ChargeOutcome::TimedOut)
            .script_check(CheckOutcome::StillPending),
    };
    Ok(Box::new(gateway))
}

fn read_items(input: &Path) -> Result<Vec<UnpaidItem>> {
    let file = File::open(input).into_diagnostic()?;
    let mut items = Vec::new();
    for row in UnpaidReader::new(file).items() {
        match row {
            Ok(item) => items.push(item),
            Err(e) => eprintln!("Skipping unpaid row: {}", e),
        }
    }
    Ok(items)
}

async fn run_collect(
    mut orchestrator: CollectionOrchestrator,
    card: CardDetails,
    periods: Vec<String>,
) -> Result<()> {
    if periods.is_empty() {
        orchestrator.select_all().await.into_diagnostic()?;
    } else {
        let keys: Vec<ItemKey> = orchestrator
            .items()
            .iter()
            .filter(|item| periods.iter().any(|period| period == item.bill_ym.as_str()))
            .map(UnpaidItem::key)
            .collect();
        if keys.is_empty() {
            bail!("None of the requested periods are in the export");
        }
        for key in keys {
            orchestrator.toggle(&key).await.into_diagnostic()?;
        }
    }
    if orchestrator.selection().is_empty() {
        bail!("Nothing eligible to collect: items are already pending or completed");
    }

    eprintln!(
        "Collecting {} across {} item(s)",
        format_won(orchestrator.selected_total()),
        orchestrator.selection().len()
    );

    match orchestrator.submit_payment(&card).await.into_diagnostic()? {
        SubmitOutcome::Paid {
            order_id,
            amount,
            approval_no,
        } => {
            eprintln!(
                "Payment complete: {} (order {}, approval {})",
                format_won(amount.value()),
                order_id,
                approval_no
            );
        }
        SubmitOutcome::Pending { order_id, amount } => {
            eprintln!(
                "Payment in progress: {} (order {}). Run `check --order-id {}` later.",
                format_won(amount.value()),
                order_id,
                order_id
            );
        }
        SubmitOutcome::Declined { order_id, reason } => {
            eprintln!("Payment declined: {} (order {})", reason, order_id);
        }
    }

    let statuses = orchestrator.statuses().await.into_diagnostic()?;
    let pending = orchestrator.pending().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_statuses(&statuses).into_diagnostic()?;
    writer.write_pending(&pending, Utc::now()).into_diagnostic()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let store = build_store(cli.db_path.as_deref())?;
    let gateway = build_gateway(&cli)?;
    let branch = cli.branch.clone();

    match cli.command {
        Command::Collect {
            input,
            customer,
            account,
            card_number,
            expiry_month,
            expiry_year,
            birth,
            business_no,
            installments,
            periods,
        } => {
            let holder = match (birth, business_no) {
                (Some(birth), None) => HolderId::birth(birth).into_diagnostic()?,
                (None, Some(number)) => HolderId::business(number).into_diagnostic()?,
                _ => bail!("Provide exactly one of --birth or --business-no"),
            };
            let card = CardDetails::new(
                &card_number,
                &expiry_month,
                &expiry_year,
                holder,
                installments,
            )
            .into_diagnostic()?;

            let items = read_items(&input)?;
            let orchestrator = CollectionOrchestrator::new(
                CollectionTarget::new(customer, account),
                CollectionConfig::default().with_branch_id(branch),
                items,
                store,
                gateway,
            );
            run_collect(orchestrator, card, periods).await?;
        }
        Command::Pending { account } => {
            let records = store.list(&account).await.into_diagnostic()?;
            let total: rust_decimal::Decimal =
                records.iter().map(|record| record.amount.value()).sum();
            eprintln!(
                "{} pending attempt(s), total {}",
                records.len(),
                format_won(total)
            );

            let stdout = io::stdout();
            let mut writer = ReportWriter::new(stdout.lock());
            writer.write_pending(&records, Utc::now()).into_diagnostic()?;
        }
        Command::Check { account, order_id } => {
            let mut orchestrator = CollectionOrchestrator::new(
                CollectionTarget::new("", account),
                CollectionConfig::default().with_branch_id(branch),
                Vec::new(),
                store,
                gateway,
            );

            match orchestrator
                .check_pending(&OrderId::new(order_id))
                .await
                .into_diagnostic()?
            {
                CheckStatus::Paid { approval_no } => {
                    eprintln!("Attempt settled: paid (approval {})", approval_no);
                }
                CheckStatus::Declined { reason } => {
                    eprintln!("Attempt settled: declined ({})", reason);
                }
                CheckStatus::StillPending => {
                    eprintln!("Attempt still in flight at the gateway");
                }
                CheckStatus::Unanswered => {
                    eprintln!("No answer from the gateway; attempt unchanged, try again");
                }
            }

            let remaining = orchestrator.pending().await.into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = ReportWriter::new(stdout.lock());
            writer
                .write_pending(&remaining, Utc::now())
                .into_diagnostic()?;
        }
    }

    Ok(())
}
