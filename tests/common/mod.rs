use std::fs::File;
use std::io::Error;
use std::path::Path;

pub const CONTRACTS: usize = 50;

const HEADERS: [&str; 6] = [
    "BILL_YM",
    "CTRT_ID",
    "PROD_NM",
    "BILL_AMT",
    "UNPAY_AMT",
    "UNPAY_DAYS",
];

fn bill_ym(period_index: usize) -> String {
    format!("{:04}{:02}", 2020 + period_index / 12, 1 + period_index % 12)
}

fn contract_id(index: usize) -> String {
    format!("C{:010}", 1 + index % CONTRACTS)
}

pub fn generate_unpaid_csv(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(HEADERS)?;

    for i in 0..rows {
        wtr.write_record([
            bill_ym(i).as_str(),
            "C0000000001",
            "Giga Internet 500M",
            "1100",
            "1000",
            "30",
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn generate_large_unpaid_csv(path: &Path, size_mb: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(HEADERS)?;

    let target_size = (size_mb * 1024 * 1024) as u64;
    let mut row = 0;

    // Check size every 5000 rows to avoid syscall overhead. Cycling the
    // contract while stepping the period keeps every (period, contract)
    // key distinct.
    loop {
        for _ in 0..5000 {
            wtr.write_record([
                bill_ym(row / CONTRACTS).as_str(),
                contract_id(row).as_str(),
                "Giga Internet 500M",
                "1100",
                "1000",
                "30",
            ])?;
            row += 1;
        }
        wtr.flush()?; // Flush to ensure file size is updated
        if std::fs::metadata(path)?.len() >= target_size {
            break;
        }
    }
    Ok(())
}
