//! Enriched transaction export.

use std::io::Write;
use std::path::Path;

use chrono::Timelike;
use cycles_core::error::{CycleError, Result};
use cycles_core::models::EnrichedTransaction;
use serde::Serialize;
use tracing::debug;

/// One output line. Field order is the column order of the file.
#[derive(Debug, Serialize)]
struct EnrichedRow<'a> {
    month: &'a str,
    week_of_month: u32,
    billing_cycle: String,
    cycle_week: u32,
    date: String,
    amount: String,
    description: &'a str,
    category: &'a str,
    source: &'a str,
}

impl<'a> From<&'a EnrichedTransaction> for EnrichedRow<'a> {
    fn from(tx: &'a EnrichedTransaction) -> Self {
        let date = if tx.record.date.num_seconds_from_midnight() == 0 {
            tx.record.date.format("%Y-%m-%d").to_string()
        } else {
            tx.record.date.format("%Y-%m-%d %H:%M:%S").to_string()
        };
        Self {
            month: tx.calendar_month_label,
            week_of_month: tx.calendar_week_of_month,
            billing_cycle: tx.billing_cycle_label.to_string(),
            cycle_week: tx.billing_cycle_week,
            date,
            amount: tx.record.amount.to_string(),
            description: &tx.record.description,
            category: &tx.category,
            source: tx.record.source.as_deref().unwrap_or(""),
        }
    }
}

/// Write `transactions` as CSV with a header line. Returns the row count.
pub fn write_enriched<W: Write>(writer: W, transactions: &[EnrichedTransaction]) -> csv::Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for tx in transactions {
        csv_writer.serialize(EnrichedRow::from(tx))?;
    }
    if transactions.is_empty() {
        csv_writer.write_record([
            "month",
            "week_of_month",
            "billing_cycle",
            "cycle_week",
            "date",
            "amount",
            "description",
            "category",
            "source",
        ])?;
    }
    csv_writer.flush()?;
    Ok(transactions.len())
}

/// Write `transactions` to `path`, creating parent directories.
pub fn write_enriched_csv(path: &Path, transactions: &[EnrichedTransaction]) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path).map_err(|source| CycleError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    let written = write_enriched(std::io::BufWriter::new(file), transactions).map_err(|e| {
        CycleError::Csv {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;
    debug!("Wrote {} enriched rows to {}", written, path.display());
    Ok(written)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cycles_core::models::{CycleLabel, TransactionRecord, YearMonth};
    use rust_decimal::Decimal;

    fn sample() -> EnrichedTransaction {
        let mut record = TransactionRecord::new(
            NaiveDate::from_ymd_opt(2025, 9, 15)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            Decimal::new(-5000, 2),
            "IFOOD, Restaurante",
        );
        record.source = Some("nubank.csv".to_string());
        EnrichedTransaction {
            record,
            calendar_month_label: "set",
            calendar_week_of_month: 3,
            billing_cycle_label: CycleLabel::Cycle(YearMonth::new(2025, 9).unwrap()),
            billing_cycle_week: 4,
            category: "Alimentação".to_string(),
        }
    }

    #[test]
    fn test_write_enriched_column_layout() {
        let mut buf = Vec::new();
        let n = write_enriched(&mut buf, &[sample()]).unwrap();
        assert_eq!(n, 1);

        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "month,week_of_month,billing_cycle,cycle_week,date,amount,description,category,source"
        );
        assert_eq!(
            lines.next().unwrap(),
            "set,3,2025-09,4,2025-09-15,-50.00,\"IFOOD, Restaurante\",Alimentação,nubank.csv"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_write_enriched_keeps_time_and_sentinel() {
        let mut tx = sample();
        tx.record.date = NaiveDate::from_ymd_opt(2025, 9, 15)
            .unwrap()
            .and_hms_opt(23, 30, 0)
            .unwrap();
        tx.billing_cycle_label = CycleLabel::OutOfRange;
        tx.billing_cycle_week = 0;

        let mut buf = Vec::new();
        write_enriched(&mut buf, &[tx]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("OUT_OF_RANGE,0,2025-09-15 23:30:00"));
    }

    #[test]
    fn test_write_enriched_empty_still_has_header() {
        let mut buf = Vec::new();
        write_enriched(&mut buf, &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("month,week_of_month,"));
    }

    #[test]
    fn test_write_enriched_csv_creates_parent_dirs() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let path = tmp.path().join("out").join("enriched.csv");
        write_enriched_csv(&path, &[sample()]).unwrap();
        assert!(path.exists());
    }
}
