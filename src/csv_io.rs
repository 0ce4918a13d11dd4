// CSV import / export for the ledger

use crate::parser::{Grammar, SaleFields};
use crate::record::{Record, Source};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{Read, Write};
use std::path::Path;

/// Read sale rows from a CSV file with headers `item,qty,price`
/// (`qty` may be omitted for grammars without a quantity)
///
/// All rows are validated with `grammar` before any record is returned,
/// so a bad row aborts the whole import.
pub fn load_sales_csv(csv_path: &Path, grammar: Grammar) -> Result<Vec<Record>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file: {}", csv_path.display()))?;
    read_sales_csv(file, grammar)
}

pub fn read_sales_csv<R: Read>(reader: R, grammar: Grammar) -> Result<Vec<Record>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();

    for (row, result) in rdr.deserialize::<SaleFields>().enumerate() {
        // +2: 1-indexed, plus the header row
        let line = row + 2;
        let fields = result.with_context(|| format!("Failed to read CSV line {}", line))?;
        let record = grammar
            .parse_fields(&fields, Source::Import)
            .with_context(|| format!("Invalid sale on CSV line {}", line))?;
        records.push(record);
    }

    Ok(records)
}

/// Flat row layout for exports
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    id: String,
    timestamp: String,
    source: &'a str,
    item: &'a str,
    qty: Option<u64>,
    price: String,
    total: String,
    currency: Option<&'a str>,
}

impl<'a> From<&'a Record> for CsvRow<'a> {
    fn from(record: &'a Record) -> Self {
        CsvRow {
            id: record.id.to_string(),
            timestamp: record.timestamp.to_rfc3339(),
            source: record.source.name(),
            item: &record.item,
            qty: record.qty,
            price: record.price.to_string(),
            total: record.total.to_string(),
            currency: record.currency.as_deref(),
        }
    }
}

/// Write records as CSV, in ledger order
pub fn write_sales_csv<W: Write>(writer: W, records: &[Record]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(CsvRow::from(record))
            .with_context(|| format!("Failed to write sale {}", record.id))?;
    }
    wtr.flush().context("Failed to flush CSV output")?;
    Ok(())
}
