// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use std::env;
use std::io::BufWriter;
use std::path::Path;

use sales_ledger::{
    init_tracing, load_sales_csv, read_records, write_sales_csv, Config, Ledger, Record, Source,
    Summary,
};

const USAGE: &str = "usage: sales-ledger [add <line> | list | import <csv> | export <csv>]";

fn main() -> Result<()> {
    let config = Config::from_env().context("Invalid configuration")?;
    init_tracing(config.log_json, "warn");

    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        [] => run_ui_mode(&load(&config)?, &config),
        ["add", words @ ..] if !words.is_empty() => {
            run_add(&open(&config)?, &config, &words.join(" "))
        }
        ["list"] => run_list(&load(&config)?, &config),
        ["import", path] => run_import(&open(&config)?, &config, Path::new(path)),
        ["export", path] => run_export(&load(&config)?, Path::new(path)),
        _ => bail!("{}", USAGE),
    }
}

/// Writers take the ledger lock; fails while the server holds it
fn open(config: &Config) -> Result<Ledger> {
    // Fail fast: a corrupt ledger must never be treated as empty
    Ledger::open(&config.data_file)
        .with_context(|| format!("Cannot open ledger {}", config.data_file.display()))
}

/// Readers only need the committed records
fn load(config: &Config) -> Result<Vec<Record>> {
    read_records(&config.data_file)
        .with_context(|| format!("Cannot read ledger {}", config.data_file.display()))
}

fn run_add(ledger: &Ledger, config: &Config, line: &str) -> Result<()> {
    let record = match config.grammar.parse(line, Source::Cli) {
        Ok(record) => record,
        Err(e) => bail!("❌ {}", e),
    };

    let label = format!("{} = {}", record.item, record.total_label());
    ledger.append(record).context("Sale not saved")?;
    println!("✅ Saved: {}", label);

    Ok(())
}

fn run_list(records: &[Record], config: &Config) -> Result<()> {
    if records.is_empty() {
        println!("No sales yet ({})", config.data_file.display());
        return Ok(());
    }

    println!("{:<25} {:<24} {:>6} {:>12} {:>16}", "Time", "Item", "Qty", "Price", "Total");
    println!("{}", "━".repeat(87));
    for r in records.iter() {
        println!(
            "{:<25} {:<24} {:>6} {:>12} {:>16}",
            r.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            r.item,
            r.qty.map(|q| q.to_string()).unwrap_or_default(),
            r.price.to_string(),
            r.total_label(),
        );
    }

    let summary = Summary::of(records);
    println!("{}", "━".repeat(87));
    println!("{} sales, grand total {}", summary.count, summary.grand_total);
    if let Some(top) = summary.top_item() {
        println!("Top item: {} ({} sales, {})", top.item, top.count, top.total);
    }

    Ok(())
}

fn run_import(ledger: &Ledger, config: &Config, csv_path: &Path) -> Result<()> {
    println!("📂 Loading CSV...");
    let records = load_sales_csv(csv_path, config.grammar)?;
    println!("✓ Parsed {} sales from {}", records.len(), csv_path.display());

    let added = ledger.append_all(records).context("Import not saved")?;
    println!("✓ Ledger now holds {} sales ({} imported)", ledger.len(), added);

    Ok(())
}

fn run_export(records: &[Record], csv_path: &Path) -> Result<()> {
    let file = std::fs::File::create(csv_path)
        .with_context(|| format!("Failed to create {}", csv_path.display()))?;
    write_sales_csv(BufWriter::new(file), records)?;
    println!("✓ Exported {} sales to {}", records.len(), csv_path.display());
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(records: &[Record], config: &Config) -> Result<()> {
    let mut app = ui::App::new(records.to_vec(), config.grammar.hint());
    ui::run_ui(&mut app)?;
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(records: &[Record], config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   {}", USAGE);
    run_list(records, config)
}
