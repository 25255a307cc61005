//! ledgerlens main entry point

mod source;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

use ledgerlens_config::{Config, ConfigError, TaxDefinition, TaxDefinitionMap};
use ledgerlens_core::{
    compare_ledger_months, ledger_alerts, parse_ledger, AnalysisOptions, CoreError, Stage, StatusResults,
};
use ledgerlens_utils::{format_number, round_display};

use crate::source::{FsLedgerSource, LedgerSource};

#[derive(Parser, Debug)]
#[command(name = "ledgerlens")]
#[command(version = "0.1.0")]
#[command(about = "Balances, taxes and financial analytics for plain-text ledgers", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "ledgerlens.yaml", global = true)]
    config: PathBuf,

    /// Ledger file, instead of the configured one
    #[arg(short, long, global = true)]
    ledger: Option<PathBuf>,

    /// Account declarations file, instead of the configured one
    #[arg(short, long, global = true)]
    accounts: Option<PathBuf>,

    /// Tax override as NAME=PERCENTAGE, e.g. IVA=0.16 (repeatable)
    #[arg(long = "tax", value_name = "NAME=PERCENTAGE", global = true)]
    taxes: Vec<String>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse the ledger and resolve its taxes
    Parse,
    /// Account balances and status results
    Calculate {
        /// Print a text summary instead of JSON
        #[arg(long)]
        summary: bool,
    },
    /// Every analytics metric
    Analyze,
    /// Compare two months (YYYY-MM)
    Compare { month1: String, month2: String },
    /// Unusual expenses in the latest month
    Alerts {
        /// Ratio over the historical average that raises an alert
        #[arg(short, long)]
        threshold: Option<Decimal>,
    },
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Parse `NAME=PERCENTAGE` overrides into a tax map
fn tax_overrides(raw: &[String]) -> Result<Option<TaxDefinitionMap>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let mut taxes = TaxDefinitionMap::new();
    for entry in raw {
        let (name, percentage) = entry
            .split_once('=')
            .with_context(|| format!("Invalid tax '{}', expected NAME=PERCENTAGE", entry))?;
        let percentage: Decimal = percentage
            .trim()
            .parse()
            .with_context(|| format!("Invalid percentage in '{}'", entry))?;
        let name = name.trim();
        taxes.insert(name.to_string(), TaxDefinition::new(name, percentage)?);
    }
    Ok(Some(taxes))
}

/// Load the configuration, falling back to defaults when the file is absent
fn load_config(path: &Path) -> Result<(Config, bool)> {
    match Config::load(path.to_path_buf()) {
        Ok(config) => Ok((config, true)),
        Err(ConfigError::FileNotFound { .. }) => Ok((Config::default(), false)),
        Err(e) => {
            let details = e.to_details();
            bail!("{}", details)
        }
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite it", path.display());
    }
    std::fs::write(path, Config::generate_default())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn success(data: Value) -> Value {
    json!({ "success": true, "data": data })
}

/// A stage becomes a successful payload or an error payload with its reason
fn stage_payload<T: serde::Serialize>(stage: Stage<T>) -> Result<Value> {
    Ok(match stage {
        Stage::Ready { value } => success(serde_json::to_value(value)?),
        Stage::Unavailable { reason } => json!({ "success": false, "error": reason }),
    })
}

fn print_json(value: &Value, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}

fn print_summary(status: &StatusResults) {
    let rows = [
        ("Assets", status.total_assets),
        ("Liabilities", status.total_liabilities),
        ("Equity", status.total_equity),
        ("Income", status.total_income),
        ("Expenses", status.total_expenses),
        ("Net income", status.net_income),
        ("Closing equity", status.closing_equity),
    ];
    for (label, amount) in rows {
        println!("{:<16}{:>20}", label, format_number(round_display(amount)));
    }
    if !status.total_unclassified.is_zero() {
        println!("{:<16}{:>20}", "Unclassified", format_number(round_display(status.total_unclassified)));
    }
    if status.balanced {
        println!("Balance sheet is balanced");
    } else {
        println!("Balance sheet is off by {}", format_number(status.difference));
    }
}

async fn run(args: Args, config: Config) -> Result<()> {
    let mut options = AnalysisOptions::from_config(&config);
    if let Some(taxes) = tax_overrides(&args.taxes)? {
        options = options.with_taxes(taxes);
    }

    let source = match (&args.ledger, &args.accounts) {
        (None, None) => FsLedgerSource::from_config(&config),
        (ledger, accounts) => FsLedgerSource::new(
            ledger.clone().unwrap_or_else(|| config.ledger_path()),
            accounts.clone().or_else(|| config.accounts_path()),
        ),
    };
    let ledger_text = source.ledger_text().await?;
    let accounts_text = source.accounts_text().await?;
    let accounts_text = accounts_text.as_deref();

    let output = match args.command {
        Command::Parse => {
            let parsed = parse_ledger(&ledger_text, accounts_text, &options);
            if !parsed.transactions.is_ready() {
                return print_json(&empty_input_payload(), args.pretty);
            }
            success(serde_json::to_value(parsed)?)
        }
        Command::Calculate { summary } => {
            let calculation = parse_ledger(&ledger_text, accounts_text, &options).calculate(&options);
            if summary {
                match calculation.status_results.value() {
                    Some(status) => print_summary(status),
                    None => println!("No results: {}", calculation.status_results.reason().unwrap_or_default()),
                }
                return Ok(());
            }
            success(serde_json::to_value(calculation)?)
        }
        Command::Analyze => {
            let analysis = parse_ledger(&ledger_text, accounts_text, &options).analyze(&options);
            let unavailable = analysis.unavailable_metrics();
            if !unavailable.is_empty() {
                log::warn!(target: "ledgerlens", "Some metrics are unavailable: {}", unavailable.join(", "));
            }
            json!({
                "success": true,
                "data": analysis,
                "unavailable": unavailable,
            })
        }
        Command::Compare { month1, month2 } => {
            stage_payload(compare_ledger_months(&ledger_text, accounts_text, &month1, &month2, &options))?
        }
        Command::Alerts { threshold } => {
            let alerts = ledger_alerts(&ledger_text, accounts_text, threshold, &options);
            match alerts.alerts {
                Stage::Ready { value } => success(json!({
                    "alerts": value,
                    "threshold_used": alerts.threshold_used,
                })),
                Stage::Unavailable { reason } => json!({ "success": false, "error": reason }),
            }
        }
        Command::Init { .. } => bail!("init does not read a ledger"),
    };

    print_json(&output, args.pretty)
}

fn empty_input_payload() -> Value {
    json!({ "success": false, "error": CoreError::EmptyInput.to_details() })
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::Init { force } = &args.command {
        return init_config(&args.config, *force);
    }

    let (config, found) = load_config(&args.config)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.logging.level.as_str())).init();
    if !found {
        log::warn!(
            target: "ledgerlens::config",
            "Configuration file {} not found, using defaults",
            args.config.display()
        );
    }

    let rt = Runtime::new()?;
    rt.block_on(run(args, config))
}
