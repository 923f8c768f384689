//! settlement-engine CLI
//!
//! Run period reports and balance listings over a store snapshot.
//!
//! # Usage
//!
//! ```bash
//! # Period report for January, bucketed by day
//! settlement-engine report --input snapshot.json --from 2026-01-01 --to 2026-01-31
//!
//! # Whole year by month, as JSON
//! settlement-engine report --input snapshot.json --from 2026-01-01 --to 2026-12-31 \
//!     --granularity month --format json
//!
//! # Outstanding receivables and payables
//! settlement-engine balances --input snapshot.json
//! ```

use chrono::NaiveDate;
use rust_decimal::Decimal;
use settlement_engine::report::aggregator::{Granularity, PeriodReport, ReportRange};
use settlement_engine::store::SettlementStore;
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"settlement-engine — multi-currency settlement and reconciliation

USAGE:
    settlement-engine <COMMAND> [OPTIONS]

COMMANDS:
    report      Aggregate a period report over a store snapshot
    balances    List outstanding receivables and payables
    help        Show this message

OPTIONS (report):
    --input <FILE>        Path to a store snapshot JSON file
    --from <DATE>         Start of the range, inclusive (YYYY-MM-DD)
    --to <DATE>           End of the range, inclusive (YYYY-MM-DD)
    --granularity <G>     Bucket width: day, month (default) or year
    --format <FORMAT>     Output format: text (default) or json

OPTIONS (balances):
    --input <FILE>        Path to a store snapshot JSON file
    --format <FORMAT>     Output format: text (default) or json

EXAMPLES:
    settlement-engine report --input snapshot.json --from 2026-01-01 --to 2026-01-31
    settlement-engine report --input snapshot.json --from 2026-01-01 --to 2026-12-31 --granularity month
    settlement-engine balances --input snapshot.json --format json"#
    );
}

fn load_store(path: &str) -> SettlementStore {
    let content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{}': {}", path, e);
        process::exit(1);
    });

    SettlementStore::from_json(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing snapshot JSON: {}", e);
        process::exit(1);
    })
}

fn parse_date(value: &str, flag: &str) -> NaiveDate {
    value.parse().unwrap_or_else(|_| {
        eprintln!("{} requires a date in YYYY-MM-DD form, got '{}'", flag, value);
        process::exit(1);
    })
}

/// JSON output schema for the balances command.
#[derive(serde::Serialize)]
struct BalancesOutput {
    receivables: Vec<OutstandingRow>,
    payables: Vec<OutstandingRow>,
    total_receivables_usd: String,
    total_payables_usd: String,
}

#[derive(serde::Serialize)]
struct OutstandingRow {
    id: String,
    source: Option<String>,
    currency: String,
    balance: String,
    status: String,
}

fn cmd_report(args: &[String]) {
    let mut input_path = None;
    let mut from = None;
    let mut to = None;
    let mut granularity = Granularity::Month;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--input requires a file path");
                    process::exit(1);
                }));
            }
            "--from" => {
                i += 1;
                let value = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--from requires a date");
                    process::exit(1);
                });
                from = Some(parse_date(&value, "--from"));
            }
            "--to" => {
                i += 1;
                let value = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--to requires a date");
                    process::exit(1);
                });
                to = Some(parse_date(&value, "--to"));
            }
            "--granularity" => {
                i += 1;
                let value = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--granularity requires day, month or year");
                    process::exit(1);
                });
                granularity = value.parse().unwrap_or_else(|e| {
                    eprintln!("{}", e);
                    process::exit(1);
                });
            }
            "--format" => {
                i += 1;
                format = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--format requires 'text' or 'json'");
                    process::exit(1);
                });
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    });
    let (from, to) = match (from, to) {
        (Some(from), Some(to)) => (from, to),
        _ => {
            eprintln!("Error: --from and --to are required");
            process::exit(1);
        }
    };
    let range = ReportRange::new(from, to).unwrap_or_else(|e| {
        eprintln!("{}", e);
        process::exit(1);
    });

    let store = load_store(&path);
    let report: PeriodReport = store.report(range, granularity);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
    } else {
        println!("{}", report);
    }
}

fn cmd_balances(args: &[String]) {
    let mut input_path = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--input requires a file path");
                    process::exit(1);
                }));
            }
            "--format" => {
                i += 1;
                format = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--format requires 'text' or 'json'");
                    process::exit(1);
                });
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    });

    let store = load_store(&path);
    let snapshot = store.snapshot();

    let mut receivables = Vec::new();
    let mut total_receivables = Decimal::ZERO;
    for payment in snapshot.payments.values() {
        if payment.is_canceled() {
            continue;
        }
        let settlement = snapshot.settlement_of(payment);
        if settlement.balance <= Decimal::ZERO {
            continue;
        }
        total_receivables += snapshot.rates.to_usd(settlement.balance, payment.currency());
        receivables.push(OutstandingRow {
            id: payment.id().to_string(),
            source: Some(payment.source().to_string()),
            currency: payment.currency().to_string(),
            balance: settlement.balance.to_string(),
            status: settlement.status.to_string(),
        });
    }

    let mut payables = Vec::new();
    let mut total_payables = Decimal::ZERO;
    for payable in snapshot.payables.values() {
        if payable.is_canceled() || payable.balance() <= Decimal::ZERO {
            continue;
        }
        total_payables += snapshot.rates.to_usd(payable.balance(), payable.currency());
        payables.push(OutstandingRow {
            id: payable.id().to_string(),
            source: payable.source().map(|s| s.to_string()),
            currency: payable.currency().to_string(),
            balance: payable.balance().to_string(),
            status: "open".to_string(),
        });
    }

    if format == "json" {
        let output = BalancesOutput {
            receivables,
            payables,
            total_receivables_usd: total_receivables.to_string(),
            total_payables_usd: total_payables.to_string(),
        };
        println!("{}", serde_json::to_string_pretty(&output).unwrap());
    } else {
        println!("=== Outstanding Receivables ===");
        for row in &receivables {
            println!(
                "  {}  {}  {} {}  [{}]",
                row.id,
                row.source.as_deref().unwrap_or("-"),
                row.balance,
                row.currency,
                row.status
            );
        }
        println!("  Total (USD): {}", total_receivables);

        println!("\n=== Outstanding Payables ===");
        for row in &payables {
            println!(
                "  {}  {}  {} {}",
                row.id,
                row.source.as_deref().unwrap_or("-"),
                row.balance,
                row.currency
            );
        }
        println!("  Total (USD): {}", total_payables);
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "report" => cmd_report(rest),
        "balances" => cmd_balances(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
