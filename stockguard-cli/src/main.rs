//! Stockguard operator CLI
//!
//! One command per inventory operation. Credentials come from `--user` /
//! `--password` or `STOCKGUARD_USER` / `STOCKGUARD_PASSWORD` (a `.env` file
//! is honoured). Exit status is non-zero when an operation fails.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use stockguard::auth::password_digest;
use stockguard::config::DEFAULT_CONFIG_PATH;
use stockguard::{
    CancelRequest, CredentialStore, IntakeRequest, InventoryEngine, InventoryService,
    OperationOutcome, ReceiveRequest, RelocateRequest, SaleRequest, StockguardConfig,
    TransferOutRequest,
};

#[derive(Parser)]
#[command(name = "stockguard")]
#[command(about = "Multi-location glass-parts inventory")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// User name
    #[arg(long, env = "STOCKGUARD_USER")]
    user: Option<String>,

    /// Password
    #[arg(long, env = "STOCKGUARD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create missing sheets
    Init,

    /// Print the digest to store as `password_sha256`
    HashPassword { password: String },

    #[command(flatten)]
    Operation(Operation),
}

/// Commands that run as a logged-in user.
#[derive(Subcommand)]
enum Operation {
    /// Add stock to a rack
    Intake {
        #[arg(long)]
        location: String,
        #[arg(long)]
        key: String,
        /// Display name, used when the row is new
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        rack: String,
        #[arg(long)]
        quantity: i64,
    },

    /// Write off sold or installed stock
    Sell {
        #[arg(long)]
        location: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        rack: String,
        #[arg(long)]
        quantity: i64,
        #[arg(long, default_value = "0")]
        price: Decimal,
        /// Customer or job reference
        #[arg(long, default_value = "")]
        detail: String,
    },

    /// Send stock to another location
    TransferOut {
        #[arg(long)]
        origin: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        rack: String,
        #[arg(long)]
        quantity: i64,
        #[arg(long)]
        destination: String,
    },

    /// Receive a pending transfer into a rack
    Receive {
        #[arg(long)]
        destination: String,
        /// Transfer timestamp as listed by `pending`
        #[arg(long)]
        created_at: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        rack: String,
    },

    /// Cancel a pending transfer and return the stock to a rack
    Cancel {
        #[arg(long)]
        origin: String,
        #[arg(long)]
        created_at: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        rack: String,
    },

    /// Move stock between racks of one location
    Relocate {
        #[arg(long)]
        location: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        quantity: i64,
        #[arg(long, default_value = "")]
        name: String,
    },

    /// Collapse duplicate (key, rack) rows (admin)
    Reconcile {
        #[arg(long)]
        location: String,
    },

    /// List stock of a location
    Stock {
        #[arg(long)]
        location: String,
    },

    /// List racks, or racks holding one key
    Racks {
        #[arg(long)]
        location: String,
        #[arg(long)]
        key: Option<String>,
    },

    /// Show what one rack holds
    Rack {
        #[arg(long)]
        location: String,
        #[arg(long)]
        rack: String,
    },

    /// Pending transfers to and from a location
    Pending {
        #[arg(long)]
        location: String,
    },

    /// Movement log (admin)
    Log,
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(&cli) {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            process::exit(2);
        }
    }
}

/// `Ok(false)` when the operation ran and failed.
fn run(cli: &Cli) -> anyhow::Result<bool> {
    let operation = match &cli.command {
        Commands::HashPassword { password } => {
            println!("{}", password_digest(password.trim()));
            return Ok(true);
        }
        Commands::Init => None,
        Commands::Operation(operation) => Some(operation),
    };

    let config = StockguardConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let store = config.open_store().context("opening the inventory store")?;
    let engine = InventoryEngine::from_config(store, &config);
    engine.initialize().context("preparing sheets")?;

    let Some(operation) = operation else {
        report(cli, OperationOutcome::ok("Sheets are ready."));
        return Ok(true);
    };

    let (user, password) = match (&cli.user, &cli.password) {
        (Some(user), Some(password)) => (user, password),
        _ => bail!("--user and --password (or STOCKGUARD_USER / STOCKGUARD_PASSWORD) are required"),
    };
    let session = CredentialStore::new(config.users.clone()).authenticate(user, password)?;
    let service = InventoryService::new(Arc::new(engine), session);
    dispatch(cli, &service, operation)
}

fn dispatch(cli: &Cli, service: &InventoryService, operation: &Operation) -> anyhow::Result<bool> {
    let outcome = match operation {
        Operation::Intake {
            location,
            key,
            name,
            rack,
            quantity,
        } => service.intake(&IntakeRequest {
            location: location.clone(),
            key: key.clone(),
            display_name: name.clone(),
            rack: rack.clone(),
            quantity: *quantity,
        }),
        Operation::Sell {
            location,
            key,
            rack,
            quantity,
            price,
            detail,
        } => service.sell(&SaleRequest {
            location: location.clone(),
            key: key.clone(),
            rack: rack.clone(),
            detail: detail.clone(),
            quantity: *quantity,
            price: *price,
        }),
        Operation::TransferOut {
            origin,
            key,
            rack,
            quantity,
            destination,
        } => service.transfer_out(&TransferOutRequest {
            origin: origin.clone(),
            key: key.clone(),
            rack: rack.clone(),
            quantity: *quantity,
            destination: destination.clone(),
        }),
        Operation::Receive {
            destination,
            created_at,
            key,
            rack,
        } => handle_receive(service, destination, created_at, key, rack)?,
        Operation::Cancel {
            origin,
            created_at,
            key,
            rack,
        } => handle_cancel(service, origin, created_at, key, rack)?,
        Operation::Relocate {
            location,
            key,
            from,
            to,
            quantity,
            name,
        } => service.relocate(&RelocateRequest {
            location: location.clone(),
            key: key.clone(),
            display_name: name.clone(),
            rack_from: from.clone(),
            rack_to: to.clone(),
            quantity: *quantity,
        }),
        Operation::Reconcile { location } => service.reconcile_duplicates(location),
        Operation::Stock { location } => return handle_stock(cli, service, location),
        Operation::Racks { location, key } => {
            return handle_racks(cli, service, location, key.as_deref())
        }
        Operation::Rack { location, rack } => return handle_rack(cli, service, location, rack),
        Operation::Pending { location } => return handle_pending(cli, service, location),
        Operation::Log => return handle_log(cli, service),
    };

    let success = outcome.success;
    report(cli, outcome);
    Ok(success)
}

fn report(cli: &Cli, outcome: OperationOutcome) {
    if cli.json {
        print_json(&outcome);
    } else if outcome.success {
        if !cli.quiet {
            println!("{} {}", "✔".green(), outcome.message);
        }
    } else {
        eprintln!("{} {}", "✘".red(), outcome.message);
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("{} {e}", "error:".red().bold()),
    }
}

fn handle_receive(
    service: &InventoryService,
    destination: &str,
    created_at: &str,
    key: &str,
    rack: &str,
) -> anyhow::Result<OperationOutcome> {
    let Some(transfer) = service.find_pending(created_at, key)? else {
        return Ok(OperationOutcome::failed(format!(
            "No pending transfer of {key} sent {created_at}; it may already be received or cancelled."
        )));
    };
    Ok(service.receive(&ReceiveRequest {
        destination: destination.to_string(),
        transfer,
        rack: rack.to_string(),
    }))
}

fn handle_cancel(
    service: &InventoryService,
    origin: &str,
    created_at: &str,
    key: &str,
    rack: &str,
) -> anyhow::Result<OperationOutcome> {
    let Some(transfer) = service.find_pending(created_at, key)? else {
        return Ok(OperationOutcome::failed(format!(
            "No pending transfer of {key} sent {created_at}; it may already be received or cancelled."
        )));
    };
    Ok(service.cancel_transfer(&CancelRequest {
        origin: origin.to_string(),
        transfer,
        return_rack: rack.to_string(),
    }))
}

fn handle_stock(cli: &Cli, service: &InventoryService, location: &str) -> anyhow::Result<bool> {
    let stock = service.stock(location)?;
    if cli.json {
        print_json(&stock);
        return Ok(true);
    }
    println!("\n📦 {} ({} rows)\n", location.bold(), stock.len());
    for record in &stock {
        let quantity = if record.quantity > 0 {
            record.quantity.to_string().normal()
        } else {
            record.quantity.to_string().dimmed()
        };
        println!(
            "  {:<14} {:<8} {:>6}  {}  {}",
            record.key,
            record.rack,
            quantity,
            record.display_name,
            record.last_updated.dimmed()
        );
    }
    Ok(true)
}

fn handle_racks(
    cli: &Cli,
    service: &InventoryService,
    location: &str,
    key: Option<&str>,
) -> anyhow::Result<bool> {
    match key {
        Some(key) => {
            let racks = service.racks_for_key(location, key)?;
            if cli.json {
                print_json(&racks);
            } else if racks.is_empty() {
                println!("No rack at {location} holds {key}.");
            } else {
                for rack in &racks {
                    println!("  {:<8} {:>6}  {}", rack.rack, rack.quantity, rack.display_name);
                }
            }
        }
        None => {
            let racks = service.racks(location)?;
            if cli.json {
                print_json(&racks);
            } else {
                println!("{}", racks.join("  "));
            }
        }
    }
    Ok(true)
}

fn handle_rack(
    cli: &Cli,
    service: &InventoryService,
    location: &str,
    rack: &str,
) -> anyhow::Result<bool> {
    let contents = service.rack_contents(location, rack)?;
    if cli.json {
        print_json(&contents);
        return Ok(true);
    }
    println!("\n🗄  Rack {} at {}\n", contents.rack.bold(), location);
    for record in &contents.records {
        println!("  {:<14} {:>6}  {}", record.key, record.quantity, record.display_name);
    }
    println!("\n  Total pieces: {}", contents.total);
    Ok(true)
}

fn handle_pending(cli: &Cli, service: &InventoryService, location: &str) -> anyhow::Result<bool> {
    let incoming = service.incoming_transfers(location)?;
    let outgoing = service.outgoing_transfers(location)?;
    if cli.json {
        #[derive(Serialize)]
        struct Pending<'a> {
            incoming: &'a [stockguard::PendingTransfer],
            outgoing: &'a [stockguard::PendingTransfer],
        }
        print_json(&Pending {
            incoming: &incoming,
            outgoing: &outgoing,
        });
        return Ok(true);
    }
    println!("\n📥 Incoming to {} ({}):", location.bold(), incoming.len());
    for t in &incoming {
        println!("  {}  {:<14} x{:<4} from {}", t.created_at, t.key, t.quantity, t.origin);
    }
    println!("\n📤 Outgoing from {} ({}):", location.bold(), outgoing.len());
    for t in &outgoing {
        println!("  {}  {:<14} x{:<4} to {}", t.created_at, t.key, t.quantity, t.destination);
    }
    Ok(true)
}

fn handle_log(cli: &Cli, service: &InventoryService) -> anyhow::Result<bool> {
    let entries = service.movement_log()?;
    if cli.json {
        print_json(&entries);
        return Ok(true);
    }
    for entry in &entries {
        let kind = entry
            .kind
            .map(|k| k.label().to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "{}  {:<14} {:<14} x{:<4} {:>8}  {:<12} {:<16} {}",
            entry.at,
            entry.key,
            kind,
            entry.quantity,
            entry.price,
            entry.operator,
            entry.location,
            entry.detail
        );
    }
    Ok(true)
}
