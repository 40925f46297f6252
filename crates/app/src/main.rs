//! Command-line front end for expense vouchers with receipt scanning.

mod commands;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use voucher_core::{Action, DateRange, PersonId, VoucherConfig, VoucherFilter, VoucherId, VoucherStatus};
use voucher_ocr::{Interpreter, OcrBackend, RecognitionOrchestrator};

use commands::{AppState, ItemInput, NewVoucher, ReceiptInput};

const CONFIG_FILE: &str = "voucher.toml";

/// Expense vouchers: scan receipts, submit, approve, finalize
#[derive(Parser)]
#[command(name = "voucher")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true, env = "VOUCHER_CONFIG")]
    config: Option<PathBuf>,

    /// Id of the person acting
    #[arg(long = "as", global = true, env = "VOUCHER_USER")]
    actor: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read amount and date from a receipt image
    Scan { image: PathBuf },

    /// Create a voucher, optionally submitting it straight away
    New(NewArgs),

    /// Scan a receipt into one line of a draft or recycled voucher
    Attach {
        id: i64,
        /// Receipt as INDEX=PATH
        receipt: ReceiptInput,
    },

    /// Send a draft or recycled voucher to the manager
    Submit(ActArgs),
    /// Pass a voucher on to accounts
    Approve(ActArgs),
    /// Return a voucher to its employee for changes
    Recycle(ActArgs),
    /// Turn a voucher down for good
    Reject(ActArgs),
    /// Close out an approved voucher
    Finalize(ActArgs),

    /// Your own vouchers
    List(ListArgs),

    /// Vouchers waiting on you
    Inbox,

    /// Your roles: employee, manager, accounts
    Roles,
}

impl Commands {
    fn reads_receipts(&self) -> bool {
        match self {
            Commands::Scan { .. } | Commands::Attach { .. } => true,
            Commands::New(args) => !args.receipts.is_empty(),
            _ => false,
        }
    }
}

#[derive(Args)]
struct NewArgs {
    #[arg(long)]
    currency: String,
    #[arg(long)]
    project_related: bool,
    #[arg(long)]
    project: Option<String>,
    #[arg(long)]
    comment: Option<String>,
    /// Defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Expense line as HEAD,DESCRIPTION[,DATE[,AMOUNT]]
    #[arg(long = "item", required = true)]
    items: Vec<ItemInput>,
    /// Receipt image for a line, as INDEX=PATH
    #[arg(long = "receipt")]
    receipts: Vec<ReceiptInput>,
    #[arg(long)]
    submit: bool,
}

#[derive(Args)]
struct ActArgs {
    id: i64,
    #[arg(long)]
    comment: Option<String>,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long)]
    status: Option<VoucherStatus>,
    /// Matches department or project
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    from: Option<NaiveDate>,
    #[arg(long)]
    to: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let project_dirs = directories::ProjectDirs::from("com", "voucher", "Voucher")
        .context("Failed to get app directory")?;
    let config = load_config(cli.config.as_deref(), project_dirs.config_dir())?;

    let db_path = config.storage.db_path(project_dirs.data_dir());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create data directory")?;
    }
    let db = voucher_storage::create_db(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let interpreter = Interpreter::new(&config.extraction);

    #[cfg(feature = "tesseract")]
    let recognizer = voucher_ocr::TesseractRecognizer::new(config.ocr.tesseract_data_path.clone());
    #[cfg(not(feature = "tesseract"))]
    let recognizer = voucher_ocr::UnavailableRecognizer;

    let app = AppState {
        db,
        directory: config.directory(),
        scanner: RecognitionOrchestrator::new(recognizer, interpreter, &config.ocr),
    };

    run(&app, cli.command, cli.actor.map(PersonId)).await
}

fn load_config(explicit: Option<&Path>, config_dir: &Path) -> anyhow::Result<VoucherConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let p = config_dir.join(CONFIG_FILE);
            if !p.exists() {
                tracing::debug!("No config at {}, using defaults", p.display());
                return Ok(VoucherConfig::default());
            }
            p
        }
    };
    VoucherConfig::from_file(&path).with_context(|| format!("Failed to load config {}", path.display()))
}

async fn run<R: OcrBackend + 'static>(
    app: &AppState<R>,
    command: Commands,
    actor: Option<PersonId>,
) -> anyhow::Result<()> {
    let acting = || actor.context("No acting person; pass --as <id> or set VOUCHER_USER");

    if command.reads_receipts() && !cfg!(feature = "tesseract") {
        tracing::warn!("Built without the `tesseract` feature; receipts will read as empty");
    }

    match command {
        Commands::Scan { image } => print_json(&app.scan(&image).await?.result),
        Commands::New(args) => {
            let input = NewVoucher {
                currency: args.currency,
                project_related: Some(args.project_related),
                project: args.project,
                comment: args.comment,
                voucher_date: args.date,
                items: args.items,
                receipts: args.receipts,
                submit: args.submit,
            };
            let today = chrono::Local::now().date_naive();
            print_json(&app.create_voucher(acting()?, input, today).await?)
        }
        Commands::Attach { id, receipt } => {
            print_json(&app.attach_receipt(acting()?, VoucherId(id), receipt).await?)
        }
        Commands::Submit(a) => act(app, acting()?, Action::Submit, a).await,
        Commands::Approve(a) => act(app, acting()?, Action::Approve, a).await,
        Commands::Recycle(a) => act(app, acting()?, Action::Recycle, a).await,
        Commands::Reject(a) => act(app, acting()?, Action::Reject, a).await,
        Commands::Finalize(a) => act(app, acting()?, Action::Finalize, a).await,
        Commands::List(args) => {
            let mut filter = VoucherFilter::default().with_dates(DateRange { start: args.from, end: args.to });
            if let Some(status) = args.status {
                filter = filter.with_status(status);
            }
            if let Some(term) = args.search.as_deref() {
                filter = filter.with_search(term);
            }
            print_json(&app.my_requests(acting()?, filter).await?)
        }
        Commands::Inbox => print_json(&app.inbox(acting()?).await?),
        Commands::Roles => print_json(&app.roles(acting()?).await?),
    }
}

async fn act<R: OcrBackend + 'static>(
    app: &AppState<R>,
    actor: PersonId,
    action: Action,
    args: ActArgs,
) -> anyhow::Result<()> {
    let voucher = app.act(actor, VoucherId(args.id), action, args.comment).await?;
    print_json(&voucher)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
