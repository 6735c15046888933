use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tour_settlement::application::cancellation::CancellationService;
use tour_settlement::application::engine::SettlementEngine;
use tour_settlement::config::{DEFAULT_CURRENCY, EngineConfig};
use tour_settlement::domain::ports::SettlementStoreRef;
use tour_settlement::infrastructure::in_memory::InMemorySettlementStore;
use tour_settlement::infrastructure::log_sink::{LogMailer, LogPublisher};
use tour_settlement::interfaces::http::{AppState, WebhookResponse, router};
use tour_settlement::interfaces::replay::NotificationReader;
use tour_settlement::interfaces::seed::CatalogSeed;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the gateway webhook and booking routes over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, env = "SETTLEMENT_BIND", default_value = "0.0.0.0:8080")]
        bind: SocketAddr,

        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Feed a JSON-lines file of gateway notifications through the engine
    Replay {
        /// Input notifications file, one JSON object per line
        input: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Args)]
struct EngineArgs {
    /// Platform commission taken from provider shares, between 0 and 1
    #[arg(long, env = "SETTLEMENT_COMMISSION_RATE", default_value = "0.15")]
    commission_rate: Decimal,

    /// Currency for transactions whose entity carries none
    #[arg(long, env = "SETTLEMENT_CURRENCY", default_value = DEFAULT_CURRENCY)]
    currency: String,

    /// Upper bound for each real-time publish or confirmation mail
    #[arg(long, env = "SETTLEMENT_PUBLISH_TIMEOUT_MS", default_value_t = 5000)]
    publish_timeout_ms: u64,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// JSON catalog of tours, slots, bookings, products and orders to load first
    #[arg(long)]
    catalog: Option<PathBuf>,
}

impl EngineArgs {
    fn config(&self) -> Result<EngineConfig> {
        let config = EngineConfig::default()
            .with_commission_rate(self.commission_rate)
            .into_diagnostic()?
            .with_currency(self.currency.as_str())
            .into_diagnostic()?
            .with_publish_timeout(Duration::from_millis(self.publish_timeout_ms));
        Ok(config)
    }

    async fn open_store(&self) -> Result<SettlementStoreRef> {
        let store = open_store(self.db_path.as_ref())?;
        if let Some(path) = &self.catalog {
            CatalogSeed::load(path)
                .into_diagnostic()?
                .apply(store.as_ref())
                .await
                .into_diagnostic()?;
        }
        Ok(store)
    }

    async fn build(&self) -> Result<(SettlementEngine, SettlementStoreRef)> {
        let config = self.config()?;
        let store = self.open_store().await?;
        let engine = SettlementEngine::new(
            store.clone(),
            Arc::new(LogPublisher),
            Arc::new(LogMailer),
            &config,
        );
        Ok((engine, store))
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<&PathBuf>) -> Result<SettlementStoreRef> {
    use tour_settlement::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => Ok(Arc::new(RocksDBStore::open(path).into_diagnostic()?)),
        None => Ok(Arc::new(InMemorySettlementStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<&PathBuf>) -> Result<SettlementStoreRef> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemorySettlementStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is reserved for replay output
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { bind, engine } => serve(bind, engine).await,
        Command::Replay { input, engine } => replay(input, engine).await,
    }
}

async fn serve(bind: SocketAddr, args: EngineArgs) -> Result<()> {
    let (engine, store) = args.build().await?;
    let state = AppState {
        engine: Arc::new(engine),
        cancellations: Arc::new(CancellationService::new(store.clone())),
        store,
    };

    let listener = tokio::net::TcpListener::bind(bind).await.into_diagnostic()?;
    info!(%bind, "settlement service listening");
    axum::serve(listener, router(state)).await.into_diagnostic()?;
    Ok(())
}

async fn replay(input: PathBuf, args: EngineArgs) -> Result<()> {
    let (engine, _store) = args.build().await?;
    let file = File::open(input).into_diagnostic()?;
    let reader = NotificationReader::new(file);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for notification in reader.notifications() {
        match notification {
            Ok(notification) => match engine.process_notification(notification).await {
                Ok(outcome) => {
                    let line = serde_json::to_string(&WebhookResponse::from(&outcome))
                        .into_diagnostic()?;
                    writeln!(out, "{}", line).into_diagnostic()?;
                }
                Err(e) => {
                    eprintln!("Error processing notification: {}", e);
                }
            },
            Err(e) => {
                eprintln!("Error reading notification: {}", e);
            }
        }
    }
    out.flush().into_diagnostic()?;

    Ok(())
}
