use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use quantia::application::payment::PaymentUseCase;
use quantia::application::status::StatusRecorder;
use quantia::application::subscriber::{DEFAULT_QUEUE_CAPACITY, delivery_queue};
use quantia::application::worker::DeliveryWorkerPool;
use quantia::domain::ports::{TransactionStoreRef, TransportRef};
use quantia::domain::retry::RetryPolicy;
use quantia::infrastructure::http::HttpWebhookSender;
use quantia::infrastructure::in_memory::{InMemoryTransactionStore, InMemoryTransport};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Redis connection string. Without it an in-process transport is used.
    #[arg(long, env = "REDIS_URI", global = true)]
    redis_uri: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Publish a payment and print the pending transaction.
    Pay {
        /// Amount to pay. Must be positive.
        #[arg(long, allow_negative_numbers = true)]
        amount: Decimal,

        /// Webhook URL that will receive the payment notification.
        #[arg(long)]
        url: String,
    },
    /// Subscribe to a webhook channel and deliver every payload received.
    Worker(WorkerArgs),
}

#[derive(Args)]
struct WorkerArgs {
    /// Webhook URL whose channel is consumed.
    #[arg(long, env = "WEBHOOK_ADDRESS")]
    url: String,

    /// Capacity of the queue between subscriber and workers.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Failed attempts after which a delivery is abandoned.
    #[arg(long, default_value_t = 5)]
    max_retries: u32,

    /// Wait before the first retry, in milliseconds.
    #[arg(long, default_value_t = 1_000)]
    initial_backoff_ms: u64,

    /// Upper bound for any wait between retries, in milliseconds.
    #[arg(long, default_value_t = 60_000)]
    max_backoff_ms: u64,

    /// Timeout for a single webhook call, in seconds.
    #[arg(long, default_value_t = 30)]
    http_timeout_secs: u64,
}

impl WorkerArgs {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            max_retries: self.max_retries,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quantia=info")),
        )
        .init();

    let cli = Cli::parse();
    let backend = Backend::build(cli.redis_uri.as_deref()).await?;
    let use_case = PaymentUseCase::new(backend.transport, backend.transactions.clone());

    match cli.command {
        Command::Pay { amount, url } => {
            let transaction = use_case
                .make_payment(amount, &url)
                .await
                .into_diagnostic()?;
            let json = serde_json::to_string_pretty(&transaction).into_diagnostic()?;
            println!("{json}");
        }
        Command::Worker(args) => {
            let shared = backend.shared.then_some(backend.transactions);
            run_worker(use_case, shared, args).await?
        }
    }

    Ok(())
}

/// Runs the subscriber and the worker pool until the subscription ends.
///
/// Delivery outcomes are written back to `shared_transactions` when the
/// store is shared with the `pay` command. Otherwise they are only logged.
async fn run_worker(
    use_case: PaymentUseCase,
    shared_transactions: Option<TransactionStoreRef>,
    args: WorkerArgs,
) -> Result<()> {
    let sender = HttpWebhookSender::with_timeout(Duration::from_secs(args.http_timeout_secs))
        .into_diagnostic()?;
    let mut pool = DeliveryWorkerPool::new(Arc::new(sender), args.retry_policy());
    let (queue_tx, queue_rx) = delivery_queue(args.queue_capacity);

    let recorder_handle = match shared_transactions {
        Some(transactions) => {
            let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
            pool = pool.with_outcomes(outcomes_tx);
            let recorder = StatusRecorder::new(transactions);
            Some(tokio::spawn(async move { recorder.run(outcomes_rx).await }))
        }
        None => {
            info!("Transaction store is process-local, delivery outcomes are only logged");
            None
        }
    };
    let pool_handle = tokio::spawn(async move { pool.run(queue_rx).await });

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    let result = use_case.subscribe(&args.url, queue_tx, cancel).await;
    if let Err(e) = &result {
        warn!(error = %e, "Subscriber stopped, waiting for in-flight deliveries");
    }

    // The feeder dropped its end of the queue; let started deliveries finish.
    pool_handle.await.into_diagnostic()?;
    if let Some(handle) = recorder_handle {
        handle.await.into_diagnostic()?;
    }

    result.into_diagnostic()
}

/// Transport and transaction store selected from the command line.
struct Backend {
    transport: TransportRef,
    transactions: TransactionStoreRef,
    /// Whether other processes see the same transactions.
    shared: bool,
}

impl Backend {
    async fn build(redis_uri: Option<&str>) -> Result<Self> {
        match redis_uri {
            #[cfg(feature = "transport-redis")]
            Some(uri) => {
                let transport = quantia::infrastructure::redis::RedisTransport::connect(uri)
                    .await
                    .into_diagnostic()?;
                Ok(Self {
                    transactions: Arc::new(transport.transaction_store()),
                    transport: Arc::new(transport),
                    shared: true,
                })
            }
            #[cfg(not(feature = "transport-redis"))]
            Some(_) => {
                warn!("Built without the transport-redis feature, using in-process transport");
                Ok(Self::in_process())
            }
            None => {
                info!("Using in-process transport");
                Ok(Self::in_process())
            }
        }
    }

    fn in_process() -> Self {
        Self {
            transport: Arc::new(InMemoryTransport::new()),
            transactions: Arc::new(InMemoryTransactionStore::new()),
            shared: false,
        }
    }
}
