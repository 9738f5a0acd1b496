//! collection-backup
//!
//! Command-line front end for the backup and restore orchestrators, plus a
//! `serve` mode that exposes them over REST.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use collection_backup_orchestrator::orchestration::{report, status};
use collection_backup_orchestrator::{
    ApiServer, ApiServerConfig, BackupOrchestrator, BackupSpec, ClientRegistry,
    ClusterAdminClientRef, ClusterConfig, CollectionRef, ConsoleReporter, InMemoryCluster,
    JobOutcomeReporter, JobRequest, JobWatcher, Operation, OperationMetrics, OperationMode,
    OperationOutcome, RestoreOrchestrator, RestoreSpec, DEFAULT_COLLECTION,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Back up and restore cluster collections
#[derive(Parser, Debug)]
#[command(name = "collection-backup", author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Cluster configuration file (YAML)
    #[arg(long, global = true, env = "CLUSTER_CONFIG")]
    config: Option<PathBuf>,

    /// Cluster base URL, overrides the configuration file
    #[arg(long, global = true, env = "CLUSTER_URL")]
    cluster_url: Option<String>,

    /// Use a seeded in-memory cluster instead of a real one
    #[arg(long, global = true, env = "STANDALONE")]
    standalone: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Back up a collection
    Backup(JobArgs),

    /// Restore a collection from a backup
    Restore {
        #[command(flatten)]
        job: JobArgs,

        /// Delete the collection first if it already exists
        #[arg(short = 'f', long)]
        force: bool,
    },

    /// Query the status of an async backup or restore
    Status {
        /// Request id returned by an async issuance
        #[arg(short = 'i', long = "request-id")]
        request_id: String,

        /// Workflow the request belongs to
        #[arg(long, value_enum, default_value = "restore")]
        operation: OperationArg,

        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Serve the REST API
    Serve {
        /// REST API bind address
        #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8090")]
        api_addr: String,
    },
}

#[derive(clap::Args, Debug)]
struct JobArgs {
    /// Collection to operate on
    #[arg(short = 'c', long, default_value = DEFAULT_COLLECTION)]
    collection: String,

    /// Backup location, a directory on a mount shared by all nodes
    #[arg(short = 'd', long = "dir")]
    dir: Option<String>,

    /// Backup name; defaults to snapshot.<timestamp>, or the latest one on restore
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Issue asynchronously and print the request id
    #[arg(short = 'a', long = "async")]
    async_mode: bool,

    /// Query the status of a previous async request instead
    #[arg(short = 's', long)]
    status: bool,

    /// Request id for --status
    #[arg(short = 'i', long = "request-id")]
    request_id: Option<String>,

    #[command(flatten)]
    wait: WaitArgs,
}

#[derive(clap::Args, Debug)]
struct WaitArgs {
    /// Poll an async request until it finishes
    #[arg(long)]
    wait: bool,

    /// Seconds between status polls
    #[arg(long, default_value = "5")]
    poll_interval_secs: u64,

    /// Give up waiting after this many seconds
    #[arg(long, default_value = "3600")]
    timeout_secs: u64,
}

impl WaitArgs {
    fn watcher(&self) -> JobWatcher {
        JobWatcher::new(
            Duration::from_secs(self.poll_interval_secs.max(1)),
            Duration::from_secs(self.timeout_secs),
        )
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OperationArg {
    Backup,
    Restore,
}

impl From<OperationArg> for Operation {
    fn from(arg: OperationArg) -> Self {
        match arg {
            OperationArg::Backup => Operation::Backup,
            OperationArg::Restore => Operation::Restore,
        }
    }
}

impl JobArgs {
    fn mode(&self) -> OperationMode {
        if self.async_mode {
            OperationMode::Async
        } else {
            OperationMode::Sync
        }
    }

    fn request<S>(&self, spec: S) -> JobRequest<S> {
        JobRequest {
            spec,
            status: self.status,
            request_id: self.request_id.clone(),
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    init_logging(&args);

    let config = load_config(&args)?;
    let client = build_client(&args, config)?;
    info!(
        "{} {} using the {} client",
        collection_backup_orchestrator::NAME,
        collection_backup_orchestrator::VERSION,
        client.client_name()
    );

    let reporter = Arc::new(ConsoleReporter);

    let succeeded = match &args.command {
        Command::Backup(job) => {
            let collection = CollectionRef::new(job.collection.as_str())?;
            let mut spec = BackupSpec::new(collection).with_mode(job.mode());
            spec.location = job.dir.clone();
            spec.backup_name = job.name.clone();

            let outcome = BackupOrchestrator::with_reporter(reporter)
                .run(job.request(spec), client.as_ref())
                .await;
            follow(Operation::Backup, &job.wait, &outcome, &client).await?
        }
        Command::Restore { job, force } => {
            let collection = CollectionRef::new(job.collection.as_str())?;
            let mut spec = RestoreSpec::new(collection)
                .with_mode(job.mode())
                .forced(*force);
            spec.location = job.dir.clone();
            spec.backup_name = job.name.clone();

            let outcome = RestoreOrchestrator::with_reporter(reporter)
                .run(job.request(spec), client.as_ref())
                .await;
            follow(Operation::Restore, &job.wait, &outcome, &client).await?
        }
        Command::Status {
            request_id,
            operation,
            wait,
        } => {
            let operation = Operation::from(*operation);
            if wait.wait {
                watch(operation, wait, request_id, &client).await?
            } else {
                let outcome = match operation {
                    Operation::Backup => {
                        BackupOrchestrator::with_reporter(reporter)
                            .status(request_id, client.as_ref())
                            .await
                    }
                    Operation::Restore => {
                        RestoreOrchestrator::with_reporter(reporter)
                            .status(request_id, client.as_ref())
                            .await
                    }
                };
                outcome.success
            }
        }
        Command::Serve { api_addr } => {
            let api_config = ApiServerConfig {
                rest_addr: api_addr
                    .parse()
                    .with_context(|| format!("Invalid REST API address: {}", api_addr))?,
            };
            let server = Arc::new(ApiServer::new(api_config, client, OperationMetrics::new()?));

            let signal_server = server.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received interrupt, shutting down");
                    signal_server.shutdown();
                }
            });

            server.run().await?;
            info!("Server shutdown complete");
            true
        }
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// After an accepted async issuance, optionally wait for the job
async fn follow(
    operation: Operation,
    wait: &WaitArgs,
    outcome: &OperationOutcome,
    client: &ClusterAdminClientRef,
) -> anyhow::Result<bool> {
    match (&outcome.request_id, wait.wait) {
        (Some(request_id), true) => watch(operation, wait, request_id, client).await,
        _ => Ok(outcome.success),
    }
}

async fn watch(
    operation: Operation,
    wait: &WaitArgs,
    request_id: &str,
    client: &ClusterAdminClientRef,
) -> anyhow::Result<bool> {
    let job = wait
        .watcher()
        .wait(client.as_ref(), request_id)
        .await
        .with_context(|| format!("Waiting for request {} failed", request_id))?;

    let outcome = status::outcome_for(operation, job);
    let console: &dyn JobOutcomeReporter = &ConsoleReporter;
    report::deliver(Some(console), &outcome);
    Ok(outcome.success)
}

// =============================================================================
// Cluster Setup
// =============================================================================

fn load_config(args: &Args) -> anyhow::Result<ClusterConfig> {
    let mut config = match &args.config {
        Some(path) => ClusterConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ClusterConfig::default(),
    };

    if let Some(url) = &args.cluster_url {
        config.base_url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

fn build_client(args: &Args, config: ClusterConfig) -> anyhow::Result<ClusterAdminClientRef> {
    if args.standalone {
        let cluster = InMemoryCluster::new(ClusterConfig {
            client_kind: "memory".into(),
            ..config
        });
        cluster.create_collection(DEFAULT_COLLECTION);
        return Ok(Arc::new(cluster));
    }

    Ok(ClientRegistry::default().create(config)?)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=info", "tower_http=info", "axum=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // Logs go to stderr; stdout carries the outcome report
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
