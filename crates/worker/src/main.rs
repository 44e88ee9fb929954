// swflow worker
//
// Design Decision: Use clap derive for the role subcommands; everything else comes from the environment.
// Design Decision: One worker loop per task list; Ctrl-C cancels all of them through one token.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use swflow_durable::{DeciderRegistry, TwoActivityDecider, WorkerLoop, WorkflowService};
use swflow_worker::telemetry::{init_telemetry, TelemetryConfig};
use swflow_worker::{create_executor, start_workflow, SwfHttpClient, WorkerConfig};

#[derive(Parser)]
#[command(name = "swflow-worker")]
#[command(about = "Activity and decision workers for a two-activity workflow")]
#[command(version)]
pub struct Cli {
    /// Service endpoint (overrides SWF_ENDPOINT)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Workflow domain (overrides SWF_DOMAIN)
    #[arg(long, global = true)]
    pub domain: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll the activity task lists and run activities
    Activity,

    /// Poll the decision task list and replay histories
    Decider,

    /// Start one workflow execution
    Start {
        /// Value of the "input" field of the workflow input
        #[arg(long, default_value = "World")]
        input: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_telemetry(TelemetryConfig::from_env());

    let cli = Cli::parse();
    let mut config = WorkerConfig::from_env();
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(domain) = cli.domain {
        config.workflow.domain = domain;
    }

    let signer = config.signer();
    match &signer {
        Some(signer) => tracing::info!(region = %signer.region(), "Signing requests with AWS credentials"),
        None => tracing::warn!(
            endpoint = %config.endpoint,
            "No AWS credentials configured, sending unsigned requests"
        ),
    }
    let client = SwfHttpClient::new(&config.endpoint, config.long_poll_timeout)
        .context("Failed to create service client")?
        .with_signer(signer)
        .with_auth_token(config.auth_token.clone());
    let service: Arc<dyn WorkflowService> = Arc::new(client);

    match cli.command {
        Commands::Start { input } => {
            let started = start_workflow(service.as_ref(), &config.workflow, &input)
                .await
                .context("Failed to start workflow")?;
            println!("{} {}", started.workflow_id, started.run_id);
            Ok(())
        }
        Commands::Activity => run_activity_workers(service, config).await,
        Commands::Decider => run_decider(service, config).await,
    }
}

async fn run_activity_workers(service: Arc<dyn WorkflowService>, config: WorkerConfig) -> Result<()> {
    let shutdown = shutdown_on_ctrl_c();
    let executor = Arc::new(create_executor(&config));

    let mut workers = JoinSet::new();
    for task_list in config.workflow.activity_task_lists() {
        let worker = WorkerLoop::activity(
            service.clone(),
            &config.workflow.domain,
            task_list,
            executor.clone(),
            config.worker_loop.clone(),
            shutdown.clone(),
        );
        workers.spawn(worker.run());
    }

    join_workers(workers, &shutdown).await
}

async fn run_decider(service: Arc<dyn WorkflowService>, config: WorkerConfig) -> Result<()> {
    let shutdown = shutdown_on_ctrl_c();
    let workflow = Arc::new(config.workflow);
    let registry = DeciderRegistry::new().with(TwoActivityDecider::new(workflow.clone()));

    let mut workers = JoinSet::new();
    workers.spawn(
        WorkerLoop::decision(
            service,
            &workflow.domain,
            &workflow.decision_task_list,
            Arc::new(registry),
            config.worker_loop,
            shutdown.clone(),
        )
        .run(),
    );

    join_workers(workers, &shutdown).await
}

/// Wait for every loop; the first failure stops the others
async fn join_workers(
    mut workers: JoinSet<Result<swflow_durable::WorkerStats, swflow_durable::WorkerError>>,
    shutdown: &CancellationToken,
) -> Result<()> {
    let mut outcome = Ok(());
    while let Some(joined) = workers.join_next().await {
        match joined.context("Worker task panicked")? {
            Ok(stats) => tracing::info!(?stats, "Worker loop finished"),
            Err(e) => {
                tracing::error!(error = %e, "Worker loop failed");
                shutdown.cancel();
                outcome = Err(e).context("Worker loop failed");
            }
        }
    }

    tracing::info!("Worker shutdown complete");
    outcome
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Received shutdown signal");
        token.cancel();
    });
    shutdown
}
