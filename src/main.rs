//! Command-line interface for lazy-shard-loadtest
//!
//! # Usage Examples
//!
//! ## Single Worker
//! ```bash
//! # Insert worker, every setting from the environment (container style)
//! ROLE=insert TABLE_NAME=loadtest QUEUE_URL=https://sqs... \
//!   LOAD=300 DURATION=600 INTERVAL=1000 INCREMENT=0.3 INC_TIME=60 LOAD_LIMIT=-1 \
//!   lazy-shard-loadtest worker
//!
//! # Dry run against the in-memory store
//! lazy-shard-loadtest worker --table-name loadtest --store memory --iterations 5 --load 10
//! ```
//!
//! ## Orchestration
//! ```bash
//! # Insert, then read, then update, as the plan describes
//! lazy-shard-loadtest orchestrate --plan plan.yaml
//!
//! # Stop after the insert phase
//! lazy-shard-loadtest orchestrate --plan plan.yaml --continue NO
//!
//! # Pick up where the last run stopped
//! lazy-shard-loadtest orchestrate --plan plan.yaml --resume --continue YES
//!
//! # One worker process per copy
//! lazy-shard-loadtest orchestrate --plan plan.yaml --launcher process --results-dir ./results
//! ```
//!
//! ## Aggregation
//! ```bash
//! lazy-shard-loadtest aggregate ./results --format table
//! ```

use clap::{Parser, Subcommand};
use lazy_shard_loadtest::aggregate::run_aggregate;
use lazy_shard_loadtest::orchestrate::run_orchestrate;
use lazy_shard_loadtest::{AggregateArgs, OrchestrateArgs, WorkerArgs};
use loadtest_worker::run_worker;

#[derive(Parser)]
#[command(name = "lazy-shard-loadtest")]
#[command(about = "Load test a DynamoDB hot partition and exercise lazy resharding")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one insert, read or update worker
    Worker(WorkerArgs),

    /// Run the insert, read and update phases of a load test plan
    Orchestrate(OrchestrateArgs),

    /// Aggregate worker metrics files into one report
    Aggregate(AggregateArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Worker(args) => {
            run_worker(args).await?;
        }
        Commands::Orchestrate(args) => {
            run_orchestrate(args).await?;
        }
        Commands::Aggregate(args) => {
            run_aggregate(&args)?;
        }
    }

    Ok(())
}
