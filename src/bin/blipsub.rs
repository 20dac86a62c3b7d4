//! blipsub – list, publish and consume against a pub/sub broker.
//
//  $ GOOGLE_CLOUD_PROJECT=demo blipsub run
//  $ GOOGLE_CLOUD_PROJECT=demo blipsub publish my-topic "hello world!"
//  $ GOOGLE_CLOUD_PROJECT=demo blipsub consume my-sub --threshold 10
use blipsub::config::{project_from_env, Config};
use blipsub::logging::init_logging;
use blipsub::{InMemoryBroker, Orchestrator};

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::num::NonZeroU64;
use std::process;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "blipsub", version, about = "Pub/sub topic, publish and bounded-consume client")]
struct Cli {
    /// Path to config TOML (env BLIPSUB_CONFIG is used when omitted)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List topics, list the demo topic's subscriptions, publish, then consume (default).
    Run,
    /// List all topics of the project.
    Topics,
    /// List the subscriptions attached to a topic.
    Subscriptions {
        topic: String,
    },
    /// Publish one message and print its confirmed id.
    Publish {
        topic: String,
        message: String,
    },
    /// Consume from a subscription until the threshold is reached.
    Consume {
        subscription: String,
        /// Number of messages to handle before stopping (defaults to consumer.threshold)
        #[arg(short, long)]
        threshold: Option<NonZeroU64>,
    },
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    // Checked before anything else, so a missing project never reaches the broker.
    let project = match project_from_env() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}.");
            process::exit(1);
        }
    };

    if let Err(e) = execute(cli, project).await {
        eprintln!("[FATAL] {e:#}");
        process::exit(1);
    }
}

async fn execute(cli: Cli, project: String) -> anyhow::Result<()> {
    let cfg: Config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    let client = Arc::new(
        InMemoryBroker::from_config(project, &cfg.emulator)
            .context("Could not create pubsub client")?,
    );
    let app = Orchestrator::new(client, std::io::stdout());

    match cli.cmd.unwrap_or(Command::Run) {
        Command::Run => {
            app.run(&cfg.demo, cfg.consumer.threshold).await?;
        }
        Command::Topics => {
            app.list_topics().await?;
        }
        Command::Subscriptions { topic } => {
            app.list_subscriptions(&topic).await?;
        }
        Command::Publish { topic, message } => {
            app.publish(&topic, &message).await?;
        }
        Command::Consume {
            subscription,
            threshold,
        } => {
            let threshold = threshold.unwrap_or(cfg.consumer.threshold);
            app.consume(&subscription, threshold).await?;
        }
    }
    Ok(())
}
