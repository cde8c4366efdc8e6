use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use device_update_agent::capabilities::Capabilities;
use device_update_agent::cli::{Cli, Command};
use device_update_agent::config::AgentConfig;
use device_update_agent::handler::HandlerRegistry;
use device_update_agent::logging::{self, AuditLog};
use device_update_agent::twin::{DesiredDocument, SendStatus, TwinChannel};
use device_update_agent::WorkflowEngine;
use std::sync::Arc;

/// Prints every reported document to stdout instead of publishing it over
/// a real twin transport. The real MQTT/AMQP glue is an external
/// collaborator (§6); this is the CLI's stand-in.
struct StdoutTwin;

#[async_trait]
impl TwinChannel for StdoutTwin {
    async fn send_reported(&self, payload: serde_json::Value) -> std::io::Result<SendStatus> {
        println!("{}", serde_json::to_string_pretty(&payload)?);
        Ok(200)
    }
}

fn main() -> Result<()> {
    logging::init_tracing();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default_config(),
    };

    let audit = Some(Arc::new(AuditLog::open(&config.paths.audit_log)?));
    let engine = WorkflowEngine::new(
        config,
        HandlerRegistry::default(),
        Capabilities::system(),
        Arc::new(StdoutTwin),
        audit,
    );

    match cli.command {
        Command::Connect => {
            engine.on_connected().await?;
        }
        Command::Apply { file, version } => {
            let raw = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => std::io::read_to_string(std::io::stdin())?,
            };
            let doc: DesiredDocument = serde_json::from_str(&raw)?;
            engine.on_desired_property(doc, version).await?;
        }
        Command::Tick { count } => {
            for _ in 0..count {
                engine.do_work().await?;
            }
        }
    }

    engine.on_destroy().await;
    Ok(())
}
