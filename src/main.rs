use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use mimic_gateway::audit::AuditLogger;
use mimic_gateway::config::load_config;
use mimic_gateway::prompts::PromptRegistry;
use mimic_gateway::proxy::tracing::init_tracing;
use mimic_gateway::proxy::GatewayServer;

#[derive(Parser)]
#[command(name = "mimic-gateway", version, about = "Authenticating relay to a fixed chat-completion upstream")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    let prompts = match PromptRegistry::load_dir(&config.gateway.prompt_dir) {
        Ok(prompts) => prompts,
        Err(err) => {
            tracing::warn!(error = %err, "prompt directory unavailable, continuing without model prompts");
            PromptRegistry::new()
        }
    };
    tracing::info!(count = prompts.len(), models = ?prompts.models(), "model prompts loaded");

    AuditLogger::from_config(&config.audit)
        .ensure_dirs()
        .await
        .context("failed to create audit directories")?;

    let server = GatewayServer::new(&config, prompts).context("failed to build gateway")?;
    server.run().await.context("gateway server failed")?;

    Ok(())
}
