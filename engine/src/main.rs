use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use relay_diagnostics::DiagnosticsPanel;
use relay_observability::{
    canonical_logs_dir_from_root, emit_event, init_console_logging, init_process_logging,
    ObservabilityEvent, ProcessKind,
};
use relay_providers::{AgentRuntime, BedrockAgentRuntime, RelayConfig};
use relay_server::{serve, AppState};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "agent-relay")]
#[command(about = "Streams hosted agent responses to a browser chat UI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP relay. Credentials come from AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY.
    Serve {
        #[arg(long, alias = "host", default_value = "127.0.0.1")]
        hostname: String,
        #[arg(long, default_value_t = 3000)]
        port: u16,
        #[arg(long, env = "RELAY_STATE_DIR")]
        state_dir: Option<String>,
        #[arg(long, default_value_t = 14)]
        log_retention_days: u64,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        agent_id: Option<String>,
        #[arg(long)]
        agent_alias_id: Option<String>,
        #[arg(long)]
        max_duration_secs: Option<u64>,
    },
    /// Call a running relay's self-test endpoint and print the result.
    Diagnose {
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            hostname,
            port,
            state_dir,
            log_retention_days,
            region,
            agent_id,
            agent_alias_id,
            max_duration_secs,
        } => {
            let config = apply_cli_overrides(
                RelayConfig::from_env()?,
                region,
                agent_id,
                agent_alias_id,
                max_duration_secs,
            )?;
            let state_dir = resolve_state_dir(state_dir);
            let logs_dir = canonical_logs_dir_from_root(&state_dir);
            let (_log_guard, log_info) =
                init_process_logging(ProcessKind::Server, &logs_dir, log_retention_days)?;
            emit_event(
                tracing::Level::INFO,
                ProcessKind::Server,
                ObservabilityEvent {
                    event: "logging.initialized",
                    component: "engine.main",
                    status: Some("ok"),
                    detail: Some("server jsonl logging initialized"),
                    ..Default::default()
                },
            );
            info!("server logging initialized: {:?}", log_info);

            let addr: SocketAddr = format!("{hostname}:{port}")
                .parse()
                .context("invalid hostname or port")?;
            log_startup_config(&config, &addr);

            let runtime: Arc<dyn AgentRuntime> =
                Arc::new(BedrockAgentRuntime::from_config(&config).await);
            info!("agent runtime ready: {:?}", runtime.info());
            serve(addr, AppState::new(config, runtime)).await?;
        }
        Command::Diagnose { url } => {
            init_console_logging();
            let mut panel = DiagnosticsPanel::new(url);
            panel.trigger().await;
            if let Some(rendered) = panel.render() {
                println!("{rendered}");
            }
            if !panel.last_succeeded() {
                anyhow::bail!("configuration self-test failed");
            }
        }
    }

    Ok(())
}

fn apply_cli_overrides(
    mut config: RelayConfig,
    region: Option<String>,
    agent_id: Option<String>,
    agent_alias_id: Option<String>,
    max_duration_secs: Option<u64>,
) -> anyhow::Result<RelayConfig> {
    if let Some(region) = region {
        config.region = Some(non_empty("region", region)?);
    }
    if let Some(agent_id) = agent_id {
        config.agent_id = Some(non_empty("agent id", agent_id)?);
    }
    if let Some(alias) = agent_alias_id {
        config.agent_alias_id = Some(non_empty("agent alias id", alias)?);
    }
    if let Some(secs) = max_duration_secs {
        if secs == 0 {
            anyhow::bail!("max duration must be at least one second");
        }
        config.max_duration = Duration::from_secs(secs);
    }
    Ok(config)
}

fn non_empty(label: &str, value: String) -> anyhow::Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        anyhow::bail!("{} cannot be empty", label);
    }
    Ok(trimmed.to_string())
}

fn resolve_state_dir(flag: Option<String>) -> PathBuf {
    if let Some(dir) = flag.filter(|d| !d.trim().is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_local_dir()
        .map(|dir| dir.join("agent-relay"))
        .unwrap_or_else(|| PathBuf::from(".agent-relay"))
}

fn log_startup_config(config: &RelayConfig, addr: &SocketAddr) {
    info!("starting agent-relay on http://{addr}");
    info!("relay config: {:?}", config);
    if let Err(issue) = config.validate() {
        let detail = format!("chat requests will fail until fixed: {issue}");
        emit_event(
            tracing::Level::WARN,
            ProcessKind::Server,
            ObservabilityEvent {
                event: "engine.config.incomplete",
                component: "engine.main",
                status: Some("degraded"),
                error_code: Some("CONFIG_INCOMPLETE"),
                detail: Some(detail.as_str()),
                ..Default::default()
            },
        );
    }
}
