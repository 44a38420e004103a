use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use smppth::agent::{Agent, AgentGroup, Esme, Smsc};
use smppth::app::{StandardApplication, TextCommandParser};
use smppth::config::Config;
use smppth::telemetry::{init_tracing, TracingConfig};

#[derive(Parser, Debug)]
#[command(name = "smpp-test-harness")]
#[command(author, version, about = "SMPP v3.4 test harness")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the agents of one role from a config file
    Run {
        /// Which side of the configured binds to impersonate
        #[arg(value_enum)]
        role: Role,

        /// Path to the YAML config file
        config: PathBuf,

        /// Validate config and exit
        #[arg(long)]
        validate: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Role {
    Esmes,
    Smscs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let Command::Run {
        role,
        config,
        validate,
    } = args.command;

    // Configuration errors must reach the operator before anything starts.
    let config = Config::load(&config)?;

    init_tracing(&TracingConfig {
        log_level: args.log_level.clone(),
        json_logs: args.json_logs,
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        esmes = config.esmes.len(),
        smscs = config.smscs.len(),
        binds = config.transceiver_binds.len(),
        "configuration loaded"
    );

    if validate {
        info!("configuration is valid");
        return Ok(());
    }

    let agents = build_agents(&config, role);
    let group = AgentGroup::new(agents);

    // No downstream consumer here, so skip the proxy copies.
    let app = StandardApplication::new(group.clone()).disable_event_proxying();
    let events = group
        .take_event_stream()
        .await
        .expect("freshly created group owns its event stream");

    let (command_tx, command_rx) = mpsc::channel(64);
    let pump = tokio::spawn(app.run(events, command_rx));

    tokio::spawn(read_user_commands(command_tx));

    group.start_all().await;

    // The pump ends when the user quits or stdin closes.
    let _ = pump.await;
    group.stop_all().await;

    Ok(())
}

fn build_agents(config: &Config, role: Role) -> Vec<Arc<dyn Agent>> {
    match role {
        Role::Esmes => {
            let plans = config.bind_plans();
            config
                .esmes
                .iter()
                .map(|esme| {
                    let binds = plans
                        .iter()
                        .find(|plan| plan.esme_name == esme.name)
                        .map(|plan| plan.binds.clone())
                        .unwrap_or_default();
                    Esme::new(&esme.name, esme.local_addr(), binds) as Arc<dyn Agent>
                })
                .collect()
        }
        Role::Smscs => config
            .smscs
            .iter()
            .map(|smsc| Smsc::new(&smsc.name, smsc.listen_addr()) as Arc<dyn Agent>)
            .collect(),
    }
}

/// Feed stdin lines through the command parser into the application.
async fn read_user_commands(command_tx: mpsc::Sender<smppth::UserCommand>) {
    let parser = TextCommandParser::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match parser.parse(line) {
                    Ok(command) => {
                        if command_tx.send(command).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(input = %line, error = %e, "invalid command"),
                }
            }
            Ok(None) => {
                debug!("stdin closed");
                return;
            }
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                return;
            }
        }
    }
}
