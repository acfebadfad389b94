//! # kstrike
//!
//! Interactive console for auditing a kubelet's exposed API: pod
//! enumeration, SA token harvesting, RBAC risk ranking and exec access.

mod banner;
mod commands;
mod console;
mod output;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use log::debug;

use kstrike_core::config::{DEFAULT_KUBELET_PORT, DEFAULT_SCAN_CONCURRENCY};
use kstrike_core::session::{Session, SessionConfig};
use kstrike_core::{runtime, token};

use commands::{CommandContext, CommandOutcome};
use console::Executor;
use output::Printer;

#[derive(Parser, Debug)]
#[command(name = "kstrike")]
#[command(about = "Kubelet API attack-surface auditor", long_about = None)]
#[command(version)]
struct Cli {
    /// Kubelet IP (auto-discovered when running inside a pod)
    #[arg(long, short = 't')]
    target: Option<String>,

    /// Kubelet port
    #[arg(long, default_value_t = DEFAULT_KUBELET_PORT)]
    port: u16,

    /// Bearer token
    #[arg(long)]
    token: Option<String>,

    /// Path to a token file (defaults to the ambient SA mount in a pod)
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// API server URL used for access reviews
    #[arg(long)]
    api_server: Option<String>,

    /// SOCKS5 proxy (socks5:// or socks5h://)
    #[arg(long)]
    proxy: Option<String>,

    /// Scan worker count
    #[arg(long, default_value_t = DEFAULT_SCAN_CONCURRENCY)]
    concurrency: usize,

    #[arg(long)]
    no_banner: bool,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let printer = Printer::new();

    let mut config = SessionConfig {
        kubelet_port: cli.port,
        concurrency: cli.concurrency.max(1),
        ..SessionConfig::default()
    };
    if let Some(target) = cli.target {
        config.kubelet_ip = target;
    }
    if let Some(tok) = cli.token {
        config.token = tok;
    }
    if let Some(api_server) = cli.api_server {
        config.api_server = api_server;
    }
    if let Some(proxy) = cli.proxy {
        match kstrike_core::transport::parse_proxy_url(&proxy) {
            Ok(_) => config.proxy_url = Some(proxy),
            Err(e) => {
                printer.error(&e.to_string());
                std::process::exit(1);
            }
        }
    }
    if let Some(path) = &cli.token_file {
        match token::read(Some(path)) {
            Ok(tok) => {
                config.token = tok;
                config.token_file = Some(path.clone());
            }
            Err(e) => {
                printer.error(&e.to_string());
                std::process::exit(1);
            }
        }
    }

    if !cli.no_banner {
        banner::print(env!("CARGO_PKG_VERSION"));
    }

    // Inside a pod the ambient identity fills whatever the flags left out.
    if runtime::is_in_pod() {
        printer.info("Running inside a pod, loading ambient identity");

        if config.token.is_empty() {
            match token::read(None) {
                Ok(tok) => {
                    printer.success("ServiceAccount token loaded");
                    config.token = tok;
                }
                Err(e) => printer.warn(&e.to_string()),
            }
        }
        if let Some(api_server) = runtime::api_server_from_env() {
            config.api_server = api_server;
        }
        if config.kubelet_ip.is_empty() {
            match runtime::discover_node_ip() {
                Some(ip) => {
                    printer.success(&format!("Node discovered via default gateway: {}", ip));
                    config.kubelet_ip = ip;
                }
                None => printer.warn("Could not discover the node IP, use 'set target <ip>'"),
            }
        }
    }

    let session = Arc::new(Session::new(config));
    let executor = Executor::new(
        CommandContext {
            session: session.clone(),
            printer: printer.clone(),
        },
        commands::default_commands(),
    );

    repl(&executor, &session).await;

    printer.info("Clearing memory...");
    session.close();
    reset_terminal();
}

async fn repl(executor: &Executor, session: &Arc<Session>) {
    loop {
        print!("{}", prompt(session));
        let _ = std::io::stdout().flush();

        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|n| (n, line))
        })
        .await;

        let line = match line {
            Ok(Ok((0, _))) => break, // EOF
            Ok(Ok((_, line))) => line,
            _ => break,
        };

        if executor.execute(&line).await == CommandOutcome::Exit {
            break;
        }
    }
}

fn prompt(session: &Arc<Session>) -> String {
    match session.current_sa() {
        Some(sa) => format!(
            "{} ({}) > ",
            "kstrike".red().bold(),
            sa.coordinate().yellow()
        ),
        None => format!("{} > ", "kstrike".red().bold()),
    }
}

/// Interactive exec can die mid-raw-mode; put the terminal back together
/// no matter what.
fn reset_terminal() {
    debug!("resetting terminal");
    #[cfg(unix)]
    {
        let _ = std::process::Command::new("stty").arg("sane").status();
    }
}
