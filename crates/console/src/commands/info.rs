use async_trait::async_trait;
use kstrike_core::{runtime, token};

use super::{CmdResult, Command, CommandContext, CommandOutcome};

pub struct InfoCmd;

#[async_trait]
impl Command for InfoCmd {
    fn name(&self) -> &'static str {
        "info"
    }

    fn description(&self) -> &'static str {
        "Show the session state"
    }

    fn usage(&self) -> &'static str {
        "info

Current target, credentials, environment detection and cache sizes."
    }

    async fn execute(&self, ctx: &CommandContext, _args: &[String]) -> CmdResult {
        let p = &ctx.printer;
        let cfg = ctx.session.config();

        p.blank();
        let target = if cfg.kubelet_ip.is_empty() {
            "(not set)".to_string()
        } else {
            format!("{}:{}", cfg.kubelet_ip, cfg.kubelet_port)
        };
        p.info(&format!("Target:       {}", target));
        let tok = if cfg.token.is_empty() {
            "(not set)".to_string()
        } else {
            token::truncate(&cfg.token, 20)
        };
        p.info(&format!("Token:        {}", tok));
        p.info(&format!("API server:   {}", cfg.api_server));
        p.info(&format!(
            "Proxy:        {}",
            cfg.proxy_url.as_deref().unwrap_or("(none)")
        ));
        p.info(&format!("Concurrency:  {}", cfg.concurrency));
        p.info(&format!("Connected:    {}", ctx.session.is_connected()));

        if ctx.session.in_pod() {
            p.info(&format!(
                "Environment:  inside a pod (namespace: {})",
                runtime::pod_namespace()
            ));
        } else {
            p.info("Environment:  outside the cluster");
        }

        p.info(&format!(
            "Cached pods:  {}",
            ctx.session.cached_pods().len()
        ));
        p.info(&format!("SA records:   {}", ctx.session.store().count()));
        if let Some(sa) = ctx.session.current_sa() {
            p.info(&format!("Current SA:   {}", sa.coordinate()));
        }
        if let Some(at) = ctx.session.last_scan_at() {
            p.info(&format!(
                "Last scan:    {}",
                at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        p.blank();

        Ok(CommandOutcome::Continue)
    }
}
