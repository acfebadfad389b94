use async_trait::async_trait;

use super::{CmdResult, Command, CommandContext, CommandOutcome};

pub struct ConnectCmd;

#[async_trait]
impl Command for ConnectCmd {
    fn name(&self) -> &'static str {
        "connect"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["conn"]
    }

    fn description(&self) -> &'static str {
        "Connect to the configured kubelet"
    }

    fn usage(&self) -> &'static str {
        "connect

Connect to the kubelet using the current configuration.

Required settings:
  set target <ip>        kubelet IP
  set token <token>      bearer token (or: set token-file <path>)

Example:
  set target 10.0.0.1
  connect"
    }

    async fn execute(&self, ctx: &CommandContext, _args: &[String]) -> CmdResult {
        let p = &ctx.printer;
        let cfg = ctx.session.config();

        let kubelet = ctx.session.get_kubelet_client()?;
        p.info(&format!(
            "Connecting to kubelet {}:{}...",
            cfg.kubelet_ip, cfg.kubelet_port
        ));

        let validation = kubelet.validate_port().await?;
        ctx.session.set_connected(true);

        if validation.is_kubelet {
            p.success("Connected, target answers like a kubelet");
        } else {
            p.warn(&format!(
                "Connected, but the target does not look like a kubelet (HTTP {})",
                validation.status
            ));
        }

        Ok(CommandOutcome::Continue)
    }
}
