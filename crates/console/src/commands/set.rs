use std::path::PathBuf;

use async_trait::async_trait;
use kstrike_core::{token, transport, Error};

use super::{CmdResult, Command, CommandContext, CommandOutcome};

pub struct SetCmd;

#[async_trait]
impl Command for SetCmd {
    fn name(&self) -> &'static str {
        "set"
    }

    fn description(&self) -> &'static str {
        "Change a session setting"
    }

    fn usage(&self) -> &'static str {
        "set <key> <value>

Keys:
  target, kubelet-ip    kubelet IP address
  port, kubelet-port    kubelet port (default: 10250)
  token                 bearer token
  token-file            path to a token file
  api-server            API server URL (for access reviews)
  proxy                 SOCKS5 proxy URL (socks5:// or socks5h://)
  concurrency           scan worker count (default: 3)

Examples:
  set target 10.0.0.1
  set token-file ./stolen.token
  set proxy socks5://127.0.0.1:1080"
    }

    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> CmdResult {
        let p = &ctx.printer;
        if args.len() < 2 {
            return Err(Error::Config("usage: set <key> <value>".into()));
        }

        let key = args[0].as_str();
        let value = args[1].as_str();

        match key {
            "target" | "kubelet-ip" => {
                ctx.session.update_config(|c| c.kubelet_ip = value.to_string());
                p.success(&format!("Target set to {}", value));
            }
            "port" | "kubelet-port" => {
                let port: u16 = value
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid port: {}", value)))?;
                ctx.session.update_config(|c| c.kubelet_port = port);
                p.success(&format!("Kubelet port set to {}", port));
            }
            "token" => {
                ctx.session.update_config(|c| c.token = value.to_string());
                p.success(&format!("Token set to {}", token::truncate(value, 20)));
            }
            "token-file" => {
                let path = PathBuf::from(value);
                let tok = token::read(Some(&path))?;
                ctx.session.update_config(|c| {
                    c.token = tok;
                    c.token_file = Some(path);
                });
                p.success(&format!("Token loaded from {}", value));
            }
            "api-server" => {
                ctx.session.update_config(|c| c.api_server = value.to_string());
                p.success(&format!("API server set to {}", value));
            }
            "proxy" => {
                transport::parse_proxy_url(value)?;
                ctx.session
                    .update_config(|c| c.proxy_url = Some(value.to_string()));
                p.success(&format!("Proxy set to {}", value));
            }
            "concurrency" => {
                let n: usize = value
                    .parse()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| Error::Config(format!("invalid concurrency: {}", value)))?;
                ctx.session.update_config(|c| c.concurrency = n);
                p.success(&format!("Scan concurrency set to {}", n));
            }
            other => {
                return Err(Error::Config(format!(
                    "unknown setting '{}' (see 'help set')",
                    other
                )));
            }
        }

        Ok(CommandOutcome::Continue)
    }
}
