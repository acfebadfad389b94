use async_trait::async_trait;
use kstrike_core::Error;

use super::{CmdResult, Command, CommandContext, CommandOutcome};
use crate::output::table;

pub struct ShowCmd;

#[async_trait]
impl Command for ShowCmd {
    fn name(&self) -> &'static str {
        "show"
    }

    fn description(&self) -> &'static str {
        "Show cached pods, SA records or scan statistics"
    }

    fn usage(&self) -> &'static str {
        "show <pods|sa|stats>

Reads from the session caches; nothing touches the network.

  show pods    cached pod enumeration (from 'pods' or 'scan')
  show sa      harvested ServiceAccounts, ordered by risk
  show stats   record counts per risk tier"
    }

    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> CmdResult {
        let p = &ctx.printer;

        match args.first().map(String::as_str) {
            Some("pods") => {
                let pods = ctx.session.cached_pods();
                if pods.is_empty() {
                    p.warn("Pod cache is empty, run 'pods' first");
                    return Ok(CommandOutcome::Continue);
                }
                let rows: Vec<Vec<String>> = pods
                    .iter()
                    .map(|pod| {
                        let flags = pod.risk_flags().join(",");
                        vec![
                            pod.namespace.clone(),
                            pod.name.clone(),
                            pod.phase.clone(),
                            pod.service_account.clone(),
                            pod.node_name.clone(),
                            if flags.is_empty() { "-".into() } else { flags },
                        ]
                    })
                    .collect();
                p.blank();
                table::print(
                    &["NAMESPACE", "NAME", "PHASE", "SERVICEACCOUNT", "NODE", "FLAGS"],
                    &rows,
                );
                p.blank();
            }
            Some("sa") => {
                let records = ctx.session.store().get_all();
                if records.is_empty() {
                    p.warn("No ServiceAccount records, run 'scan' first");
                    return Ok(CommandOutcome::Continue);
                }
                let rows: Vec<Vec<String>> = records
                    .iter()
                    .map(|r| {
                        let flags = p.security_flag_labels(&r.security_flags);
                        vec![
                            p.risk_label(r.risk_level, r.is_cluster_admin),
                            r.coordinate(),
                            if flags.is_empty() { "-".into() } else { flags.join(",") },
                            r.kubelet_ip.clone(),
                            r.collected_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        ]
                    })
                    .collect();
                p.blank();
                table::print(
                    &["RISK", "SERVICEACCOUNT", "FLAGS", "KUBELET", "COLLECTED"],
                    &rows,
                );
                p.blank();
            }
            Some("stats") => {
                let stats = ctx.session.store().get_stats();
                p.blank();
                let rows: Vec<Vec<String>> = kstrike_core::rbac::RiskLevel::ALL
                    .iter()
                    .map(|level| {
                        vec![
                            p.risk_label(*level, false),
                            stats.get(level.as_str()).copied().unwrap_or(0).to_string(),
                        ]
                    })
                    .collect();
                table::print(&["TIER", "COUNT"], &rows);
                p.blank();
                p.info(&format!("Total records: {}", ctx.session.store().count()));
            }
            _ => return Err(Error::Config("usage: show <pods|sa|stats>".into())),
        }

        Ok(CommandOutcome::Continue)
    }
}
