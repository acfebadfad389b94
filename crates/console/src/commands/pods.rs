use async_trait::async_trait;

use super::{CmdResult, Command, CommandContext, CommandOutcome};
use crate::output::table;

pub struct PodsCmd;

#[async_trait]
impl Command for PodsCmd {
    fn name(&self) -> &'static str {
        "pods"
    }

    fn description(&self) -> &'static str {
        "Enumerate pods through the kubelet"
    }

    fn usage(&self) -> &'static str {
        "pods [--risky|-r]

Enumerate all pods on the node via GET /pods and cache them for the
session. --risky shows only pods with security flags."
    }

    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> CmdResult {
        let p = &ctx.printer;
        let only_risky = args.iter().any(|a| a == "--risky" || a == "-r");

        let kubelet = ctx.session.get_kubelet_client()?;
        p.info("Fetching pods from kubelet...");
        let pods = kubelet.get_pod_records().await?;
        ctx.session.cache_pods(pods.clone());

        let shown: Vec<_> = pods
            .iter()
            .filter(|pod| !only_risky || pod.is_risky())
            .collect();

        let rows: Vec<Vec<String>> = shown
            .iter()
            .map(|pod| {
                let flags = pod
                    .risk_flags()
                    .iter()
                    .map(|f| p.flag_label(f))
                    .collect::<Vec<_>>()
                    .join(",");
                vec![
                    pod.namespace.clone(),
                    pod.name.clone(),
                    pod.phase.clone(),
                    pod.service_account.clone(),
                    pod.pod_ip.clone(),
                    if flags.is_empty() { "-".into() } else { flags },
                ]
            })
            .collect();

        p.blank();
        table::print(
            &["NAMESPACE", "NAME", "PHASE", "SERVICEACCOUNT", "POD IP", "FLAGS"],
            &rows,
        );
        p.blank();
        p.success(&format!(
            "{} pods ({} shown), cached for this session",
            pods.len(),
            shown.len()
        ));

        Ok(CommandOutcome::Continue)
    }
}
