use async_trait::async_trait;
use kstrike_core::Error;

use super::{CmdResult, Command, CommandContext, CommandOutcome};

pub struct UseCmd;

#[async_trait]
impl Command for UseCmd {
    fn name(&self) -> &'static str {
        "use"
    }

    fn description(&self) -> &'static str {
        "Select a ServiceAccount to operate as"
    }

    fn usage(&self) -> &'static str {
        "use <namespace>/<name>

Select a harvested ServiceAccount. The prompt shows the selection and
'exec' defaults to one of its pods. Without arguments, lists what is
available."
    }

    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> CmdResult {
        let p = &ctx.printer;

        let Some(target) = args.first() else {
            return self.list_available(ctx);
        };

        let (namespace, name) = target
            .split_once('/')
            .ok_or_else(|| Error::Config("expected <namespace>/<name>".into()))?;

        let Some(record) = ctx.session.store().get_by_name(namespace, name) else {
            p.error(&format!("ServiceAccount not found: {}/{}", namespace, name));
            p.blank();
            return self.list_available(ctx);
        };

        p.info(&format!("Selected: {}", record.coordinate()));
        p.info(&format!(
            "Risk level: {}",
            p.risk_label(record.risk_level, record.is_cluster_admin)
        ));
        if !record.pods.is_empty() {
            let pods: Vec<String> = record
                .pods
                .iter()
                .map(|pod| format!("{}/{}", pod.namespace, pod.name))
                .collect();
            p.info(&format!("Pods: {}", pods.join(", ")));
        }
        ctx.session.set_current_sa(Some(record));

        Ok(CommandOutcome::Continue)
    }
}

impl UseCmd {
    fn list_available(&self, ctx: &CommandContext) -> CmdResult {
        let p = &ctx.printer;
        let records = ctx.session.store().get_all();
        if records.is_empty() {
            return Err(Error::Config(
                "no ServiceAccounts available, run 'scan' first".into(),
            ));
        }

        p.info("Available ServiceAccounts:");
        for r in &records {
            println!(
                "    {}  {}",
                r.coordinate(),
                p.risk_label(r.risk_level, r.is_cluster_admin)
            );
        }
        p.blank();
        p.info("Usage: use <namespace>/<name>");

        Ok(CommandOutcome::Continue)
    }
}
