use async_trait::async_trait;
use kstrike_core::rbac::RiskLevel;
use kstrike_core::scan::{self, SaTokenScan};
use kstrike_core::token;

use super::{CmdResult, Command, CommandContext, CommandOutcome};
use crate::output::{permissions_summary, table};

pub struct ScanCmd;

#[async_trait]
impl Command for ScanCmd {
    fn name(&self) -> &'static str {
        "scan"
    }

    fn description(&self) -> &'static str {
        "Harvest SA tokens from all pods and classify their RBAC risk"
    }

    fn usage(&self) -> &'static str {
        "scan [options]

Reads the mounted ServiceAccount token out of every running pod, probes
what each token may do against the API server, and ranks the results.
Ctrl-C cancels; whatever finished is kept.

Options:
  --risky, -r     hide SAs with no risky permissions
  --perms, -p     show the allowed permission list
  --token, -t     show the harvested tokens

Examples:
  scan
  scan --risky
  scan --perms"
    }

    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> CmdResult {
        let p = &ctx.printer;
        let only_risky = args.iter().any(|a| a == "--risky" || a == "-r");
        let show_perms = args.iter().any(|a| a == "--perms" || a == "-p");
        let show_token = args.iter().any(|a| a == "--token" || a == "-t");

        p.info("Scanning ServiceAccount tokens...");
        p.info(&format!(
            "Checking permissions... ({} concurrent)",
            ctx.session.config().concurrency
        ));

        let cancel = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        let summary = scan::scan_service_accounts(&ctx.session, cancel).await?;

        if summary.cancelled {
            p.warn("Scan cancelled, partial results kept");
        }
        if summary.candidates == 0 {
            p.warn("No running pods with an SA token mount");
            return Ok(CommandOutcome::Continue);
        }

        // Per-task failures are non-fatal; surface them compactly.
        for failed in summary.results.iter().filter(|r| r.error.is_some()) {
            p.error(&format!(
                "{}/{}: {}",
                failed.namespace,
                failed.pod_name,
                failed.error.as_deref().unwrap_or("unknown error")
            ));
        }

        let display: Vec<&SaTokenScan> = summary
            .results
            .iter()
            .filter(|r| r.error.is_none())
            .filter(|r| !only_risky || r.is_cluster_admin || r.risk_level != RiskLevel::None)
            .collect();

        let mut headers = vec!["RISK", "NAMESPACE", "POD", "SERVICEACCOUNT", "TOKEN", "FLAGS"];
        if show_perms {
            headers.push("PERMISSIONS");
        }
        if show_token {
            headers.push("BEARER");
        }

        let rows: Vec<Vec<String>> = display.iter().map(|r| self.build_row(ctx, r, show_perms, show_token)).collect();

        p.blank();
        table::print(&headers, &rows);
        p.blank();

        let admin = summary.results.iter().filter(|r| r.is_cluster_admin).count();
        let critical = summary
            .results
            .iter()
            .filter(|r| !r.is_cluster_admin && r.risk_level == RiskLevel::Critical)
            .count();
        let high = summary
            .results
            .iter()
            .filter(|r| !r.is_cluster_admin && r.risk_level == RiskLevel::High)
            .count();

        let mut line = format!("Scan complete: {} SAs", summary.saved);
        if admin > 0 {
            line.push_str(&format!(", {} ADMIN", admin));
        }
        if critical > 0 {
            line.push_str(&format!(", {} CRITICAL", critical));
        }
        if high > 0 {
            line.push_str(&format!(", {} HIGH", high));
        }
        p.success(&line);
        p.success("Results cached in memory");

        Ok(CommandOutcome::Continue)
    }
}

impl ScanCmd {
    fn build_row(
        &self,
        ctx: &CommandContext,
        result: &SaTokenScan,
        show_perms: bool,
        show_token: bool,
    ) -> Vec<String> {
        let p = &ctx.printer;

        let mut flags = p.security_flag_labels(&result.security_flags);
        // RBAC that equals privilege gets the same flag as the real thing.
        if !result.security_flags.privileged && result.has_privilege_equivalent() {
            flags.push(p.flag_label("PRIV"));
        }

        let expired = result
            .token_info
            .as_ref()
            .map(|t| t.is_expired)
            .unwrap_or(false);

        let mut row = vec![
            p.risk_label(result.risk_level, result.is_cluster_admin),
            result.namespace.clone(),
            result.pod_name.clone(),
            result.service_account.clone(),
            p.token_status(expired),
            if flags.is_empty() { "-".into() } else { flags.join(",") },
        ];

        if show_perms {
            row.push(permissions_summary(&result.permissions, result.is_cluster_admin));
        }
        if show_token {
            row.push(token::truncate(&result.token, 32));
        }

        row
    }
}
