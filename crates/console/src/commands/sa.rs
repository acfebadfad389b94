use async_trait::async_trait;
use kstrike_core::rbac::RiskLevel;
use kstrike_core::token;
use kstrike_core::types::ServiceAccountRecord;
use kstrike_core::Error;

use super::{CmdResult, Command, CommandContext, CommandOutcome};
use crate::output::{permissions_summary, table};

pub struct SaCmd;

#[derive(Default)]
struct SaArgs {
    only_admin: bool,
    only_risky: bool,
    namespace: Option<String>,
    show_perms: bool,
    show_token: bool,
}

#[async_trait]
impl Command for SaCmd {
    fn name(&self) -> &'static str {
        "sa"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["sas"]
    }

    fn description(&self) -> &'static str {
        "List harvested ServiceAccounts"
    }

    fn usage(&self) -> &'static str {
        "sa [list] [options]

List the ServiceAccount records collected by 'scan', ordered by risk.

Options:
  --admin, -a     only cluster-admin identities
  --risky, -r     only ADMIN/CRITICAL/HIGH/MEDIUM
  -n <namespace>  filter by namespace
  --perms, -p     show the allowed permission list
  --token, -t     show the harvested tokens

Examples:
  sa list
  sa list --admin
  sa list --risky
  sa list -n kube-system --perms"
    }

    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> CmdResult {
        let p = &ctx.printer;
        let parsed = parse_sa_args(args)?;

        let store = ctx.session.store();
        let mut records = if parsed.only_admin {
            store.get_cluster_admins()
        } else if parsed.only_risky {
            store.get_risky()
        } else if let Some(ns) = parsed.namespace.as_deref() {
            store.get_by_namespace(ns)
        } else {
            store.get_all()
        };

        // The remaining filters compose on top of the base query.
        if let Some(ns) = parsed.namespace.as_deref() {
            records.retain(|r| r.namespace == ns);
        }
        if parsed.only_risky {
            records.retain(|r| r.risk_level.order() <= RiskLevel::Medium.order());
        }

        if records.is_empty() {
            if store.count() == 0 {
                p.warn("No ServiceAccount records, run 'scan' first");
            } else {
                p.warn("No ServiceAccounts match the filters");
            }
            return Ok(CommandOutcome::Continue);
        }

        let mut headers = vec!["RISK", "NAMESPACE", "NAME", "TOKEN", "FLAGS", "PODS"];
        if parsed.show_perms {
            headers.push("PERMISSIONS");
        }
        if parsed.show_token {
            headers.push("BEARER");
        }

        let rows: Vec<Vec<String>> = records
            .iter()
            .map(|r| build_row(ctx, r, parsed.show_perms, parsed.show_token))
            .collect();

        p.blank();
        table::print(&headers, &rows);
        p.blank();
        p.info(&format!("{} ServiceAccounts", records.len()));
        p.info("Select one with 'use <namespace>/<name>'");

        Ok(CommandOutcome::Continue)
    }
}

fn build_row(
    ctx: &CommandContext,
    record: &ServiceAccountRecord,
    show_perms: bool,
    show_token: bool,
) -> Vec<String> {
    let p = &ctx.printer;
    let flags = p.security_flag_labels(&record.security_flags);

    let mut row = vec![
        p.risk_label(record.risk_level, record.is_cluster_admin),
        record.namespace.clone(),
        record.name.clone(),
        p.token_status(record.is_expired),
        if flags.is_empty() { "-".into() } else { flags.join(",") },
        record.pods.len().to_string(),
    ];

    if show_perms {
        row.push(permissions_summary(&record.permissions, record.is_cluster_admin));
    }
    if show_token {
        row.push(token::truncate(&record.token, 32));
    }

    row
}

fn parse_sa_args(args: &[String]) -> Result<SaArgs, Error> {
    let args: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| *a != "list" && *a != "ls")
        .collect();

    let mut parsed = SaArgs::default();
    let mut i = 0;
    while i < args.len() {
        match args[i] {
            "--admin" | "-a" => parsed.only_admin = true,
            "--risky" | "-r" => parsed.only_risky = true,
            "--perms" | "-p" => parsed.show_perms = true,
            "--token" | "-t" => parsed.show_token = true,
            "-n" => {
                i += 1;
                parsed.namespace = args.get(i).map(|s| s.to_string());
                if parsed.namespace.is_none() {
                    return Err(Error::Config("-n needs a namespace".into()));
                }
            }
            other => {
                return Err(Error::Config(format!(
                    "unknown sa option: {} (see 'help sa')",
                    other
                )));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn list_subcommand_word_is_optional() {
        assert!(!parse_sa_args(&strings(&["list"])).unwrap().only_admin);
        assert!(parse_sa_args(&strings(&["list", "--admin"])).unwrap().only_admin);
        assert!(parse_sa_args(&strings(&["-a"])).unwrap().only_admin);
    }

    #[test]
    fn parses_all_flags() {
        let parsed = parse_sa_args(&strings(&["-r", "-n", "kube-system", "-p", "-t"])).unwrap();
        assert!(parsed.only_risky);
        assert_eq!(parsed.namespace.as_deref(), Some("kube-system"));
        assert!(parsed.show_perms);
        assert!(parsed.show_token);
    }

    #[test]
    fn namespace_flag_needs_a_value() {
        assert!(parse_sa_args(&strings(&["-n"])).is_err());
    }

    #[test]
    fn rejects_unknown_options() {
        assert!(parse_sa_args(&strings(&["--bogus"])).is_err());
    }
}
