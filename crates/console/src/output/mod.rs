//! Operator-facing output: tagged lines, risk coloring, tables.

pub mod table;

use colored::Colorize;
use kstrike_core::pod::SecurityFlags;
use kstrike_core::rbac::RiskLevel;
use kstrike_core::types::PermissionCheck;

#[derive(Debug, Clone, Default)]
pub struct Printer;

impl Printer {
    pub fn new() -> Self {
        Printer
    }

    pub fn info(&self, msg: &str) {
        println!("{} {}", "[*]".blue(), msg);
    }

    pub fn success(&self, msg: &str) {
        println!("{} {}", "[+]".green(), msg);
    }

    pub fn warn(&self, msg: &str) {
        println!("{} {}", "[!]".yellow(), msg);
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{} {}", "[-]".red(), msg);
    }

    pub fn blank(&self) {
        println!();
    }

    pub fn risk_label(&self, level: RiskLevel, is_cluster_admin: bool) -> String {
        if is_cluster_admin {
            return "ADMIN".red().bold().to_string();
        }
        match level {
            RiskLevel::Admin => "ADMIN".red().bold().to_string(),
            RiskLevel::Critical => "CRITICAL".red().to_string(),
            RiskLevel::High => "HIGH".yellow().to_string(),
            RiskLevel::Medium => "MEDIUM".cyan().to_string(),
            RiskLevel::Low => "LOW".green().to_string(),
            RiskLevel::None => "NONE".dimmed().to_string(),
        }
    }

    pub fn flag_label(&self, flag: &str) -> String {
        match flag {
            "PRIV" | "HP" => flag.red().to_string(),
            "PE" | "SEC" | "ROOT" => flag.yellow().to_string(),
            _ => flag.to_string(),
        }
    }

    pub fn token_status(&self, is_expired: bool) -> String {
        if is_expired {
            "expired".red().to_string()
        } else {
            "valid".green().to_string()
        }
    }

    pub fn security_flag_labels(&self, flags: &SecurityFlags) -> Vec<String> {
        let mut out = Vec::new();
        if flags.privileged {
            out.push(self.flag_label("PRIV"));
        }
        if flags.allow_privilege_escalation {
            out.push(self.flag_label("PE"));
        }
        if flags.has_host_path {
            out.push(self.flag_label("HP"));
        }
        if flags.has_secret_mount {
            out.push(self.flag_label("SEC"));
        }
        out
    }
}

/// Compressed permission column for scan and sa tables.
pub fn permissions_summary(permissions: &[PermissionCheck], is_cluster_admin: bool) -> String {
    if is_cluster_admin {
        return "*/* (cluster-admin)".to_string();
    }

    let perms: Vec<String> = permissions
        .iter()
        .filter(|p| p.allowed)
        .map(|p| format!("{}:{}", p.resource_key(), p.verb))
        .collect();

    if perms.is_empty() {
        return "-".to_string();
    }

    let joined = perms.join(" ");
    if joined.len() > 64 {
        format!("{}... ({} total)", &joined[..60], perms.len())
    } else {
        joined
    }
}
