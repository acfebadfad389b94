//! Risk classification of probed RBAC surfaces. Pure functions over the
//! allowed subset of permission checks; the tier tables live in `config`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{
    RiskRule, CRITICAL_PERMISSIONS, HIGH_PERMISSIONS, MEDIUM_PERMISSIONS,
    PRIVILEGE_EQUIVALENT_PERMISSIONS,
};
use crate::types::PermissionCheck;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Admin,
    Critical,
    High,
    Medium,
    Low,
    None,
}

impl RiskLevel {
    /// Sort rank: lower means more severe.
    pub fn order(self) -> u8 {
        match self {
            RiskLevel::Admin => 0,
            RiskLevel::Critical => 1,
            RiskLevel::High => 2,
            RiskLevel::Medium => 3,
            RiskLevel::Low => 4,
            RiskLevel::None => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Admin => "ADMIN",
            RiskLevel::Critical => "CRITICAL",
            RiskLevel::High => "HIGH",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::Low => "LOW",
            RiskLevel::None => "NONE",
        }
    }

    pub const ALL: [RiskLevel; 6] = [
        RiskLevel::Admin,
        RiskLevel::Critical,
        RiskLevel::High,
        RiskLevel::Medium,
        RiskLevel::Low,
        RiskLevel::None,
    ];
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn table_matches(table: &[RiskRule], resource_key: &str, verb: &str) -> bool {
    table.iter().any(|rule| {
        rule.resource == resource_key && rule.verbs.iter().any(|v| *v == "*" || *v == verb)
    })
}

/// `*` on both axes means the authorizer grants everything.
pub fn is_cluster_admin(permissions: &[PermissionCheck]) -> bool {
    permissions
        .iter()
        .any(|p| p.allowed && p.resource == "*" && p.verb == "*")
}

/// Walk the tiers top-down; the first table with a hit decides.
pub fn calculate_risk_level(permissions: &[PermissionCheck]) -> RiskLevel {
    if is_cluster_admin(permissions) {
        return RiskLevel::Admin;
    }

    let allowed: Vec<(&PermissionCheck, String)> = permissions
        .iter()
        .filter(|p| p.allowed)
        .map(|p| (p, p.resource_key()))
        .collect();

    for (p, key) in &allowed {
        // A wildcard resource grant is critical even without wildcard verbs.
        if table_matches(CRITICAL_PERMISSIONS, key, &p.verb) || p.resource == "*" {
            return RiskLevel::Critical;
        }
    }
    for (p, key) in &allowed {
        if table_matches(HIGH_PERMISSIONS, key, &p.verb) {
            return RiskLevel::High;
        }
    }
    for (p, key) in &allowed {
        if table_matches(MEDIUM_PERMISSIONS, key, &p.verb) {
            return RiskLevel::Medium;
        }
    }

    if allowed.is_empty() {
        RiskLevel::None
    } else {
        RiskLevel::Low
    }
}

/// Whether a single grant functionally equals container privilege.
pub fn is_privilege_equivalent(resource_key: &str, verb: &str) -> bool {
    table_matches(PRIVILEGE_EQUIVALENT_PERMISSIONS, resource_key, verb)
}

/// Whether any allowed probe crosses the privilege-equivalence line.
pub fn has_privilege_equivalent(permissions: &[PermissionCheck]) -> bool {
    permissions
        .iter()
        .any(|p| p.allowed && is_privilege_equivalent(&p.resource_key(), &p.verb))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(resource: &str, verb: &str, subresource: &str, allowed: bool) -> PermissionCheck {
        PermissionCheck {
            resource: resource.into(),
            verb: verb.into(),
            group: String::new(),
            subresource: subresource.into(),
            allowed,
        }
    }

    #[test]
    fn wildcard_grant_is_cluster_admin() {
        let perms = vec![check("*", "*", "", true)];
        assert!(is_cluster_admin(&perms));
        assert_eq!(calculate_risk_level(&perms), RiskLevel::Admin);
        assert!(has_privilege_equivalent(&perms));
    }

    #[test]
    fn nodes_proxy_get_is_critical_and_privilege_equivalent() {
        let perms = vec![
            check("nodes", "get", "proxy", true),
            check("pods", "list", "", false),
        ];
        assert!(!is_cluster_admin(&perms));
        assert_eq!(calculate_risk_level(&perms), RiskLevel::Critical);
        assert!(has_privilege_equivalent(&perms));
    }

    #[test]
    fn read_only_grants_are_low() {
        let perms = vec![
            check("pods", "list", "", true),
            check("services", "get", "", true),
        ];
        assert_eq!(calculate_risk_level(&perms), RiskLevel::Low);
        assert!(!has_privilege_equivalent(&perms));
    }

    #[test]
    fn nothing_allowed_is_none() {
        let perms = vec![
            check("pods", "list", "", false),
            check("secrets", "get", "", false),
        ];
        assert_eq!(calculate_risk_level(&perms), RiskLevel::None);
    }

    #[test]
    fn high_and_medium_tiers() {
        let perms = vec![check("pods", "get", "log", true)];
        assert_eq!(calculate_risk_level(&perms), RiskLevel::High);

        let perms = vec![check("services", "create", "", true)];
        assert_eq!(calculate_risk_level(&perms), RiskLevel::Medium);
    }

    #[test]
    fn wildcard_resource_without_wildcard_verb_is_critical() {
        let perms = vec![check("*", "list", "", true)];
        assert!(!is_cluster_admin(&perms));
        assert_eq!(calculate_risk_level(&perms), RiskLevel::Critical);
    }

    #[test]
    fn classifier_ignores_order() {
        let mut perms = vec![
            check("services", "create", "", true),
            check("secrets", "get", "", true),
            check("pods", "list", "", true),
        ];
        let forward = calculate_risk_level(&perms);
        perms.reverse();
        assert_eq!(forward, calculate_risk_level(&perms));
        assert_eq!(forward, RiskLevel::Critical);
    }

    #[test]
    fn risk_gains_with_more_evidence() {
        let base = vec![check("pods", "list", "", true)];
        let more = vec![
            check("pods", "list", "", true),
            check("secrets", "get", "", true),
        ];
        assert!(calculate_risk_level(&more).order() <= calculate_risk_level(&base).order());
    }

    #[test]
    fn rolebinding_create_is_privilege_equivalent() {
        assert!(is_privilege_equivalent("rolebindings", "create"));
        assert!(is_privilege_equivalent("clusterroles", "escalate"));
        assert!(!is_privilege_equivalent("pods", "list"));
    }

    #[test]
    fn serde_uses_uppercase_labels() {
        assert_eq!(serde_json::to_string(&RiskLevel::Critical).unwrap(), "\"CRITICAL\"");
        let back: RiskLevel = serde_json::from_str("\"NONE\"").unwrap();
        assert_eq!(back, RiskLevel::None);
    }
}
