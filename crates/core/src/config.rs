//! Static configuration: connection defaults, the RBAC probe set and the
//! risk tables the classifier walks.

use std::time::Duration;

pub const DEFAULT_KUBELET_PORT: u16 = 10250;
pub const DEFAULT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
pub const DEFAULT_NAMESPACE_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";
pub const DEFAULT_K8S_API_SERVER: &str = "https://kubernetes.default.svc";

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_WEBSOCKET_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_SCAN_CONCURRENCY: usize = 3;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Linux routing table, used for node discovery from inside a pod.
pub const PROC_NET_ROUTE: &str = "/proc/net/route";

/// One (resource, verb, group, subresource) tuple submitted as a
/// SelfSubjectAccessReview during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSpec {
    pub resource: &'static str,
    pub verb: &'static str,
    pub group: &'static str,
    pub subresource: &'static str,
}

const fn probe(
    resource: &'static str,
    verb: &'static str,
    group: &'static str,
    subresource: &'static str,
) -> ProbeSpec {
    ProbeSpec { resource, verb, group, subresource }
}

/// The permissions checked for every harvested token. Curated so the
/// CRITICAL and HIGH rules below have matching evidence.
pub const PERMISSIONS_TO_CHECK: &[ProbeSpec] = &[
    // cluster-admin detector
    probe("*", "*", "", ""),
    // remote code execution surfaces
    probe("pods", "create", "", "exec"),
    probe("pods", "create", "", "attach"),
    probe("pods", "get", "", "log"),
    probe("nodes", "get", "", "proxy"),
    probe("nodes", "create", "", "proxy"),
    // workload control
    probe("pods", "get", "", ""),
    probe("pods", "list", "", ""),
    probe("pods", "create", "", ""),
    probe("pods", "delete", "", ""),
    probe("deployments", "create", "apps", ""),
    probe("daemonsets", "create", "apps", ""),
    probe("jobs", "create", "batch", ""),
    // credential access
    probe("secrets", "get", "", ""),
    probe("secrets", "list", "", ""),
    probe("secrets", "create", "", ""),
    probe("secrets", "delete", "", ""),
    probe("configmaps", "get", "", ""),
    probe("configmaps", "list", "", ""),
    probe("serviceaccounts", "create", "", "token"),
    // RBAC escalation
    probe("clusterroles", "get", "rbac.authorization.k8s.io", ""),
    probe("clusterroles", "list", "rbac.authorization.k8s.io", ""),
    probe("clusterroles", "create", "rbac.authorization.k8s.io", ""),
    probe("clusterroles", "bind", "rbac.authorization.k8s.io", ""),
    probe("clusterroles", "escalate", "rbac.authorization.k8s.io", ""),
    probe("clusterrolebindings", "create", "rbac.authorization.k8s.io", ""),
    probe("clusterrolebindings", "list", "rbac.authorization.k8s.io", ""),
    probe("roles", "create", "rbac.authorization.k8s.io", ""),
    probe("roles", "bind", "rbac.authorization.k8s.io", ""),
    probe("roles", "escalate", "rbac.authorization.k8s.io", ""),
    probe("rolebindings", "create", "rbac.authorization.k8s.io", ""),
    // recon
    probe("nodes", "list", "", ""),
];

/// Risk rule: resource key (with `/subresource` suffix when present) and
/// the verbs that trigger the tier. `*` matches any verb.
#[derive(Debug, Clone, Copy)]
pub struct RiskRule {
    pub resource: &'static str,
    pub verbs: &'static [&'static str],
}

const fn rule(resource: &'static str, verbs: &'static [&'static str]) -> RiskRule {
    RiskRule { resource, verbs }
}

pub const CRITICAL_PERMISSIONS: &[RiskRule] = &[
    rule("*", &["*"]),
    rule("secrets", &["get", "list", "watch", "create", "*"]),
    rule("pods", &["create", "*"]),
    rule("pods/exec", &["create", "*"]),
    rule("clusterroles", &["create", "update", "patch", "bind", "escalate", "*"]),
    rule("clusterrolebindings", &["create", "update", "patch", "*"]),
    rule("roles", &["create", "update", "patch", "bind", "escalate", "*"]),
    rule("rolebindings", &["create", "update", "patch", "*"]),
    rule("serviceaccounts", &["create", "impersonate", "*"]),
    rule("nodes", &["proxy", "*"]),
    rule("nodes/proxy", &["create", "get", "*"]),
];

pub const HIGH_PERMISSIONS: &[RiskRule] = &[
    rule("configmaps", &["get", "list", "create", "update", "*"]),
    rule("deployments", &["create", "update", "patch", "*"]),
    rule("daemonsets", &["create", "update", "patch", "*"]),
    rule("cronjobs", &["create", "update", "*"]),
    rule("jobs", &["create", "*"]),
    rule("pods/log", &["get", "*"]),
    rule("persistentvolumeclaims", &["create", "*"]),
    rule("persistentvolumes", &["create", "*"]),
    rule("serviceaccounts/token", &["create", "*"]),
];

pub const MEDIUM_PERMISSIONS: &[RiskRule] = &[
    rule("services", &["create", "update", "*"]),
    rule("endpoints", &["create", "update", "*"]),
    rule("ingresses", &["create", "update", "*"]),
    rule("networkpolicies", &["create", "update", "delete", "*"]),
];

/// Permissions that amount to container privilege even without the
/// privileged flag: each one is a path to arbitrary code execution or
/// identity forgery elsewhere in the cluster.
pub const PRIVILEGE_EQUIVALENT_PERMISSIONS: &[RiskRule] = &[
    rule("*", &["*"]),
    rule("nodes/proxy", &["get", "create", "*"]),
    rule("pods/exec", &["create", "*"]),
    rule("pods/attach", &["create", "*"]),
    rule("serviceaccounts/token", &["create", "*"]),
    rule("clusterroles", &["bind", "escalate"]),
    rule("roles", &["bind", "escalate"]),
    rule("clusterrolebindings", &["create", "update"]),
    rule("rolebindings", &["create", "update"]),
];

/// Mount-path keywords and prefixes flagged as sensitive (informational).
pub const SENSITIVE_PATHS: &[&str] = &[
    "secret",
    "token",
    "serviceaccount",
    "credential",
    "password",
    "key",
    "/etc/",
    "/var/run/",
    "/root",
    "/home",
    "/host",
    "/hostfs",
    "/proc",
    "/sys",
    "/var/lib/docker",
    "/var/lib/containerd",
    "/var/run/docker.sock",
    "/run/containerd",
];

/// Host paths whose mount enables escape or credential theft.
pub const DANGEROUS_HOST_PATHS: &[&str] = &[
    "/",
    "/etc",
    "/var/run/docker.sock",
    "/var/lib/kubelet",
    "/var/lib/docker",
    "/proc",
    "/sys",
    "/dev",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_set_carries_cluster_admin_detector() {
        assert!(PERMISSIONS_TO_CHECK
            .iter()
            .any(|p| p.resource == "*" && p.verb == "*"));
    }

    #[test]
    fn every_critical_probe_has_a_rule() {
        // The nodes/proxy probes must land in the CRITICAL table.
        let key = "nodes/proxy";
        assert!(CRITICAL_PERMISSIONS.iter().any(|r| r.resource == key));
    }
}
