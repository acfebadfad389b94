//! Security-relevant projection of a kubelet pod snapshot. All predicates
//! read typed fields; nothing greps serialized JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{DANGEROUS_HOST_PATHS, SENSITIVE_PATHS};

/// One pod as harvested from `GET /pods`, reduced to what matters for an
/// attacker: placement, identity, containers and sensitive mounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodRecord {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub node_name: String,
    pub pod_ip: String,
    pub host_ip: String,
    pub phase: String,
    pub service_account: String,
    pub creation_timestamp: Option<String>,
    pub containers: Vec<ContainerInfo>,
    pub sensitive_volumes: Vec<SensitiveVolume>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_context: Option<serde_json::Value>,
    pub collected_at: DateTime<Utc>,
    pub kubelet_ip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub name: String,
    pub image: String,
    pub privileged: bool,
    pub allow_privilege_escalation: bool,
    pub read_only_root_filesystem: bool,
    pub run_as_user: Option<i64>,
    pub run_as_group: Option<i64>,
    pub volume_mounts: Vec<MountInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountInfo {
    pub name: String,
    pub mount_path: String,
    pub read_only: bool,
}

/// Volume shapes worth harvesting. Everything else in the pod spec is
/// dropped at extraction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VolumeSource {
    #[serde(rename = "secret")]
    Secret { secret_name: String },
    #[serde(rename = "hostPath")]
    HostPath { path: String },
    #[serde(rename = "projected-sa-token")]
    ProjectedSaToken,
    #[serde(rename = "projected-secret")]
    ProjectedSecret { secret_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitiveVolume {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
    #[serde(flatten)]
    pub source: VolumeSource,
}

/// Pod-level risk bits, a pure function of the record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityFlags {
    pub privileged: bool,
    pub allow_privilege_escalation: bool,
    pub has_host_path: bool,
    pub has_secret_mount: bool,
    pub has_sa_token_mount: bool,
}

impl SecurityFlags {
    /// Merge evidence from another pod carrying the same identity.
    pub fn union(self, other: SecurityFlags) -> SecurityFlags {
        SecurityFlags {
            privileged: self.privileged || other.privileged,
            allow_privilege_escalation: self.allow_privilege_escalation
                || other.allow_privilege_escalation,
            has_host_path: self.has_host_path || other.has_host_path,
            has_secret_mount: self.has_secret_mount || other.has_secret_mount,
            has_sa_token_mount: self.has_sa_token_mount || other.has_sa_token_mount,
        }
    }
}

impl ContainerInfo {
    pub fn run_as_root(&self) -> bool {
        self.run_as_user == Some(0)
    }

    pub fn sensitive_mounts(&self) -> Vec<&str> {
        self.volume_mounts
            .iter()
            .filter(|m| is_sensitive_path(&m.mount_path))
            .map(|m| m.mount_path.as_str())
            .collect()
    }
}

impl PodRecord {
    pub fn is_running(&self) -> bool {
        self.phase == "Running"
    }

    pub fn coordinate(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn security_flags(&self) -> SecurityFlags {
        let mut flags = SecurityFlags::default();

        for c in &self.containers {
            flags.privileged |= c.privileged;
            flags.allow_privilege_escalation |= c.allow_privilege_escalation;
        }

        for v in &self.sensitive_volumes {
            match &v.source {
                VolumeSource::HostPath { .. } => flags.has_host_path = true,
                VolumeSource::Secret { .. } | VolumeSource::ProjectedSecret { .. } => {
                    flags.has_secret_mount = true;
                    // Legacy token secrets mount under .../serviceaccount.
                    if v.mount_path
                        .as_deref()
                        .is_some_and(|p| p.to_lowercase().contains("serviceaccount"))
                    {
                        flags.has_sa_token_mount = true;
                    }
                }
                VolumeSource::ProjectedSaToken => flags.has_sa_token_mount = true,
            }
        }

        flags
    }

    pub fn has_run_as_root(&self) -> bool {
        self.containers.iter().any(ContainerInfo::run_as_root)
    }

    /// Short flag labels for table rows.
    pub fn risk_flags(&self) -> Vec<&'static str> {
        let flags = self.security_flags();
        let mut out = Vec::new();
        if flags.privileged {
            out.push("PRIV");
        }
        if flags.allow_privilege_escalation {
            out.push("PE");
        }
        if flags.has_host_path {
            out.push("HP");
        }
        if flags.has_secret_mount {
            out.push("SEC");
        }
        if self.has_run_as_root() {
            out.push("ROOT");
        }
        out
    }

    pub fn is_risky(&self) -> bool {
        !self.risk_flags().is_empty()
    }
}

pub fn is_sensitive_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    SENSITIVE_PATHS.iter().any(|s| lower.contains(s))
}

/// Host paths whose mount means escape, exactly or by prefix.
pub fn is_dangerous_host_path(path: &str) -> bool {
    DANGEROUS_HOST_PATHS
        .iter()
        .any(|d| path == *d || path.starts_with(&format!("{}/", d)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(name: &str, mounts: Vec<MountInfo>) -> ContainerInfo {
        ContainerInfo {
            name: name.into(),
            image: "busybox:1.36".into(),
            privileged: false,
            allow_privilege_escalation: false,
            read_only_root_filesystem: false,
            run_as_user: None,
            run_as_group: None,
            volume_mounts: mounts,
        }
    }

    fn record(containers: Vec<ContainerInfo>, volumes: Vec<SensitiveVolume>) -> PodRecord {
        PodRecord {
            name: "web-0".into(),
            namespace: "default".into(),
            uid: "u-1".into(),
            node_name: "node-a".into(),
            pod_ip: "10.0.0.5".into(),
            host_ip: "192.168.1.10".into(),
            phase: "Running".into(),
            service_account: "default".into(),
            creation_timestamp: None,
            containers,
            sensitive_volumes: volumes,
            security_context: None,
            collected_at: Utc::now(),
            kubelet_ip: "192.168.1.10".into(),
        }
    }

    #[test]
    fn flags_derive_from_typed_volumes() {
        let rec = record(
            vec![container("app", vec![])],
            vec![
                SensitiveVolume {
                    name: "creds".into(),
                    mount_path: Some("/etc/creds".into()),
                    source: VolumeSource::Secret { secret_name: "db-pass".into() },
                },
                SensitiveVolume {
                    name: "kube-api-access".into(),
                    mount_path: Some(
                        "/var/run/secrets/kubernetes.io/serviceaccount".into(),
                    ),
                    source: VolumeSource::ProjectedSaToken,
                },
            ],
        );

        let flags = rec.security_flags();
        assert!(flags.has_secret_mount);
        assert!(flags.has_sa_token_mount);
        assert!(!flags.has_host_path);
        assert!(!flags.privileged);
    }

    #[test]
    fn legacy_secret_token_counts_as_sa_mount() {
        let rec = record(
            vec![container("app", vec![])],
            vec![SensitiveVolume {
                name: "default-token-x7k2p".into(),
                mount_path: Some("/var/run/secrets/kubernetes.io/serviceaccount".into()),
                source: VolumeSource::Secret { secret_name: "default-token-x7k2p".into() },
            }],
        );

        assert!(rec.security_flags().has_sa_token_mount);
    }

    #[test]
    fn run_as_root_flag() {
        let mut c = container("app", vec![]);
        c.run_as_user = Some(0);
        let rec = record(vec![c], vec![]);
        assert!(rec.risk_flags().contains(&"ROOT"));
    }

    #[test]
    fn sensitive_path_vocabulary() {
        assert!(is_sensitive_path("/var/run/secrets/kubernetes.io/serviceaccount"));
        assert!(is_sensitive_path("/host/etc"));
        assert!(is_sensitive_path("/App/Credentials"));
        assert!(!is_sensitive_path("/data/cache"));
    }

    #[test]
    fn dangerous_host_paths_match_exact_and_prefix() {
        assert!(is_dangerous_host_path("/"));
        assert!(is_dangerous_host_path("/var/lib/kubelet"));
        assert!(is_dangerous_host_path("/proc/sys/kernel"));
        assert!(!is_dangerous_host_path("/opt/data"));
    }

    #[test]
    fn volume_source_serializes_with_tagged_type() {
        let v = SensitiveVolume {
            name: "host-root".into(),
            mount_path: Some("/hostfs".into()),
            source: VolumeSource::HostPath { path: "/".into() },
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["type"], "hostPath");
        assert_eq!(json["path"], "/");
    }
}
