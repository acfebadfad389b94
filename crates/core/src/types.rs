//! Shared record types for scan results and the repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pod::SecurityFlags;
use crate::rbac::RiskLevel;

/// Outcome of one SelfSubjectAccessReview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCheck {
    pub resource: String,
    pub verb: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subresource: String,
    pub allowed: bool,
}

impl PermissionCheck {
    /// `resource` or `resource/subresource`, the key the risk tables use.
    pub fn resource_key(&self) -> String {
        if self.subresource.is_empty() {
            self.resource.clone()
        } else {
            format!("{}/{}", self.resource, self.subresource)
        }
    }
}

/// Pod that carried a harvested token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaPodRef {
    pub namespace: String,
    pub name: String,
    pub container: String,
}

/// One ServiceAccount identity, keyed by (namespace, name). Evidence from
/// every pod that mounts the same SA is merged into a single record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountRecord {
    pub name: String,
    pub namespace: String,
    pub token: String,
    pub token_expiration: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub risk_level: RiskLevel,
    /// The allowed subset of the probe set.
    pub permissions: Vec<PermissionCheck>,
    pub is_cluster_admin: bool,
    pub security_flags: SecurityFlags,
    pub pods: Vec<SaPodRef>,
    pub collected_at: DateTime<Utc>,
    pub kubelet_ip: String,
}

impl ServiceAccountRecord {
    pub fn key(&self) -> (String, String) {
        (self.namespace.clone(), self.name.clone())
    }

    pub fn coordinate(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}
