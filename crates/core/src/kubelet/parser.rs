//! Typed model of the kubelet `/pods` snapshot and its projection into
//! `PodRecord`s. Only security-relevant shapes survive the projection.

use std::collections::HashMap;

use chrono::Utc;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::pod::{ContainerInfo, MountInfo, PodRecord, SensitiveVolume, VolumeSource};

#[derive(Debug, Default, Deserialize)]
pub struct KubeletPodList {
    #[serde(default)]
    pub items: Vec<KubeletPod>,
}

#[derive(Debug, Default, Deserialize)]
pub struct KubeletPod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub uid: String,
    pub creation_timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub service_account_name: String,
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
    pub security_context: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PodStatus {
    #[serde(default)]
    pub phase: String,
    #[serde(rename = "podIP", default)]
    pub pod_ip: String,
    #[serde(rename = "hostIP", default)]
    pub host_ip: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub volume_mounts: Vec<VolumeMountSpec>,
    pub security_context: Option<ContainerSecurityContext>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMountSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mount_path: String,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSecurityContext {
    pub privileged: Option<bool>,
    pub allow_privilege_escalation: Option<bool>,
    pub read_only_root_filesystem: Option<bool>,
    pub run_as_user: Option<i64>,
    pub run_as_group: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    #[serde(default)]
    pub name: String,
    pub secret: Option<SecretVolumeSource>,
    pub host_path: Option<HostPathVolumeSource>,
    pub projected: Option<ProjectedVolumeSource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretVolumeSource {
    #[serde(default)]
    pub secret_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct HostPathVolumeSource {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectedVolumeSource {
    #[serde(default)]
    pub sources: Vec<ProjectedSource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedSource {
    pub service_account_token: Option<serde_json::Value>,
    pub secret: Option<ProjectedSecretSource>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectedSecretSource {
    #[serde(rename = "secretName", alias = "name", default)]
    pub secret_name: String,
}

/// Decode a raw `/pods` snapshot and project every item.
pub fn extract_pod_records(raw: &[u8], kubelet_ip: &str) -> Result<Vec<PodRecord>> {
    let list: KubeletPodList = serde_json::from_slice(raw)
        .map_err(|e| Error::Protocol(format!("kubelet pod list: {}", e)))?;

    let now = Utc::now();
    let records = list
        .items
        .into_iter()
        .map(|item| {
            let containers = extract_containers(&item.spec.containers);
            let sensitive_volumes =
                extract_sensitive_volumes(&item.spec.volumes, &item.spec.containers);

            PodRecord {
                name: item.metadata.name,
                namespace: item.metadata.namespace,
                uid: item.metadata.uid,
                node_name: item.spec.node_name,
                pod_ip: item.status.pod_ip,
                host_ip: item.status.host_ip,
                phase: item.status.phase,
                service_account: item.spec.service_account_name,
                creation_timestamp: item.metadata.creation_timestamp,
                containers,
                sensitive_volumes,
                security_context: item.spec.security_context,
                collected_at: now,
                kubelet_ip: kubelet_ip.to_string(),
            }
        })
        .collect();

    Ok(records)
}

fn extract_containers(containers: &[ContainerSpec]) -> Vec<ContainerInfo> {
    containers
        .iter()
        .map(|c| {
            let sc = c.security_context.as_ref();
            ContainerInfo {
                name: c.name.clone(),
                image: c.image.clone(),
                privileged: sc.and_then(|s| s.privileged).unwrap_or(false),
                allow_privilege_escalation: sc
                    .and_then(|s| s.allow_privilege_escalation)
                    .unwrap_or(false),
                read_only_root_filesystem: sc
                    .and_then(|s| s.read_only_root_filesystem)
                    .unwrap_or(false),
                run_as_user: sc.and_then(|s| s.run_as_user),
                run_as_group: sc.and_then(|s| s.run_as_group),
                volume_mounts: c
                    .volume_mounts
                    .iter()
                    .map(|m| MountInfo {
                        name: m.name.clone(),
                        mount_path: m.mount_path.clone(),
                        read_only: m.read_only,
                    })
                    .collect(),
            }
        })
        .collect()
}

fn extract_sensitive_volumes(
    volumes: &[VolumeSpec],
    containers: &[ContainerSpec],
) -> Vec<SensitiveVolume> {
    // Volume name -> mount path, joined from every container.
    let mut mount_paths: HashMap<&str, &str> = HashMap::new();
    for c in containers {
        for m in &c.volume_mounts {
            mount_paths.insert(m.name.as_str(), m.mount_path.as_str());
        }
    }

    volumes
        .iter()
        .filter_map(|v| {
            let source = if let Some(secret) = &v.secret {
                VolumeSource::Secret {
                    secret_name: secret.secret_name.clone(),
                }
            } else if let Some(host_path) = &v.host_path {
                VolumeSource::HostPath {
                    path: host_path.path.clone(),
                }
            } else if let Some(projected) = &v.projected {
                classify_projected(projected)?
            } else {
                return None;
            };

            Some(SensitiveVolume {
                name: v.name.clone(),
                mount_path: mount_paths.get(v.name.as_str()).map(|p| p.to_string()),
                source,
            })
        })
        .collect()
}

/// First recognizable source wins, token sources before secrets.
fn classify_projected(projected: &ProjectedVolumeSource) -> Option<VolumeSource> {
    for src in &projected.sources {
        if src.service_account_token.is_some() {
            return Some(VolumeSource::ProjectedSaToken);
        }
        if let Some(secret) = &src.secret {
            return Some(VolumeSource::ProjectedSecret {
                secret_name: secret.secret_name.clone(),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "kind": "PodList",
        "apiVersion": "v1",
        "items": [
            {
                "metadata": {
                    "name": "web-7d4b9c",
                    "namespace": "default",
                    "uid": "11111111-2222",
                    "creationTimestamp": "2026-01-12T09:30:00Z"
                },
                "spec": {
                    "nodeName": "worker-1",
                    "serviceAccountName": "web-sa",
                    "containers": [
                        {
                            "name": "app",
                            "image": "nginx:1.27",
                            "volumeMounts": [
                                {"name": "kube-api-access-x9f", "mountPath": "/var/run/secrets/kubernetes.io/serviceaccount", "readOnly": true},
                                {"name": "tls", "mountPath": "/etc/tls"},
                                {"name": "host-root", "mountPath": "/hostfs"}
                            ],
                            "securityContext": {"privileged": true, "runAsUser": 0}
                        }
                    ],
                    "volumes": [
                        {"name": "kube-api-access-x9f", "projected": {"sources": [{"serviceAccountToken": {"path": "token"}}, {"configMap": {"name": "kube-root-ca.crt"}}]}},
                        {"name": "tls", "secret": {"secretName": "web-tls"}},
                        {"name": "host-root", "hostPath": {"path": "/"}},
                        {"name": "scratch", "emptyDir": {}}
                    ]
                },
                "status": {"phase": "Running", "podIP": "10.42.0.17", "hostIP": "192.168.1.20"}
            }
        ]
    }"#;

    #[test]
    fn projects_snapshot_into_records() {
        let records = extract_pod_records(SNAPSHOT.as_bytes(), "192.168.1.20").unwrap();
        assert_eq!(records.len(), 1);

        let rec = &records[0];
        assert_eq!(rec.name, "web-7d4b9c");
        assert_eq!(rec.service_account, "web-sa");
        assert_eq!(rec.node_name, "worker-1");
        assert_eq!(rec.pod_ip, "10.42.0.17");
        assert_eq!(rec.host_ip, "192.168.1.20");
        assert!(rec.is_running());

        assert_eq!(rec.containers.len(), 1);
        let app = &rec.containers[0];
        assert!(app.privileged);
        assert!(app.run_as_root());
        assert_eq!(app.volume_mounts.len(), 3);

        // emptyDir is dropped; the three sensitive shapes survive.
        assert_eq!(rec.sensitive_volumes.len(), 3);
    }

    #[test]
    fn mounted_sensitive_volumes_resolve_their_paths() {
        let records = extract_pod_records(SNAPSHOT.as_bytes(), "192.168.1.20").unwrap();
        let rec = &records[0];

        // Every container mount whose volume is sensitive must appear in
        // the record with the same path.
        for c in &rec.containers {
            for m in &c.volume_mounts {
                if let Some(v) = rec.sensitive_volumes.iter().find(|v| v.name == m.name) {
                    assert_eq!(v.mount_path.as_deref(), Some(m.mount_path.as_str()));
                }
            }
        }

        let token_vol = rec
            .sensitive_volumes
            .iter()
            .find(|v| v.source == VolumeSource::ProjectedSaToken)
            .unwrap();
        assert_eq!(
            token_vol.mount_path.as_deref(),
            Some("/var/run/secrets/kubernetes.io/serviceaccount")
        );
    }

    #[test]
    fn flags_come_out_of_the_typed_projection() {
        let records = extract_pod_records(SNAPSHOT.as_bytes(), "192.168.1.20").unwrap();
        let flags = records[0].security_flags();
        assert!(flags.privileged);
        assert!(flags.has_host_path);
        assert!(flags.has_secret_mount);
        assert!(flags.has_sa_token_mount);
    }

    #[test]
    fn projected_secret_sources_are_tagged() {
        let raw = r#"{"items":[{
            "metadata": {"name": "p", "namespace": "ns", "uid": "u"},
            "spec": {
                "containers": [{"name": "c", "image": "i", "volumeMounts": [{"name": "v", "mountPath": "/creds"}]}],
                "volumes": [{"name": "v", "projected": {"sources": [{"secret": {"name": "api-key"}}]}}]
            },
            "status": {"phase": "Running"}
        }]}"#;

        let records = extract_pod_records(raw.as_bytes(), "1.2.3.4").unwrap();
        assert_eq!(
            records[0].sensitive_volumes[0].source,
            VolumeSource::ProjectedSecret { secret_name: "api-key".into() }
        );
    }

    #[test]
    fn malformed_snapshot_is_a_protocol_error() {
        assert!(matches!(
            extract_pod_records(b"<html>nope</html>", "1.2.3.4"),
            Err(Error::Protocol(_))
        ));
    }
}
