//! Scan orchestration: bounded fan-out over candidate pods, harvesting
//! each mounted SA token, probing its RBAC surface and classifying risk.
//! The only concurrent zone in the crate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::DEFAULT_TOKEN_PATH;
use crate::error::Result;
use crate::kubelet::{ExecOptions, KubeletClient};
use crate::pod::{PodRecord, SecurityFlags};
use crate::rbac::{self, RiskLevel};
use crate::session::Session;
use crate::token::{self, TokenInfo};
use crate::types::{PermissionCheck, SaPodRef, ServiceAccountRecord};

/// One per-pod harvest attempt. A populated `error` means the task failed
/// and contributes no SA record.
#[derive(Debug, Clone)]
pub struct SaTokenScan {
    pub namespace: String,
    pub pod_name: String,
    pub container: String,
    pub service_account: String,
    pub token: String,
    pub token_info: Option<TokenInfo>,
    pub permissions: Vec<PermissionCheck>,
    pub security_flags: SecurityFlags,
    pub risk_level: RiskLevel,
    pub is_cluster_admin: bool,
    pub error: Option<String>,
}

impl SaTokenScan {
    fn for_pod(pod: &PodRecord) -> Self {
        SaTokenScan {
            namespace: pod.namespace.clone(),
            pod_name: pod.name.clone(),
            container: String::new(),
            service_account: String::new(),
            token: String::new(),
            token_info: None,
            permissions: Vec::new(),
            security_flags: pod.security_flags(),
            risk_level: RiskLevel::None,
            is_cluster_admin: false,
            error: None,
        }
    }

    fn failed(pod: &PodRecord, message: String) -> Self {
        let mut scan = SaTokenScan::for_pod(pod);
        scan.error = Some(message);
        scan
    }

    pub fn has_privilege_equivalent(&self) -> bool {
        rbac::has_privilege_equivalent(&self.permissions)
    }
}

#[derive(Debug, Default)]
pub struct ScanSummary {
    pub results: Vec<SaTokenScan>,
    pub candidates: usize,
    pub saved: usize,
    pub cancelled: bool,
}

/// Run a full scan. `cancel` resolving aborts in-flight tasks; whatever
/// already finished is still sorted, merged and saved.
pub async fn scan_service_accounts<C>(session: &Arc<Session>, cancel: C) -> Result<ScanSummary>
where
    C: Future<Output = ()>,
{
    let kubelet = session.get_kubelet_client()?;

    let pods = kubelet.get_pod_records().await?;
    session.cache_pods(pods.clone());

    let candidates: Vec<PodRecord> = pods
        .into_iter()
        .filter(|p| p.is_running() && p.security_flags().has_sa_token_mount)
        .collect();
    let candidate_count = candidates.len();
    let concurrency = session.config().concurrency.max(1);
    log::debug!("scan: {} candidates, {} workers", candidate_count, concurrency);

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();
    for pod in candidates {
        let kubelet = kubelet.clone();
        let session = session.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            match semaphore.acquire_owned().await {
                Ok(_permit) => scan_pod_token(&kubelet, &session, &pod).await,
                Err(_) => SaTokenScan::failed(&pod, "scan aborted".into()),
            }
        });
    }

    let mut results = Vec::with_capacity(candidate_count);
    let mut cancelled = false;
    let mut cancel = std::pin::pin!(cancel);
    loop {
        tokio::select! {
            joined = tasks.join_next() => match joined {
                Some(Ok(scan)) => results.push(scan),
                Some(Err(_)) => {}
                None => break,
            },
            _ = &mut cancel, if !cancelled => {
                log::warn!("scan: cancelled, keeping partial results");
                cancelled = true;
                tasks.abort_all();
            }
        }
    }

    sort_results(&mut results);
    let records = merge_results(&results, kubelet.ip());
    let saved = session.store().save_batch(&records)?;
    session.mark_scanned();

    Ok(ScanSummary {
        results,
        candidates: candidate_count,
        saved,
        cancelled,
    })
}

async fn scan_pod_token(
    kubelet: &KubeletClient,
    session: &Session,
    pod: &PodRecord,
) -> SaTokenScan {
    let mut scan = SaTokenScan::for_pod(pod);

    let container = match pod.containers.first() {
        Some(c) => c.name.clone(),
        None => {
            scan.error = Some("pod has no containers".into());
            return scan;
        }
    };
    scan.container = container.clone();

    let opts = ExecOptions::command(
        pod.namespace.clone(),
        pod.name.clone(),
        container,
        vec!["cat".into(), DEFAULT_TOKEN_PATH.into()],
    );

    let exec = match kubelet.exec(&opts).await {
        Ok(result) => result,
        Err(e) => {
            scan.error = Some(format!("exec failed: {}", e));
            return scan;
        }
    };
    if let Some(err) = exec.error {
        scan.error = Some(format!("token read failed: {}", err));
        return scan;
    }

    let harvested = exec.stdout_text().trim().to_string();
    if harvested.is_empty() {
        scan.error = Some("token is empty".into());
        return scan;
    }
    scan.token = harvested.clone();

    let info = match token::parse(&harvested) {
        Ok(info) => info,
        Err(e) => {
            scan.error = Some(format!("token parse failed: {}", e));
            return scan;
        }
    };
    scan.service_account = info.service_account.clone();

    let k8s = match session.get_k8s_client(&harvested) {
        Ok(client) => client,
        Err(e) => {
            scan.error = Some(format!("review client failed: {}", e));
            return scan;
        }
    };

    // Probe in the token's own namespace, not the operator's.
    let permissions = k8s.check_common_permissions(&info.namespace).await;
    scan.is_cluster_admin = rbac::is_cluster_admin(&permissions);
    scan.risk_level = if scan.is_cluster_admin {
        RiskLevel::Admin
    } else {
        rbac::calculate_risk_level(&permissions)
    };
    scan.permissions = permissions;
    scan.token_info = Some(info);

    scan
}

/// Cluster admins first, then by tier severity. Stable, so equal entries
/// keep their arrival order.
pub fn sort_results(results: &mut [SaTokenScan]) {
    results.sort_by(|a, b| {
        b.is_cluster_admin
            .cmp(&a.is_cluster_admin)
            .then_with(|| a.risk_level.order().cmp(&b.risk_level.order()))
    });
}

/// Coalesce per (token namespace, SA name). The first occurrence decides
/// the SA-level fields; later pods only extend the pod list and the
/// security-flag union.
pub fn merge_results(results: &[SaTokenScan], kubelet_ip: &str) -> Vec<ServiceAccountRecord> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut merged: HashMap<(String, String), ServiceAccountRecord> = HashMap::new();

    for scan in results {
        if scan.error.is_some() || scan.service_account.is_empty() {
            continue;
        }

        let sa_namespace = scan
            .token_info
            .as_ref()
            .map(|t| t.namespace.clone())
            .unwrap_or_default();
        let key = (sa_namespace.clone(), scan.service_account.clone());
        let pod_ref = SaPodRef {
            namespace: scan.namespace.clone(),
            name: scan.pod_name.clone(),
            container: scan.container.clone(),
        };

        if let Some(existing) = merged.get_mut(&key) {
            existing.pods.push(pod_ref);
            existing.security_flags = existing.security_flags.union(scan.security_flags);
            continue;
        }

        let (token_expiration, is_expired) = scan
            .token_info
            .as_ref()
            .map(|t| (t.expiration, t.is_expired))
            .unwrap_or((None, false));

        order.push(key.clone());
        merged.insert(
            key,
            ServiceAccountRecord {
                name: scan.service_account.clone(),
                namespace: sa_namespace,
                token: scan.token.clone(),
                token_expiration,
                is_expired,
                risk_level: scan.risk_level,
                permissions: scan
                    .permissions
                    .iter()
                    .filter(|p| p.allowed)
                    .cloned()
                    .collect(),
                is_cluster_admin: scan.is_cluster_admin,
                security_flags: scan.security_flags,
                pods: vec![pod_ref],
                collected_at: Utc::now(),
                kubelet_ip: kubelet_ip.to_string(),
            },
        );
    }

    order.into_iter().filter_map(|k| merged.remove(&k)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(
        pod: &str,
        sa: &str,
        ns: &str,
        risk: RiskLevel,
        admin: bool,
        error: Option<&str>,
    ) -> SaTokenScan {
        SaTokenScan {
            namespace: ns.into(),
            pod_name: pod.into(),
            container: "c0".into(),
            service_account: sa.into(),
            token: format!("tok-{}", sa),
            token_info: Some(TokenInfo {
                namespace: ns.into(),
                service_account: sa.into(),
                ..TokenInfo::default()
            }),
            permissions: vec![],
            security_flags: SecurityFlags::default(),
            risk_level: risk,
            is_cluster_admin: admin,
            error: error.map(String::from),
        }
    }

    #[test]
    fn shared_sa_across_pods_coalesces_into_one_record() {
        let results = vec![
            scan("a", "shared", "default", RiskLevel::Low, false, None),
            scan("b", "shared", "default", RiskLevel::Low, false, None),
        ];

        let records = merge_results(&results, "10.0.0.1");
        assert_eq!(records.len(), 1);

        let rec = &records[0];
        assert_eq!(rec.coordinate(), "default/shared");
        assert_eq!(
            rec.pods,
            vec![
                SaPodRef { namespace: "default".into(), name: "a".into(), container: "c0".into() },
                SaPodRef { namespace: "default".into(), name: "b".into(), container: "c0".into() },
            ]
        );
        // First encounter wins the SA-level fields.
        assert_eq!(rec.token, "tok-shared");
    }

    #[test]
    fn failed_tasks_contribute_no_records() {
        let results = vec![
            scan("a", "good", "ns", RiskLevel::Low, false, None),
            scan("b", "bad", "ns", RiskLevel::Low, false, Some("exec failed")),
            scan("c", "", "ns", RiskLevel::None, false, None),
        ];

        let records = merge_results(&results, "10.0.0.1");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "good");
    }

    #[test]
    fn flag_union_accumulates_across_pods() {
        let mut first = scan("a", "shared", "ns", RiskLevel::Low, false, None);
        first.security_flags.privileged = true;
        let mut second = scan("b", "shared", "ns", RiskLevel::Low, false, None);
        second.security_flags.has_host_path = true;

        let records = merge_results(&[first, second], "10.0.0.1");
        assert!(records[0].security_flags.privileged);
        assert!(records[0].security_flags.has_host_path);
    }

    #[test]
    fn only_allowed_probes_are_persisted() {
        let mut one = scan("a", "sa", "ns", RiskLevel::Low, false, None);
        one.permissions = vec![
            PermissionCheck {
                resource: "pods".into(),
                verb: "list".into(),
                group: String::new(),
                subresource: String::new(),
                allowed: true,
            },
            PermissionCheck {
                resource: "secrets".into(),
                verb: "get".into(),
                group: String::new(),
                subresource: String::new(),
                allowed: false,
            },
        ];

        let records = merge_results(&[one], "10.0.0.1");
        assert_eq!(records[0].permissions.len(), 1);
        assert_eq!(records[0].permissions[0].resource, "pods");
    }

    #[test]
    fn sort_puts_admins_first_then_severity() {
        let mut results = vec![
            scan("a", "low", "ns", RiskLevel::Low, false, None),
            scan("b", "crit", "ns", RiskLevel::Critical, false, None),
            scan("c", "boss", "ns", RiskLevel::Admin, true, None),
            scan("d", "high", "ns", RiskLevel::High, false, None),
        ];
        sort_results(&mut results);

        let order: Vec<&str> = results.iter().map(|r| r.service_account.as_str()).collect();
        assert_eq!(order, vec!["boss", "crit", "high", "low"]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut results = vec![
            scan("a1", "x", "ns", RiskLevel::High, false, None),
            scan("a2", "y", "ns", RiskLevel::High, false, None),
        ];
        sort_results(&mut results);
        assert_eq!(results[0].pod_name, "a1");
        assert_eq!(results[1].pod_name, "a2");
    }
}
