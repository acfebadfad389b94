//! In-memory ServiceAccount repository. Upsert-by-key with risk-ordered
//! reads; contents live exactly as long as the session.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::rbac::RiskLevel;
use crate::types::ServiceAccountRecord;

type Key = (String, String);

#[derive(Debug, Default)]
pub struct SaStore {
    records: Mutex<HashMap<Key, ServiceAccountRecord>>,
}

impl SaStore {
    pub fn new() -> Self {
        SaStore::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Key, ServiceAccountRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Upsert a batch keyed by (namespace, name). All records are
    /// validated before any of them is written.
    pub fn save_batch(&self, records: &[ServiceAccountRecord]) -> Result<usize> {
        for rec in records {
            if rec.name.is_empty() || rec.namespace.is_empty() {
                return Err(Error::Repository(format!(
                    "record without a full (namespace, name) key: '{}'",
                    rec.coordinate()
                )));
            }
        }

        let mut map = self.lock();
        for rec in records {
            map.insert(rec.key(), rec.clone());
        }
        Ok(records.len())
    }

    /// Severity first, then namespace, then name. Deterministic for
    /// unchanged contents.
    pub fn get_all(&self) -> Vec<ServiceAccountRecord> {
        let mut all: Vec<ServiceAccountRecord> = self.lock().values().cloned().collect();
        sort_by_risk(&mut all);
        all
    }

    pub fn get_by_name(&self, namespace: &str, name: &str) -> Option<ServiceAccountRecord> {
        self.lock()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn get_by_namespace(&self, namespace: &str) -> Vec<ServiceAccountRecord> {
        let mut out: Vec<ServiceAccountRecord> = self
            .lock()
            .values()
            .filter(|r| r.namespace == namespace)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn get_cluster_admins(&self) -> Vec<ServiceAccountRecord> {
        let mut out: Vec<ServiceAccountRecord> = self
            .lock()
            .values()
            .filter(|r| r.is_cluster_admin)
            .cloned()
            .collect();
        out.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        out
    }

    /// ADMIN, CRITICAL, HIGH and MEDIUM records.
    pub fn get_risky(&self) -> Vec<ServiceAccountRecord> {
        let mut out: Vec<ServiceAccountRecord> = self
            .lock()
            .values()
            .filter(|r| r.risk_level.order() <= RiskLevel::Medium.order())
            .cloned()
            .collect();
        sort_by_risk(&mut out);
        out
    }

    /// Count per tier label, plus an aggregate `ADMIN` count of
    /// cluster-admin identities.
    pub fn get_stats(&self) -> HashMap<String, usize> {
        let map = self.lock();
        let mut stats: HashMap<String, usize> = HashMap::new();

        for rec in map.values() {
            *stats.entry(rec.risk_level.as_str().to_string()).or_default() += 1;
        }
        stats.insert(
            "ADMIN".to_string(),
            map.values().filter(|r| r.is_cluster_admin).count(),
        );

        stats
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

fn sort_by_risk(records: &mut [ServiceAccountRecord]) {
    records.sort_by(|a, b| {
        a.risk_level
            .order()
            .cmp(&b.risk_level.order())
            .then_with(|| a.namespace.cmp(&b.namespace))
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod::SecurityFlags;
    use chrono::Utc;

    fn record(namespace: &str, name: &str, risk: RiskLevel, admin: bool) -> ServiceAccountRecord {
        ServiceAccountRecord {
            name: name.into(),
            namespace: namespace.into(),
            token: "tok".into(),
            token_expiration: None,
            is_expired: false,
            risk_level: risk,
            permissions: vec![],
            is_cluster_admin: admin,
            security_flags: SecurityFlags::default(),
            pods: vec![],
            collected_at: Utc::now(),
            kubelet_ip: "10.0.0.1".into(),
        }
    }

    #[test]
    fn get_all_orders_by_risk_then_namespace_then_name() {
        let store = SaStore::new();
        store
            .save_batch(&[
                record("zz", "low", RiskLevel::Low, false),
                record("aa", "boss", RiskLevel::Admin, true),
                record("aa", "alpha", RiskLevel::High, false),
                record("aa", "beta", RiskLevel::High, false),
            ])
            .unwrap();

        let names: Vec<String> = store.get_all().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["boss", "alpha", "beta", "low"]);

        // Same contents, same order.
        let again: Vec<String> = store.get_all().into_iter().map(|r| r.name).collect();
        assert_eq!(names, again);
    }

    #[test]
    fn save_batch_upserts_by_key() {
        let store = SaStore::new();
        store
            .save_batch(&[record("ns", "sa", RiskLevel::Low, false)])
            .unwrap();
        store
            .save_batch(&[record("ns", "sa", RiskLevel::Critical, false)])
            .unwrap();

        assert_eq!(store.count(), 1);
        assert_eq!(
            store.get_by_name("ns", "sa").unwrap().risk_level,
            RiskLevel::Critical
        );
    }

    #[test]
    fn save_batch_rejects_keyless_records_without_partial_writes() {
        let store = SaStore::new();
        let err = store.save_batch(&[
            record("ns", "good", RiskLevel::Low, false),
            record("ns", "", RiskLevel::Low, false),
        ]);

        assert!(matches!(err, Err(Error::Repository(_))));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn clear_then_empty_batch_is_empty() {
        let store = SaStore::new();
        store
            .save_batch(&[record("ns", "sa", RiskLevel::Low, false)])
            .unwrap();
        store.clear();
        store.save_batch(&[]).unwrap();
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn risky_filter_stops_at_medium() {
        let store = SaStore::new();
        store
            .save_batch(&[
                record("ns", "a", RiskLevel::Admin, true),
                record("ns", "m", RiskLevel::Medium, false),
                record("ns", "l", RiskLevel::Low, false),
                record("ns", "n", RiskLevel::None, false),
            ])
            .unwrap();

        let risky: Vec<String> = store.get_risky().into_iter().map(|r| r.name).collect();
        assert_eq!(risky, vec!["a", "m"]);
    }

    #[test]
    fn stats_count_tiers_and_admins() {
        let store = SaStore::new();
        store
            .save_batch(&[
                record("ns", "a", RiskLevel::Admin, true),
                record("ns", "b", RiskLevel::High, false),
                record("ns2", "c", RiskLevel::High, false),
            ])
            .unwrap();

        let stats = store.get_stats();
        assert_eq!(stats.get("ADMIN"), Some(&1));
        assert_eq!(stats.get("HIGH"), Some(&2));
        assert_eq!(stats.get("LOW"), None);
    }

    #[test]
    fn namespace_and_admin_queries() {
        let store = SaStore::new();
        store
            .save_batch(&[
                record("kube-system", "boss", RiskLevel::Admin, true),
                record("kube-system", "ops", RiskLevel::Low, false),
                record("default", "web", RiskLevel::None, false),
            ])
            .unwrap();

        assert_eq!(store.get_by_namespace("kube-system").len(), 2);
        let admins = store.get_cluster_admins();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].name, "boss");
    }
}
