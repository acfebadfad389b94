//! Operator session: connection settings, lazily constructed clients and
//! the caches a scan fills. Mutable state sits behind mutexes so the scan
//! orchestrator can share the session across tasks.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::config::{DEFAULT_K8S_API_SERVER, DEFAULT_KUBELET_PORT, DEFAULT_SCAN_CONCURRENCY};
use crate::error::{Error, Result};
use crate::k8s::K8sClient;
use crate::kubelet::KubeletClient;
use crate::pod::PodRecord;
use crate::runtime;
use crate::store::SaStore;
use crate::transport::ClientConfig;
use crate::types::ServiceAccountRecord;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub kubelet_ip: String,
    pub kubelet_port: u16,
    pub token: String,
    pub token_file: Option<PathBuf>,
    pub api_server: String,
    pub proxy_url: Option<String>,
    pub concurrency: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            kubelet_ip: String::new(),
            kubelet_port: DEFAULT_KUBELET_PORT,
            token: String::new(),
            token_file: None,
            api_server: DEFAULT_K8S_API_SERVER.to_string(),
            proxy_url: None,
            concurrency: DEFAULT_SCAN_CONCURRENCY,
        }
    }
}

impl SessionConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default().with_proxy(self.proxy_url.clone())
    }
}

pub struct Session {
    config: Mutex<SessionConfig>,
    kubelet: Mutex<Option<KubeletClient>>,
    cached_pods: Mutex<Vec<PodRecord>>,
    current_sa: Mutex<Option<ServiceAccountRecord>>,
    connected: AtomicBool,
    last_scan_at: Mutex<Option<DateTime<Utc>>>,
    in_pod: bool,
    store: SaStore,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Session {
            config: Mutex::new(config),
            kubelet: Mutex::new(None),
            cached_pods: Mutex::new(Vec::new()),
            current_sa: Mutex::new(None),
            connected: AtomicBool::new(false),
            last_scan_at: Mutex::new(None),
            in_pod: runtime::is_in_pod(),
            store: SaStore::new(),
        }
    }

    pub fn config(&self) -> SessionConfig {
        guard(&self.config).clone()
    }

    /// Mutate the configuration. Any change may affect the connection, so
    /// the cached kubelet client is dropped and rebuilt on next use.
    pub fn update_config<F: FnOnce(&mut SessionConfig)>(&self, f: F) {
        f(&mut guard(&self.config));
        *guard(&self.kubelet) = None;
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn in_pod(&self) -> bool {
        self.in_pod
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Lazily build (and cache) the kubelet client for the configured
    /// endpoint. The client itself is immutable; reconfiguration replaces
    /// it instead of mutating it.
    pub fn get_kubelet_client(&self) -> Result<KubeletClient> {
        if let Some(client) = guard(&self.kubelet).clone() {
            return Ok(client);
        }

        let cfg = self.config();
        if cfg.kubelet_ip.is_empty() {
            return Err(Error::Config(
                "kubelet IP is not set, use 'set target <ip>'".into(),
            ));
        }
        if cfg.token.is_empty() {
            return Err(Error::Config(
                "token is not set, use 'set token <token>' or 'set token-file <path>'".into(),
            ));
        }

        let client = KubeletClient::new(
            &cfg.kubelet_ip,
            cfg.kubelet_port,
            &cfg.token,
            cfg.client_config(),
        )?;
        *guard(&self.kubelet) = Some(client.clone());
        Ok(client)
    }

    /// Review client for an arbitrary harvested token (not the session
    /// default), aimed at the configured API server.
    pub fn get_k8s_client(&self, token: &str) -> Result<K8sClient> {
        let cfg = self.config();
        K8sClient::new(&cfg.api_server, token, &cfg.client_config())
    }

    pub fn cache_pods(&self, pods: Vec<PodRecord>) {
        *guard(&self.cached_pods) = pods;
    }

    pub fn cached_pods(&self) -> Vec<PodRecord> {
        guard(&self.cached_pods).clone()
    }

    pub fn set_current_sa(&self, sa: Option<ServiceAccountRecord>) {
        *guard(&self.current_sa) = sa;
    }

    pub fn current_sa(&self) -> Option<ServiceAccountRecord> {
        guard(&self.current_sa).clone()
    }

    pub fn mark_scanned(&self) {
        *guard(&self.last_scan_at) = Some(Utc::now());
    }

    pub fn last_scan_at(&self) -> Option<DateTime<Utc>> {
        *guard(&self.last_scan_at)
    }

    pub fn store(&self) -> &SaStore {
        &self.store
    }

    /// Drop the pod cache and the SA selection; the repository survives.
    pub fn clear_cache(&self) {
        guard(&self.cached_pods).clear();
        *guard(&self.current_sa) = None;
    }

    pub fn disconnect(&self) {
        *guard(&self.kubelet) = None;
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Zero everything sensitive: repository, caches and the token.
    pub fn close(&self) {
        self.store.clear();
        self.clear_cache();
        guard(&self.config).token.clear();
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kubelet_client_requires_target_and_token() {
        let session = Session::new(SessionConfig::default());
        assert!(matches!(
            session.get_kubelet_client(),
            Err(Error::Config(msg)) if msg.contains("kubelet IP")
        ));

        session.update_config(|c| c.kubelet_ip = "10.0.0.1".into());
        assert!(matches!(
            session.get_kubelet_client(),
            Err(Error::Config(msg)) if msg.contains("token")
        ));

        session.update_config(|c| c.token = "tok".into());
        assert!(session.get_kubelet_client().is_ok());
    }

    #[test]
    fn config_mutation_invalidates_the_cached_client() {
        let session = Session::new(SessionConfig {
            kubelet_ip: "10.0.0.1".into(),
            token: "tok".into(),
            ..SessionConfig::default()
        });

        let first = session.get_kubelet_client().unwrap();
        assert_eq!(first.endpoint(), "10.0.0.1:10250");

        session.update_config(|c| c.kubelet_ip = "10.0.0.2".into());
        let second = session.get_kubelet_client().unwrap();
        assert_eq!(second.endpoint(), "10.0.0.2:10250");
        assert!(!session.is_connected());
    }

    #[test]
    fn close_zeroes_sensitive_state() {
        let session = Session::new(SessionConfig {
            kubelet_ip: "10.0.0.1".into(),
            token: "secret".into(),
            ..SessionConfig::default()
        });
        session.cache_pods(vec![]);
        session.close();

        assert!(session.config().token.is_empty());
        assert_eq!(session.store().count(), 0);
        assert!(session.current_sa().is_none());
    }
}
