//! Direct client for the kubelet's privileged HTTPS API (default port
//! 10250). Talks to the node, not the API server.

pub mod exec;
pub mod parser;

pub use exec::{ExecOptions, ExecResult};

use crate::error::{Error, Result};
use crate::pod::PodRecord;
use crate::transport::{self, ClientConfig};

/// Immutable once constructed; cheap to clone, safe to share across
/// tasks. Every call opens its own connection.
#[derive(Debug, Clone)]
pub struct KubeletClient {
    ip: String,
    port: u16,
    token: String,
    cfg: ClientConfig,
    http: reqwest::Client,
}

#[derive(Debug, Clone, Copy)]
pub struct PortValidation {
    pub status: u16,
    pub is_kubelet: bool,
}

impl KubeletClient {
    pub fn new(ip: &str, port: u16, token: &str, cfg: ClientConfig) -> Result<Self> {
        if ip.is_empty() {
            return Err(Error::Config("kubelet IP is required".into()));
        }
        let http = transport::build_http_client(&cfg)?;
        Ok(KubeletClient {
            ip: ip.to_string(),
            port,
            token: token.to_string(),
            cfg,
            http,
        })
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// `GET /pods` — the node-local pod snapshot, raw bytes.
    pub async fn list_pods_raw(&self) -> Result<Vec<u8>> {
        let url = format!("https://{}:{}/pods", self.ip, self.port);
        log::debug!("kubelet: GET {}", url);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?.to_vec();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// Enumerate pods and project them into security records.
    pub async fn get_pod_records(&self) -> Result<Vec<PodRecord>> {
        let raw = self.list_pods_raw().await?;
        parser::extract_pod_records(&raw, &self.ip)
    }

    /// Light probe: does the target answer `/pods` with something
    /// kubelet-shaped (an `items` key)?
    pub async fn validate_port(&self) -> Result<PortValidation> {
        match self.list_pods_raw().await {
            Ok(body) => {
                let is_kubelet = serde_json::from_slice::<serde_json::Value>(&body)
                    .ok()
                    .map(|v| v.get("items").is_some())
                    .unwrap_or(false);
                Ok(PortValidation { status: 200, is_kubelet })
            }
            Err(Error::HttpStatus { status, .. }) => Ok(PortValidation {
                status,
                is_kubelet: false,
            }),
            Err(e) => Err(e),
        }
    }
}
