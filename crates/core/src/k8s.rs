//! SelfSubjectAccessReview prober. Asks the API server what a harvested
//! token may do; never makes an authorization decision itself.

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_K8S_API_SERVER, PERMISSIONS_TO_CHECK};
use crate::error::{Error, Result};
use crate::transport::{self, ClientConfig};
use crate::types::PermissionCheck;

#[derive(Debug, Clone, Default)]
pub struct PermissionRequest {
    pub resource: String,
    pub verb: String,
    pub namespace: String,
    pub group: String,
    pub subresource: String,
}

#[derive(Debug, Clone)]
pub struct K8sClient {
    api_server: String,
    token: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessReviewRequest<'a> {
    api_version: &'static str,
    kind: &'static str,
    spec: AccessReviewSpec<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessReviewSpec<'a> {
    resource_attributes: ResourceAttributes<'a>,
}

#[derive(Serialize)]
struct ResourceAttributes<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    namespace: &'a str,
    verb: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    group: &'a str,
    resource: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    subresource: &'a str,
}

#[derive(Deserialize, Default)]
struct AccessReviewResponse {
    #[serde(default)]
    status: AccessReviewStatus,
}

#[derive(Deserialize, Default)]
struct AccessReviewStatus {
    #[serde(default)]
    allowed: bool,
}

impl K8sClient {
    pub fn new(api_server: &str, token: &str, cfg: &ClientConfig) -> Result<Self> {
        let api_server = if api_server.is_empty() {
            DEFAULT_K8S_API_SERVER
        } else {
            api_server
        };
        if token.is_empty() {
            return Err(Error::Config("access review requires a token".into()));
        }

        Ok(K8sClient {
            api_server: api_server.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http: transport::build_http_client(cfg)?,
        })
    }

    pub fn api_server(&self) -> &str {
        &self.api_server
    }

    /// One review round-trip. 200 and 201 both count as answered.
    pub async fn check_permission(&self, req: &PermissionRequest) -> Result<bool> {
        let body = AccessReviewRequest {
            api_version: "authorization.k8s.io/v1",
            kind: "SelfSubjectAccessReview",
            spec: AccessReviewSpec {
                resource_attributes: ResourceAttributes {
                    namespace: &req.namespace,
                    verb: &req.verb,
                    group: &req.group,
                    resource: &req.resource,
                    subresource: &req.subresource,
                },
            },
        };

        let url = format!(
            "{}/apis/authorization.k8s.io/v1/selfsubjectaccessreviews",
            self.api_server
        );

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Review(e.to_string()))?;

        let status = resp.status().as_u16();
        if status != 200 && status != 201 {
            return Err(Error::Review(format!("API server returned {}", status)));
        }

        let parsed: AccessReviewResponse = resp
            .json()
            .await
            .map_err(|e| Error::Review(format!("response decode: {}", e)))?;

        Ok(parsed.status.allowed)
    }

    /// Review a batch, one result per request. Individual failures degrade
    /// to allowed=false; the classifier only elevates on positive findings.
    pub async fn check_permissions(&self, reqs: &[PermissionRequest]) -> Vec<PermissionCheck> {
        let mut results = Vec::with_capacity(reqs.len());

        for req in reqs {
            let allowed = match self.check_permission(req).await {
                Ok(allowed) => allowed,
                Err(e) => {
                    log::debug!("review {}:{} failed: {}", req.resource, req.verb, e);
                    false
                }
            };
            results.push(PermissionCheck {
                resource: req.resource.clone(),
                verb: req.verb.clone(),
                group: req.group.clone(),
                subresource: req.subresource.clone(),
                allowed,
            });
        }

        results
    }

    /// The curated probe set, reviewed in one namespace.
    pub async fn check_common_permissions(&self, namespace: &str) -> Vec<PermissionCheck> {
        let reqs: Vec<PermissionRequest> = PERMISSIONS_TO_CHECK
            .iter()
            .map(|p| PermissionRequest {
                resource: p.resource.to_string(),
                verb: p.verb.to_string(),
                namespace: namespace.to_string(),
                group: p.group.to_string(),
                subresource: p.subresource.to_string(),
            })
            .collect();

        self.check_permissions(&reqs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_server_falls_back_to_default() {
        let client = K8sClient::new("", "tok", &ClientConfig::default()).unwrap();
        assert_eq!(client.api_server(), DEFAULT_K8S_API_SERVER);

        let client =
            K8sClient::new("https://10.0.0.1:6443/", "tok", &ClientConfig::default()).unwrap();
        assert_eq!(client.api_server(), "https://10.0.0.1:6443");
    }

    #[test]
    fn token_is_mandatory() {
        assert!(matches!(
            K8sClient::new("", "", &ClientConfig::default()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn review_body_omits_empty_attributes() {
        let body = AccessReviewRequest {
            api_version: "authorization.k8s.io/v1",
            kind: "SelfSubjectAccessReview",
            spec: AccessReviewSpec {
                resource_attributes: ResourceAttributes {
                    namespace: "ns1",
                    verb: "get",
                    group: "",
                    resource: "nodes",
                    subresource: "proxy",
                },
            },
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["kind"], "SelfSubjectAccessReview");
        assert_eq!(json["spec"]["resourceAttributes"]["verb"], "get");
        assert_eq!(json["spec"]["resourceAttributes"]["subresource"], "proxy");
        assert!(json["spec"]["resourceAttributes"].get("group").is_none());
    }
}
