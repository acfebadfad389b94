//! ServiceAccount JWT handling. Parsing is claims-only: the signature is
//! never verified, the token is someone else's credential.

use std::path::Path;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::DEFAULT_TOKEN_PATH;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenInfo {
    pub issuer: String,
    pub expiration: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub service_account: String,
    pub namespace: String,
}

/// Read a token from disk (the ambient mount by default), trimmed.
pub fn read(path: Option<&Path>) -> Result<String> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_TOKEN_PATH));
    let data = std::fs::read_to_string(path)
        .map_err(|e| Error::Token(format!("read {}: {}", path.display(), e)))?;

    let token = data.trim().to_string();
    if token.is_empty() {
        return Err(Error::Token(format!("{} is empty", path.display())));
    }
    Ok(token)
}

/// Decode the payload segment of a JWT and extract the identity claims.
pub fn parse(token: &str) -> Result<TokenInfo> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::Token("invalid JWT format".into()));
    }

    // URL-safe without padding is the JWT norm; some issuers emit
    // standard base64 anyway.
    let payload = URL_SAFE_NO_PAD
        .decode(parts[1])
        .or_else(|_| STANDARD.decode(parts[1]))
        .map_err(|e| Error::Token(format!("payload decode failed: {}", e)))?;

    let claims: Value = serde_json::from_slice(&payload)
        .map_err(|e| Error::Token(format!("claims are not JSON: {}", e)))?;

    let mut info = TokenInfo::default();

    if let Some(iss) = claims.get("iss").and_then(Value::as_str) {
        info.issuer = iss.to_string();
    }

    if let Some(exp) = claims.get("exp").and_then(Value::as_f64) {
        if let Some(ts) = Utc.timestamp_opt(exp as i64, 0).single() {
            info.expiration = Some(ts);
            info.is_expired = Utc::now() > ts;
        }
    }

    // Bound tokens carry the structured kubernetes.io claim.
    if let Some(k8s) = claims.get("kubernetes.io") {
        if let Some(ns) = k8s.get("namespace").and_then(Value::as_str) {
            info.namespace = ns.to_string();
        }
        if let Some(name) = k8s
            .pointer("/serviceaccount/name")
            .and_then(Value::as_str)
        {
            info.service_account = name.to_string();
        }
    }

    // Legacy tokens only have sub = system:serviceaccount:<ns>:<name>.
    if info.service_account.is_empty() {
        if let Some(sub) = claims.get("sub").and_then(Value::as_str) {
            let fields: Vec<&str> = sub.split(':').collect();
            if fields.len() >= 4 && fields[0] == "system" && fields[1] == "serviceaccount" {
                info.namespace = fields[2].to_string();
                info.service_account = fields[3].to_string();
            }
        }
    }

    Ok(info)
}

/// Shorten a token for display.
pub fn truncate(token: &str, max_len: usize) -> String {
    if token.len() <= max_len {
        token.to_string()
    } else {
        format!("{}...", &token[..max_len])
    }
}
