//! Ambient environment detection: are we inside a pod, and where is the
//! node we are running on.

use std::net::Ipv4Addr;
use std::path::Path;

use crate::config::{DEFAULT_NAMESPACE_PATH, DEFAULT_TOKEN_PATH, PROC_NET_ROUTE};

/// True when the ambient SA token is mounted or the in-cluster service
/// env is present.
pub fn is_in_pod() -> bool {
    Path::new(DEFAULT_TOKEN_PATH).exists()
        || std::env::var_os("KUBERNETES_SERVICE_HOST").is_some()
}

pub fn pod_namespace() -> String {
    std::fs::read_to_string(DEFAULT_NAMESPACE_PATH)
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "default".to_string())
}

pub fn kubernetes_service_host() -> Option<String> {
    std::env::var("KUBERNETES_SERVICE_HOST")
        .ok()
        .filter(|s| !s.is_empty())
}

pub fn kubernetes_service_port() -> String {
    std::env::var("KUBERNETES_SERVICE_PORT")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "443".to_string())
}

/// In-cluster API server URL, if the service env is present.
pub fn api_server_from_env() -> Option<String> {
    kubernetes_service_host().map(|host| format!("https://{}:{}", host, kubernetes_service_port()))
}

/// From inside a pod the default gateway is the node; good enough to aim
/// the kubelet client without asking anyone.
pub fn discover_node_ip() -> Option<String> {
    let route = std::fs::read_to_string(PROC_NET_ROUTE).ok()?;
    parse_default_gateway(&route)
}

fn parse_default_gateway(route: &str) -> Option<String> {
    for line in route.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 || fields[1] != "00000000" {
            continue;
        }
        // Gateway column is little-endian hex.
        let gw = u32::from_str_radix(fields[2], 16).ok()?;
        if gw == 0 {
            continue;
        }
        return Some(Ipv4Addr::from(gw.to_le_bytes()).to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_gateway_from_route_table() {
        let route = "Iface\tDestination\tGateway\tFlags\tRefCnt\tUse\tMetric\tMask\n\
                     eth0\t00000000\t0101A8C0\t0003\t0\t0\t0\t00000000\n\
                     eth0\t0000A8C0\t00000000\t0001\t0\t0\t0\t00FFFFFF\n";
        assert_eq!(parse_default_gateway(route).as_deref(), Some("192.168.1.1"));
    }

    #[test]
    fn no_default_route_means_no_node() {
        let route = "Iface\tDestination\tGateway\tFlags\n\
                     eth0\t0000A8C0\t00000000\t0001\n";
        assert_eq!(parse_default_gateway(route), None);
    }
}
