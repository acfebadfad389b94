//! HTTPS and WebSocket plumbing: TLS-skip clients, bearer injection,
//! optional SOCKS5 tunneling for both transports.

use std::time::Duration;

use native_tls::TlsConnector;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{client_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_HTTP_TIMEOUT, DEFAULT_MAX_RETRIES, DEFAULT_WEBSOCKET_TIMEOUT,
};
use crate::error::{Error, Result};

/// Subprotocol the kubelet exec endpoint speaks.
pub const KUBELET_WS_PROTOCOL: &str = "v4.channel.k8s.io";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub proxy_url: Option<String>,
    pub http_timeout: Duration,
    pub connect_timeout: Duration,
    pub ws_timeout: Duration,
    pub skip_tls_verify: bool,
    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            proxy_url: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            ws_timeout: DEFAULT_WEBSOCKET_TIMEOUT,
            // Kubelets serve self-signed certificates; verification is
            // off unless the operator opts back in.
            skip_tls_verify: true,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ClientConfig {
    pub fn with_proxy(mut self, proxy_url: Option<String>) -> Self {
        self.proxy_url = proxy_url;
        self
    }
}

pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// WebSocket over direct TCP or a SOCKS5 tunnel, TLS or plain.
pub type WsStream = WebSocketStream<MaybeTlsStream<Box<dyn AsyncStream>>>;

/// Parse and validate a proxy URL. Anything that is not SOCKS5 is refused.
pub fn parse_proxy_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::Config(format!("proxy URL: {}", e)))?;
    match url.scheme() {
        "socks5" | "socks5h" => Ok(url),
        other => Err(Error::UnsupportedProxy(other.to_string())),
    }
}

/// HTTPS client with per-config timeouts, optional cert-verify skip and
/// optional SOCKS5 proxy. Authorization is injected per request.
pub fn build_http_client(cfg: &ClientConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .danger_accept_invalid_certs(cfg.skip_tls_verify)
        .timeout(cfg.http_timeout)
        .connect_timeout(cfg.connect_timeout);

    if let Some(raw) = &cfg.proxy_url {
        parse_proxy_url(raw)?;
        let proxy = reqwest::Proxy::all(raw.as_str())
            .map_err(|e| Error::Config(format!("proxy: {}", e)))?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(Into::into)
}

/// Dial a WebSocket endpoint with the kubelet subprotocol and a bearer
/// token, tunneling through SOCKS5 when configured.
pub async fn ws_connect(cfg: &ClientConfig, url_str: &str, bearer: &str) -> Result<WsStream> {
    let url = Url::parse(url_str).map_err(|e| Error::Protocol(format!("websocket URL: {}", e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::Config("websocket URL has no host".into()))?
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| Error::Config("websocket URL has no port".into()))?;

    let mut request = url_str
        .into_client_request()
        .map_err(|e| Error::Protocol(format!("websocket request: {}", e)))?;
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_static(KUBELET_WS_PROTOCOL),
    );
    request.headers_mut().insert(
        "Authorization",
        HeaderValue::from_str(&format!("Bearer {}", bearer))
            .map_err(|_| Error::Config("token is not a valid header value".into()))?,
    );

    let stream: Box<dyn AsyncStream> = match &cfg.proxy_url {
        Some(raw) => {
            let proxy = parse_proxy_url(raw)?;
            let proxy_host = proxy
                .host_str()
                .ok_or_else(|| Error::Config("proxy URL has no host".into()))?
                .to_string();
            let proxy_port = proxy.port().unwrap_or(1080);
            let s = tokio::time::timeout(
                cfg.connect_timeout,
                Socks5Stream::connect((proxy_host.as_str(), proxy_port), (host, port)),
            )
            .await
            .map_err(|_| Error::Transport("SOCKS5 connect timeout".into()))?
            .map_err(|e| Error::Transport(format!("SOCKS5 connect: {}", e)))?;
            Box::new(s)
        }
        None => {
            let s = tokio::time::timeout(
                cfg.connect_timeout,
                TcpStream::connect((host.as_str(), port)),
            )
            .await
            .map_err(|_| Error::Transport("connect timeout".into()))??;
            Box::new(s)
        }
    };

    let connector = if url.scheme() == "wss" && cfg.skip_tls_verify {
        let tls = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| Error::Transport(format!("TLS connector: {}", e)))?;
        Some(Connector::NativeTls(tls))
    } else if url.scheme() == "ws" {
        Some(Connector::Plain)
    } else {
        None
    };

    let handshake = client_async_tls_with_config(request, stream, None, connector);
    let (ws, _resp) = tokio::time::timeout(cfg.ws_timeout, handshake)
        .await
        .map_err(|_| Error::Transport("websocket handshake timeout".into()))?
        .map_err(|e| match e {
            WsError::Http(resp) => {
                let status = resp.status().as_u16();
                let body = resp.into_body().unwrap_or_default();
                Error::WsHandshake { status, body }
            }
            other => Error::Transport(format!("websocket connect: {}", other)),
        })?;

    Ok(ws)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_socks5_schemes_only() {
        assert!(parse_proxy_url("socks5://127.0.0.1:1080").is_ok());
        assert!(parse_proxy_url("socks5h://127.0.0.1:1080").is_ok());
        assert!(matches!(
            parse_proxy_url("http://127.0.0.1:8080"),
            Err(Error::UnsupportedProxy(scheme)) if scheme == "http"
        ));
    }

    #[test]
    fn http_client_rejects_bad_proxy_scheme() {
        let cfg = ClientConfig::default().with_proxy(Some("https://proxy:3128".into()));
        assert!(matches!(
            build_http_client(&cfg),
            Err(Error::UnsupportedProxy(_))
        ));
    }

    #[test]
    fn http_client_builds_with_defaults() {
        assert!(build_http_client(&ClientConfig::default()).is_ok());
    }
}
