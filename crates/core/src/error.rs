use thiserror::Error;

/// Failure kinds surfaced to the operator. Messages name the component
/// that failed; callers attach pod coordinates where they have them.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration: {0}")]
    Config(String),

    #[error("unsupported proxy scheme '{0}': only socks5:// and socks5h:// are accepted")]
    UnsupportedProxy(String),

    #[error("transport: {0}")]
    Transport(String),

    #[error("transport: HTTP {status}: {}", String::from_utf8_lossy(.body))]
    HttpStatus { status: u16, body: Vec<u8> },

    #[error("websocket handshake failed (HTTP {status}): {}", String::from_utf8_lossy(.body))]
    WsHandshake { status: u16, body: Vec<u8> },

    #[error("protocol: {0}")]
    Protocol(String),

    #[error("exec on {namespace}/{pod}: {message}")]
    Exec {
        namespace: String,
        pod: String,
        message: String,
    },

    #[error("token: {0}")]
    Token(String),

    #[error("access review: {0}")]
    Review(String),

    #[error("repository: {0}")]
    Repository(String),

    #[error("cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
