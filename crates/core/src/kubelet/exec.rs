//! Command execution over the kubelet's multiplexed exec WebSocket.
//! Each binary frame is prefixed with a channel byte; channel 3 carries a
//! JSON status object instead of output bytes.

use std::borrow::Cow;
use std::io::IsTerminal;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use super::KubeletClient;
use crate::error::{Error, Result};
use crate::transport;

pub const STREAM_STDIN: u8 = 0;
pub const STREAM_STDOUT: u8 = 1;
pub const STREAM_STDERR: u8 = 2;
pub const STREAM_ERROR: u8 = 3;
pub const STREAM_RESIZE: u8 = 4;

#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub command: Vec<String>,
    pub stdin: bool,
    pub stdout: bool,
    pub stderr: bool,
    pub tty: bool,
}

impl ExecOptions {
    /// One-shot command capture: stdout + stderr, no stdin, no TTY.
    pub fn command<S: Into<String>>(
        namespace: S,
        pod: S,
        container: S,
        command: Vec<String>,
    ) -> Self {
        ExecOptions {
            namespace: namespace.into(),
            pod: pod.into(),
            container: container.into(),
            command,
            stdin: false,
            stdout: true,
            stderr: true,
            tty: false,
        }
    }

    /// Full-duplex TTY shell.
    pub fn interactive<S: Into<String>>(
        namespace: S,
        pod: S,
        container: S,
        command: Vec<String>,
    ) -> Self {
        ExecOptions {
            namespace: namespace.into(),
            pod: pod.into(),
            container: container.into(),
            command,
            stdin: true,
            stdout: true,
            stderr: true,
            tty: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct ExecResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub error: Option<String>,
}

impl ExecResult {
    pub fn stdout_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

#[derive(Debug, Deserialize)]
struct ExecStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

/// Restores the terminal on every exit path, panics included.
struct RawModeGuard;

impl RawModeGuard {
    fn acquire() -> Result<Self> {
        crossterm::terminal::enable_raw_mode()
            .map_err(|e| Error::Config(format!("terminal raw mode: {}", e)))?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

impl KubeletClient {
    /// Run a command and collect its output until the peer closes.
    pub async fn exec(&self, opts: &ExecOptions) -> Result<ExecResult> {
        let url = self.build_exec_url(opts);
        log::debug!("exec: {}/{} [{}]", opts.namespace, opts.pod, opts.command.join(" "));

        let mut ws = transport::ws_connect(&self.cfg, &url, &self.token).await?;
        let result = read_exec_output(&mut ws).await;
        let _ = ws.close(None).await;
        Ok(result)
    }

    /// Attach the local terminal to a remote process. With a TTY the
    /// local terminal goes raw for the duration.
    pub async fn exec_interactive(&self, opts: &ExecOptions) -> Result<()> {
        let url = self.build_exec_url(opts);
        let ws = transport::ws_connect(&self.cfg, &url, &self.token).await?;

        let _raw = if opts.tty && std::io::stdin().is_terminal() {
            Some(RawModeGuard::acquire()?)
        } else {
            None
        };

        let (mut tx, mut rx) = ws.split();
        let mut stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut stderr = tokio::io::stderr();
        let mut buf = [0u8; 1024];

        loop {
            tokio::select! {
                frame = rx.next() => {
                    match frame {
                        Some(Ok(Message::Binary(data))) => {
                            if data.is_empty() {
                                continue;
                            }
                            let payload = &data[1..];
                            match data[0] {
                                STREAM_STDOUT => {
                                    let _ = stdout.write_all(payload).await;
                                    let _ = stdout.flush().await;
                                }
                                STREAM_STDERR => {
                                    let _ = stderr.write_all(payload).await;
                                    let _ = stderr.flush().await;
                                }
                                STREAM_ERROR => {
                                    let msg = format!(
                                        "\n[Error] {}\n",
                                        String::from_utf8_lossy(payload)
                                    );
                                    let _ = stderr.write_all(msg.as_bytes()).await;
                                    let _ = stderr.flush().await;
                                }
                                _ => {}
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(_)) => break,
                    }
                }
                read = stdin.read(&mut buf), if opts.stdin => {
                    match read {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let mut msg = Vec::with_capacity(n + 1);
                            msg.push(STREAM_STDIN);
                            msg.extend_from_slice(&buf[..n]);
                            if tx.send(Message::Binary(msg.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        let _ = tx.close().await;
        Ok(())
    }

    /// The kubelet exec endpoint names its channels input/output/error,
    /// not stdin/stdout/stderr.
    pub(crate) fn build_exec_url(&self, opts: &ExecOptions) -> String {
        let mut qs = url::form_urlencoded::Serializer::new(String::new());
        if opts.stdin {
            qs.append_pair("input", "1");
        }
        if opts.stdout {
            qs.append_pair("output", "1");
        }
        if opts.stderr {
            qs.append_pair("error", "1");
        }
        if opts.tty {
            qs.append_pair("tty", "1");
        }
        for arg in &opts.command {
            qs.append_pair("command", arg);
        }

        format!(
            "wss://{}:{}/exec/{}/{}/{}?{}",
            self.ip,
            self.port,
            opts.namespace,
            opts.pod,
            opts.container,
            qs.finish()
        )
    }
}

/// Demultiplex frames until the peer closes. Bytes keep their per-channel
/// emission order; cross-channel interleaving follows frame arrival.
pub(crate) async fn read_exec_output<S>(ws: &mut WebSocketStream<S>) -> ExecResult
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut result = ExecResult::default();

    while let Some(frame) = ws.next().await {
        match frame {
            Ok(Message::Binary(data)) => {
                if data.is_empty() {
                    continue;
                }
                let payload = &data[1..];
                match data[0] {
                    STREAM_STDOUT => result.stdout.extend_from_slice(payload),
                    STREAM_STDERR => result.stderr.extend_from_slice(payload),
                    STREAM_ERROR => apply_status_frame(&mut result, payload),
                    _ => {}
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                // Close-flavored errors are the normal end of stream.
                let msg = e.to_string();
                if result.error.is_none() && !msg.to_lowercase().contains("close") {
                    result.error = Some(msg);
                }
                break;
            }
        }
    }

    result
}

fn apply_status_frame(result: &mut ExecResult, payload: &[u8]) {
    match serde_json::from_slice::<ExecStatus>(payload) {
        Ok(status) if status.status == "Success" => {}
        Ok(status) => {
            result.error = Some(if status.message.is_empty() {
                String::from_utf8_lossy(payload).into_owned()
            } else {
                status.message
            });
        }
        Err(_) => {
            result.error = Some(String::from_utf8_lossy(payload).into_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ClientConfig;
    use std::net::SocketAddr;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::{accept_async, client_async};

    async fn frame_server(frames: Vec<Vec<u8>>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            for frame in frames {
                ws.send(Message::Binary(frame.into())).await.unwrap();
            }
            let _ = ws.close(None).await;
        });
        addr
    }

    async fn run_demux(frames: Vec<Vec<u8>>) -> ExecResult {
        let addr = frame_server(frames).await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (mut ws, _) = client_async(format!("ws://{}/", addr), stream)
            .await
            .unwrap();
        read_exec_output(&mut ws).await
    }

    #[tokio::test]
    async fn demultiplexes_stdout_and_stderr() {
        let result = run_demux(vec![
            b"\x01he".to_vec(),
            b"\x02err".to_vec(),
            b"\x01llo".to_vec(),
        ])
        .await;

        assert_eq!(result.stdout, b"hello");
        assert_eq!(result.stderr, b"err");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn failure_status_frame_surfaces_as_error() {
        let mut frame = vec![STREAM_ERROR];
        frame.extend_from_slice(
            br#"{"status":"Failure","message":"container not found (\"nope\")","reason":"NotFound"}"#,
        );
        let result = run_demux(vec![frame]).await;
        assert_eq!(result.error.as_deref(), Some("container not found (\"nope\")"));
    }

    #[tokio::test]
    async fn success_status_frame_is_silent() {
        let mut frame = vec![STREAM_ERROR];
        frame.extend_from_slice(br#"{"status":"Success"}"#);
        let result = run_demux(vec![frame, b"\x01ok".to_vec()]).await;
        assert!(result.error.is_none());
        assert_eq!(result.stdout, b"ok");
    }

    #[tokio::test]
    async fn unparseable_status_frame_falls_back_to_raw_text() {
        let mut frame = vec![STREAM_ERROR];
        frame.extend_from_slice(b"plain text failure");
        let result = run_demux(vec![frame]).await;
        assert_eq!(result.error.as_deref(), Some("plain text failure"));
    }

    #[tokio::test]
    async fn empty_and_unknown_channel_frames_are_skipped() {
        let result = run_demux(vec![
            vec![],
            vec![STREAM_RESIZE, b'x'],
            b"\x01out".to_vec(),
        ])
        .await;
        assert_eq!(result.stdout, b"out");
        assert_eq!(result.stderr, b"");
    }

    #[test]
    fn exec_url_carries_kubelet_channel_names() {
        let client =
            KubeletClient::new("10.0.0.1", 10250, "tok", ClientConfig::default()).unwrap();
        let opts = ExecOptions::command(
            "default",
            "web-0",
            "app",
            vec!["cat".into(), "/etc/passwd".into()],
        );

        let url = client.build_exec_url(&opts);
        assert_eq!(
            url,
            "wss://10.0.0.1:10250/exec/default/web-0/app?output=1&error=1&command=cat&command=%2Fetc%2Fpasswd"
        );
    }

    #[test]
    fn interactive_url_sets_all_streams() {
        let client =
            KubeletClient::new("10.0.0.1", 10250, "tok", ClientConfig::default()).unwrap();
        let opts = ExecOptions::interactive("ns", "pod", "c0", vec!["/bin/sh".into()]);

        let url = client.build_exec_url(&opts);
        assert!(url.contains("input=1"));
        assert!(url.contains("output=1"));
        assert!(url.contains("error=1"));
        assert!(url.contains("tty=1"));
        assert!(url.ends_with("command=%2Fbin%2Fsh"));
    }
}
