use std::future::Future;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tokio_util::codec::FramedRead;
use tracing::{debug, trace};

use crate::core::{Config, Error, Result};
use crate::decode::{decode_events, decode_status, UpsEvent, UpsStatus};
use crate::protocol::{encode_command, Frame, FrameCodec, EVENTS_COMMAND, STATUS_COMMAND};

/// Client for the apcupsd network information server
///
/// Every request dials a new connection which is closed once the response
/// has been read, so a client can be shared freely between tasks.
#[derive(Debug, Clone)]
pub struct NisClient {
    /// Address and port of the daemon
    address: String,
}

impl NisClient {
    /// Creates a client for the daemon at `address`
    pub fn new(address: impl Into<String>) -> Self {
        NisClient {
            address: address.into(),
        }
    }

    /// Creates a client from connection settings
    pub fn from_config(config: &Config) -> Self {
        NisClient::new(config.address.clone())
    }

    /// Returns the daemon address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sends `command` and returns the response lines in arrival order
    ///
    /// The deadline, if any, bounds the dial and the whole exchange after it.
    pub async fn request(&self, command: &str, deadline: Option<Instant>) -> Result<Vec<String>> {
        let stream = with_deadline(deadline, self.connect(), || {
            format!("connecting to {}", self.address)
        })
        .await?;
        debug!(address = %self.address, command, "connected to apcupsd");

        let lines = with_deadline(deadline, exchange(stream, command), || {
            format!("{} request to {}", command, self.address)
        })
        .await?;
        debug!(address = %self.address, command, lines = lines.len(), "request complete");

        Ok(lines)
    }

    /// Raw lines of the status report
    pub async fn status_raw(&self, deadline: Option<Instant>) -> Result<Vec<String>> {
        self.request(STATUS_COMMAND, deadline).await
    }

    /// Raw lines of the event log
    pub async fn events_raw(&self, deadline: Option<Instant>) -> Result<Vec<String>> {
        self.request(EVENTS_COMMAND, deadline).await
    }

    /// Fetches and decodes the status report
    pub async fn status(&self, deadline: Option<Instant>) -> Result<UpsStatus> {
        let lines = self.status_raw(deadline).await?;
        decode_status(&lines)
    }

    /// Fetches and decodes the event log
    pub async fn events(&self, deadline: Option<Instant>) -> Result<Vec<UpsEvent>> {
        let lines = self.events_raw(deadline).await?;
        decode_events(&lines)
    }

    async fn connect(&self) -> Result<TcpStream> {
        TcpStream::connect(self.address.as_str())
            .await
            .map_err(|e| Error::network(format!("Failed to connect to {}: {}", self.address, e)))
    }
}

/// Runs `fut`, failing with a timeout error once `deadline` passes
async fn with_deadline<T, F>(
    deadline: Option<Instant>,
    fut: F,
    what: impl FnOnce() -> String,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(deadline) => timeout_at(deadline, fut)
            .await
            .map_err(|_| Error::timeout(what()))?,
        None => fut.await,
    }
}

/// Writes one command frame and reads response frames until the daemon is done
///
/// The stream is consumed and dropped on every return path.
async fn exchange<S>(mut stream: S, command: &str) -> Result<Vec<String>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = encode_command(command)?;

    let written = stream
        .write(&request)
        .await
        .map_err(|e| Error::network(format!("Failed to send {} command: {}", command, e)))?;
    if written != request.len() {
        return Err(Error::protocol(format!(
            "short write cmd={} expected={} got={}",
            command,
            request.len(),
            written
        )));
    }
    stream
        .flush()
        .await
        .map_err(|e| Error::network(format!("Failed to send {} command: {}", command, e)))?;

    let mut frames = FramedRead::new(stream, FrameCodec::new());
    let mut lines = Vec::new();

    while let Some(frame) = frames.next().await {
        let frame = frame.map_err(|e| match e {
            Error::Io(e) => Error::network(format!("Failed to read {} response: {}", command, e)),
            other => other,
        })?;

        match frame {
            Frame::Line(line) => lines.push(line),
            Frame::End => {
                trace!(command, "end of response");
                break;
            }
        }
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio_test::io::Builder;

    fn frame(payload: &str) -> Vec<u8> {
        let mut out = (payload.len() as u16).to_be_bytes().to_vec();
        out.extend_from_slice(payload.as_bytes());
        out
    }

    fn response(lines: &[&str], terminated: bool) -> Vec<u8> {
        let mut out: Vec<u8> = lines.iter().flat_map(|l| frame(l)).collect();
        if terminated {
            out.extend_from_slice(b"\x00\x00");
        }
        out
    }

    /// Accepts a single connection, reads the request and replies with `response`
    async fn serve_once(response: Vec<u8>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 8];
            socket.read_exact(&mut request).await.unwrap();
            socket.write_all(&response).await.unwrap();
        });

        addr
    }

    #[tokio::test]
    async fn test_exchange_terminated_response() {
        let mock = Builder::new()
            .write(b"\x00\x06status")
            .read(&response(&["STATUS   : ONLINE", "LOADPCT  : 9.0 Percent"], true))
            .build();

        let lines = exchange(mock, "status").await.unwrap();
        assert_eq!(lines, vec!["STATUS   : ONLINE", "LOADPCT  : 9.0 Percent"]);
    }

    #[tokio::test]
    async fn test_exchange_ragged_end() {
        let mock = Builder::new()
            .write(b"\x00\x06events")
            .read(&response(&["one", "two", "three"], false))
            .build();

        let lines = exchange(mock, "events").await.unwrap();
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_exchange_frames_split_across_reads() {
        let bytes = response(&["HOSTNAME : nas", "STATUS   : ONLINE"], true);
        let mock = Builder::new()
            .write(b"\x00\x06status")
            .read(&bytes[..3])
            .read(&bytes[3..20])
            .read(&bytes[20..])
            .build();

        let lines = exchange(mock, "status").await.unwrap();
        assert_eq!(lines, vec!["HOSTNAME : nas", "STATUS   : ONLINE"]);
    }

    #[tokio::test]
    async fn test_exchange_short_write() {
        let mock = Builder::new().write(b"\x00\x06st").build();

        let err = exchange(mock, "status").await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(
            err.to_string(),
            "Protocol error: short write cmd=status expected=8 got=4"
        );
    }

    #[tokio::test]
    async fn test_exchange_write_error() {
        let mock = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();

        let err = exchange(mock, "status").await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_exchange_read_error_discards_lines() {
        let mock = Builder::new()
            .write(b"\x00\x06status")
            .read(&frame("STATUS   : ONLINE"))
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let err = exchange(mock, "status").await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert!(err.to_string().contains("reset"));
    }

    #[tokio::test]
    async fn test_exchange_truncated_payload() {
        let mut bytes = response(&["STATUS   : ONLINE"], false);
        bytes.extend_from_slice(b"\x00\x20LINEV");
        let mock = Builder::new().write(b"\x00\x06status").read(&bytes).build();

        let err = exchange(mock, "status").await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_exchange_oversized_frame() {
        let long = "x".repeat(300);
        let mock = Builder::new()
            .write(b"\x00\x06events")
            .read(&response(&[long.as_str(), "after"], true))
            .build();

        let lines = exchange(mock, "events").await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 255);
        assert_eq!(lines[1], "after");
    }

    #[tokio::test]
    async fn test_request_three_frames_then_close() {
        let addr = serve_once(response(&["A: 1", "B: 2", "C: 3"], false)).await;
        let client = NisClient::new(addr.to_string());

        let lines = client.request("status", None).await.unwrap();
        assert_eq!(lines, vec!["A: 1", "B: 2", "C: 3"]);
    }

    #[tokio::test]
    async fn test_status_over_tcp() {
        let addr = serve_once(response(
            &[
                "STATUS   : ONLINE",
                "TIMELEFT : 12.5 Minutes",
                "BCHARGE  : 100.0 Percent",
            ],
            true,
        ))
        .await;
        let client = NisClient::new(addr.to_string());

        let deadline = Instant::now() + Duration::from_secs(5);
        let status = client.status(Some(deadline)).await.unwrap();
        assert_eq!(status.status, "ONLINE");
        assert_eq!(status.time_left, Duration::from_secs(750));
    }

    #[tokio::test]
    async fn test_events_over_tcp() {
        let addr = serve_once(response(
            &["2021-03-01 08:15:30 -0500  Power failure."],
            true,
        ))
        .await;
        let client = NisClient::from_config(&Config::new(addr.to_string()));

        let events = client.events(None).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "Power failure.");
    }

    #[tokio::test]
    async fn test_status_decode_error_surfaces() {
        let addr = serve_once(response(&["TIMELEFT : 12.0 fortnights"], true)).await;
        let client = NisClient::new(addr.to_string());

        let err = client.status(None).await.unwrap_err();
        assert!(err.is_decode());
    }

    #[tokio::test]
    async fn test_request_deadline_exceeded() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let client = NisClient::new(addr.to_string());
        let deadline = Instant::now() + Duration::from_millis(100);
        let err = client.request("status", Some(deadline)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_request_dial_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = NisClient::new(addr.to_string());
        let err = client.request("status", None).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_concurrent_requests_use_own_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for n in 0..2 {
                let (mut socket, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    let mut request = [0u8; 8];
                    socket.read_exact(&mut request).await.unwrap();
                    let line = format!("CONN: {}", n);
                    socket
                        .write_all(&response(&[line.as_str()], true))
                        .await
                        .unwrap();
                });
            }
        });

        let client = NisClient::new(addr.to_string());
        let (a, b) = tokio::join!(
            client.request("status", None),
            client.request("events", None)
        );

        let mut lines = vec![a.unwrap(), b.unwrap()];
        lines.sort();
        assert_eq!(lines, vec![vec!["CONN: 0"], vec!["CONN: 1"]]);
    }
}
