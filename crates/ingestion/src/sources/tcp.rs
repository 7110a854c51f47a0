//! Serial-over-TCP byte source
//!
//! Radars are commonly exposed through a serial-to-network bridge in raw
//! mode. The connection is (re)established lazily inside `read`, so a
//! bridge that restarts only costs a few error log lines.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use contracts::ByteSource;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info};

pub struct TcpByteSource {
    address: String,
    stream: Option<TcpStream>,
    reconnect_backoff: Duration,
    last_attempt: Option<Instant>,
}

impl TcpByteSource {
    pub fn new(address: impl Into<String>, reconnect_backoff: Duration) -> Self {
        Self {
            address: address.into(),
            stream: None,
            reconnect_backoff,
            last_attempt: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Connect if needed. `Ok(false)` means still inside the backoff window.
    async fn ensure_connected(&mut self, budget: Duration) -> io::Result<bool> {
        if self.stream.is_some() {
            return Ok(true);
        }

        if let Some(last) = self.last_attempt {
            let ready_at = last + self.reconnect_backoff;
            let now = Instant::now();
            if ready_at > now {
                sleep((ready_at - now).min(budget)).await;
                return Ok(false);
            }
        }

        self.last_attempt = Some(Instant::now());
        let stream = timeout(budget, TcpStream::connect(&self.address))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        stream.set_nodelay(true)?;
        info!(address = %self.address, "radar stream connected");
        self.stream = Some(stream);
        Ok(true)
    }
}

impl ByteSource for TcpByteSource {
    fn describe(&self) -> String {
        format!("tcp({})", self.address)
    }

    async fn read(&mut self, buf: &mut BytesMut, budget: Duration) -> io::Result<usize> {
        if !self.ensure_connected(budget).await? {
            return Ok(0);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(0);
        };

        buf.reserve(4096);
        match timeout(budget, stream.read_buf(buf)).await {
            Err(_) => Ok(0),
            Ok(Ok(0)) => {
                debug!(address = %self.address, "radar stream closed by peer");
                self.stream = None;
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "radar stream closed by peer",
                ))
            }
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => {
                self.stream = None;
                Err(e)
            }
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        if let Some(mut stream) = self.stream.take() {
            use tokio::io::AsyncWriteExt;
            stream.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn reads_bytes_from_bridge() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(&[1, 2, 3, 4]).await.unwrap();
        });

        let mut source = TcpByteSource::new(addr.to_string(), Duration::from_millis(10));
        let mut buf = BytesMut::new();
        let mut total = 0;
        for _ in 0..20 {
            match source.read(&mut buf, Duration::from_millis(200)).await {
                Ok(n) => total += n,
                Err(_) => break,
            }
            if total >= 4 {
                break;
            }
        }
        assert_eq!(&buf[..], &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn peer_close_is_an_error_then_reconnects_lazily() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            drop(sock);
        });

        let mut source = TcpByteSource::new(addr.to_string(), Duration::from_millis(10));
        let mut buf = BytesMut::new();
        let mut saw_eof = false;
        for _ in 0..10 {
            if let Err(e) = source.read(&mut buf, Duration::from_millis(200)).await {
                assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
                saw_eof = true;
                break;
            }
        }
        assert!(saw_eof);
        assert!(!source.is_connected());
    }

    #[tokio::test]
    async fn refused_connection_surfaces_as_io_error() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let mut source = TcpByteSource::new(format!("127.0.0.1:{port}"), Duration::from_secs(5));
        let mut buf = BytesMut::new();
        assert!(source.read(&mut buf, Duration::from_millis(200)).await.is_err());
        // Second attempt is inside the backoff window
        assert_eq!(
            source.read(&mut buf, Duration::from_millis(5)).await.unwrap(),
            0
        );
    }
}
