//! TCP peer connections — the `PeerConnection` handed to the registry.
//!
//! Writes are queued to a per-connection writer task so `write` never
//! blocks the caller. Keep-alive is set through a duplicate of the socket
//! descriptor taken before the stream is split.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use socket2::{SockRef, Socket, TcpKeepalive};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use iris_services::{ConnectionError, PeerConnection};

enum Outbound {
    Data(Bytes),
    Close,
}

pub struct TcpConnection {
    remote: SocketAddr,
    outbound: mpsc::UnboundedSender<Outbound>,
    socket: Socket,
    closed: AtomicBool,
}

impl TcpConnection {
    /// Take ownership of the write half and start its writer task.
    ///
    /// `socket` must refer to the same TCP socket as `writer`; it is only
    /// used for socket options.
    pub fn spawn(remote: SocketAddr, writer: OwnedWriteHalf, socket: Socket) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(remote, writer, rx));

        Arc::new(Self {
            remote,
            outbound: tx,
            socket,
            closed: AtomicBool::new(false),
        })
    }

    /// Duplicate the descriptor of `stream` for later socket-option calls.
    pub fn option_handle(stream: &TcpStream) -> std::io::Result<Socket> {
        SockRef::from(stream).try_clone()
    }

    /// Flush queued writes and shut down the write side. Only the first
    /// call has any effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.outbound.send(Outbound::Close);
    }
}

impl PeerConnection for TcpConnection {
    fn write(&self, data: Bytes) -> Result<(), ConnectionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConnectionError::Closed);
        }
        self.outbound
            .send(Outbound::Data(data))
            .map_err(|_| ConnectionError::Closed)
    }

    fn set_keep_alive(&self, enabled: bool, interval: Duration) -> Result<(), ConnectionError> {
        if !enabled {
            self.socket.set_keepalive(false)?;
            return Ok(());
        }
        // TCP keepalive timers have one-second granularity. The first probe
        // and every repeat use the same period.
        let period = interval.max(Duration::from_secs(1));
        let keepalive = TcpKeepalive::new().with_time(period).with_interval(period);
        self.socket.set_tcp_keepalive(&keepalive)?;
        tracing::debug!(
            remote = %self.remote,
            period_ms = period.as_millis() as u64,
            "tcp keep-alive enabled"
        );
        Ok(())
    }
}

async fn write_loop(
    remote: SocketAddr,
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            Outbound::Data(bytes) => {
                if let Err(e) = writer.write_all(&bytes).await {
                    tracing::warn!(%remote, error = %e, "write failed, stopping writer");
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    if let Err(e) = writer.shutdown().await {
        tracing::trace!(%remote, error = %e, "shutdown after close");
    }
}
