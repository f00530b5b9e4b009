use super::InboxSender;
use crate::config::ListenerConfig;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind udp socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("failed to configure udp socket: {0}")]
    Configure(#[from] std::io::Error),
    #[error("failed to build listener runtime: {0}")]
    Runtime(std::io::Error),
    #[error("failed to spawn listener thread: {0}")]
    Spawn(std::io::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerDiagnostics {
    pub datagrams_received: u64,
    pub bytes_received: u64,
    pub decode_failures: u64,
    pub receive_errors: u64,
}

#[derive(Clone, Default)]
pub struct ListenerMetricsHandle {
    inner: Arc<Mutex<ListenerDiagnostics>>,
}

impl ListenerMetricsHandle {
    pub fn snapshot(&self) -> ListenerDiagnostics {
        self.inner
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn update(&self, apply: impl FnOnce(&mut ListenerDiagnostics)) {
        if let Ok(mut guard) = self.inner.lock() {
            apply(&mut guard);
        }
    }
}

/// A bound UDP socket that has not started receiving yet.
pub struct UdpListener {
    socket: std::net::UdpSocket,
    local_addr: SocketAddr,
    sender: InboxSender,
    receive_timeout: Duration,
    max_datagram_bytes: usize,
    metrics: ListenerMetricsHandle,
}

impl UdpListener {
    pub fn bind(config: &ListenerConfig, sender: InboxSender) -> Result<Self, ListenerError> {
        let addr = config.socket_addr();
        let socket =
            std::net::UdpSocket::bind(addr).map_err(|source| ListenerError::Bind { addr, source })?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            sender,
            receive_timeout: config.receive_timeout(),
            max_datagram_bytes: config.max_datagram_bytes.max(1),
            metrics: ListenerMetricsHandle::default(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts the receive loop on a dedicated thread with its own runtime.
    pub fn spawn(self) -> Result<ListenerHandle, ListenerError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ListenerError::Runtime)?;
        let shutdown = CancellationToken::new();
        let metrics = self.metrics.clone();
        let local_addr = self.local_addr;
        let token = shutdown.clone();

        let thread = thread::Builder::new()
            .name("vrmate-listener".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    match UdpSocket::from_std(self.socket) {
                        Ok(socket) => {
                            let receiver = Receiver {
                                socket,
                                sender: self.sender,
                                receive_timeout: self.receive_timeout,
                                max_datagram_bytes: self.max_datagram_bytes,
                                metrics: self.metrics,
                            };
                            receiver.run(token).await;
                        }
                        Err(err) => {
                            log::error!("[listener] failed to register socket with runtime: {err}");
                        }
                    }
                });
            })
            .map_err(ListenerError::Spawn)?;

        log::info!("[listener] receiving on {local_addr}");
        Ok(ListenerHandle {
            shutdown,
            thread: Some(thread),
            metrics,
            local_addr,
        })
    }
}

struct Receiver {
    socket: UdpSocket,
    sender: InboxSender,
    receive_timeout: Duration,
    max_datagram_bytes: usize,
    metrics: ListenerMetricsHandle,
}

impl Receiver {
    async fn run(self, shutdown: CancellationToken) {
        let mut buffer = vec![0u8; self.max_datagram_bytes];
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    log::debug!("[listener] shutdown requested");
                    break;
                }
                result = tokio::time::timeout(self.receive_timeout, self.socket.recv_from(&mut buffer)) => {
                    match result {
                        Err(_) => {
                            log::trace!("[listener] receive timed out");
                        }
                        Ok(Ok((len, peer))) => {
                            if !self.deliver(&buffer[..len], peer) {
                                log::info!("[listener] inbox closed; stopping receive loop");
                                break;
                            }
                        }
                        Ok(Err(err)) => {
                            self.metrics.update(|m| m.receive_errors += 1);
                            log::warn!("[listener] receive error: {err}");
                        }
                    }
                }
            }
        }
    }

    /// Returns `false` once nobody is draining the inbox anymore.
    fn deliver(&self, bytes: &[u8], peer: SocketAddr) -> bool {
        self.metrics.update(|m| {
            m.datagrams_received += 1;
            m.bytes_received += bytes.len() as u64;
        });

        match std::str::from_utf8(bytes) {
            Ok(text) => {
                log::trace!("[listener] {} bytes from {peer}", bytes.len());
                self.sender.push(text)
            }
            Err(err) => {
                self.metrics.update(|m| m.decode_failures += 1);
                log::warn!(
                    "[listener] dropping {} byte datagram from {peer}: {err}",
                    bytes.len()
                );
                true
            }
        }
    }
}

/// Owner of the running receive loop. Dropping it stops the loop.
pub struct ListenerHandle {
    shutdown: CancellationToken,
    thread: Option<JoinHandle<()>>,
    metrics: ListenerMetricsHandle,
    local_addr: SocketAddr,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics_handle(&self) -> ListenerMetricsHandle {
        self.metrics.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|thread| !thread.is_finished())
            .unwrap_or(false)
    }

    /// Stops receiving. Messages already in the inbox stay there.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("[listener] receive thread panicked");
            }
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
