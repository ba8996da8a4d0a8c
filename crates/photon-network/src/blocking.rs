//! Thread-per-connection server
//!
//! One accept loop, then for each connection a reader thread feeding
//! [`BroadcastService::handle_inbound`] and a writer thread draining the
//! peer's outbound queue.

use crate::codec::{read_frame, write_frame};
use crate::error::{accept_backoff, NetworkError, NetworkResult};
use crate::service::{BroadcastService, ServerConfig};
use crate::types::PeerId;
use bytes::Bytes;
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Stops a [`BlockingServer`] accept loop from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    stopped: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    fn new(local_addr: SocketAddr) -> Self {
        let mut wake_addr = local_addr;
        if wake_addr.ip().is_unspecified() {
            wake_addr.set_ip(match local_addr {
                SocketAddr::V4(_) => std::net::Ipv4Addr::LOCALHOST.into(),
                SocketAddr::V6(_) => std::net::Ipv6Addr::LOCALHOST.into(),
            });
        }
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
            wake_addr,
        }
    }

    /// Ask the accept loop to exit. Open connections keep running.
    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        // Unblock accept()
        let _ = TcpStream::connect(self.wake_addr);
    }

    /// Whether shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Blocking TCP server
pub struct BlockingServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    service: Arc<BroadcastService>,
    shutdown: ShutdownHandle,
}

impl BlockingServer {
    /// Bind the listening socket
    pub fn bind(config: ServerConfig) -> NetworkResult<Self> {
        let listener = TcpListener::bind(config.listen_addr).map_err(|source| NetworkError::Bind {
            addr: config.listen_addr,
            source,
        })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            service: Arc::new(BroadcastService::new(config)),
            shutdown: ShutdownHandle::new(local_addr),
        })
    }

    /// Bound address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared service
    pub fn service(&self) -> Arc<BroadcastService> {
        Arc::clone(&self.service)
    }

    /// Handle for stopping the accept loop
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Run the accept loop on the current thread until shutdown
    pub fn run(self) -> NetworkResult<()> {
        info!("Listening on {} (thread per connection)", self.local_addr);

        loop {
            let accepted = self.listener.accept();
            if self.shutdown.is_shutdown() {
                break;
            }
            match accepted {
                Ok((stream, addr)) => {
                    debug!("Incoming connection from {}", addr);
                    if let Err(e) = spawn_connection(Arc::clone(&self.service), stream, addr) {
                        warn!("Rejected connection from {}: {}", addr, e);
                    }
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                    if let Some(pause) = accept_backoff(&e) {
                        thread::sleep(pause);
                    }
                }
            }
        }

        info!("Server on {} stopped", self.local_addr);
        Ok(())
    }

    /// Run the accept loop on a background thread
    pub fn spawn(self) -> NetworkResult<thread::JoinHandle<NetworkResult<()>>> {
        let handle = thread::Builder::new()
            .name("photon-accept".into())
            .spawn(move || self.run())?;
        Ok(handle)
    }
}

/// Register the connection and start its reader and writer threads
fn spawn_connection(
    service: Arc<BroadcastService>,
    stream: TcpStream,
    addr: SocketAddr,
) -> NetworkResult<()> {
    stream.set_nodelay(true)?;
    let write_half = stream.try_clone()?;

    let (peer_id, outbound) = service.connect(addr)?;

    let spawned = thread::Builder::new()
        .name(format!("photon-write-{}", peer_id.as_u64()))
        .spawn(move || write_loop(peer_id, write_half, outbound))
        .and_then(|_| {
            let reader_service = Arc::clone(&service);
            thread::Builder::new()
                .name(format!("photon-conn-{}", peer_id.as_u64()))
                .spawn(move || read_loop(reader_service, peer_id, stream))
        });

    if let Err(e) = spawned {
        service.unregister(&peer_id);
        return Err(e.into());
    }
    Ok(())
}

fn read_loop(service: Arc<BroadcastService>, peer_id: PeerId, stream: TcpStream) {
    let max_frame_size = service.config().max_frame_size;
    let mut reader = BufReader::new(stream);

    loop {
        match read_frame(&mut reader, max_frame_size) {
            Ok(Some(payload)) => {
                if let Err(e) = service.handle_inbound(&peer_id, &payload) {
                    debug!("Ignoring message from {}: {}", peer_id, e);
                }
            }
            Ok(None) => {
                debug!("Peer {} closed the connection", peer_id);
                break;
            }
            Err(e) => {
                debug!("Read from {} failed: {}", peer_id, e);
                break;
            }
        }
    }

    service.unregister(&peer_id);
    let _ = reader.get_ref().shutdown(Shutdown::Both);
}

fn write_loop(peer_id: PeerId, mut stream: TcpStream, mut outbound: mpsc::Receiver<Bytes>) {
    // Ends when the service drops the peer's sender
    while let Some(frame) = outbound.blocking_recv() {
        if let Err(e) = write_frame(&mut stream, &frame) {
            debug!("Write to {} failed: {}", peer_id, e);
            break;
        }
    }
    let _ = stream.shutdown(Shutdown::Both);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_bind_ephemeral_port() {
        let server = BlockingServer::bind(test_config()).unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(server.service().peer_count(), 0);
    }

    #[test]
    fn test_bind_in_use() {
        let first = BlockingServer::bind(test_config()).unwrap();
        let config = ServerConfig {
            listen_addr: first.local_addr(),
            ..Default::default()
        };
        assert!(matches!(
            BlockingServer::bind(config),
            Err(NetworkError::Bind { .. })
        ));
    }

    #[test]
    fn test_shutdown_stops_accept_loop() {
        let server = BlockingServer::bind(test_config()).unwrap();
        let shutdown = server.shutdown_handle();
        let handle = server.spawn().unwrap();

        shutdown.shutdown();
        assert!(shutdown.is_shutdown());
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_wake_addr_for_unspecified_listener() {
        let handle = ShutdownHandle::new("0.0.0.0:4000".parse().unwrap());
        assert_eq!(handle.wake_addr.to_string(), "127.0.0.1:4000");
    }
}
