//! Single-threaded event-loop server
//!
//! Meant to run on a tokio `current_thread` runtime: every connection is a
//! task, and tasks interleave only where they await a frame or a send.

use crate::codec::FrameCodec;
use crate::error::{accept_backoff, NetworkError, NetworkResult};
use crate::service::{BroadcastService, ServerConfig};
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

/// Event-loop TCP server
pub struct EventLoopServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    service: Arc<BroadcastService>,
}

impl EventLoopServer {
    /// Bind the listening socket
    pub async fn bind(config: ServerConfig) -> NetworkResult<Self> {
        let listener = TcpListener::bind(config.listen_addr)
            .await
            .map_err(|source| NetworkError::Bind {
                addr: config.listen_addr,
                source,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            service: Arc::new(BroadcastService::new(config)),
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

    /// Accept connections until `shutdown` turns true or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> NetworkResult<()> {
        info!("Listening on {} (event loop)", self.local_addr);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("Incoming connection from {}", addr);
                        let service = Arc::clone(&self.service);
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(service, stream, addr).await {
                                warn!("Connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                        if let Some(pause) = accept_backoff(&e) {
                            tokio::time::sleep(pause).await;
                        }
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Server on {} stopped", self.local_addr);
        Ok(())
    }
}

/// Build a `current_thread` runtime, bind, and serve until `shutdown`
/// completes. Connections still open at that point are dropped with the
/// runtime.
pub fn run_current_thread<F>(config: ServerConfig, shutdown: F) -> NetworkResult<()>
where
    F: Future<Output = ()>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let server = EventLoopServer::bind(config).await?;
        let (stop_tx, stop_rx) = watch::channel(false);

        let serving = server.run(stop_rx);
        tokio::pin!(serving);
        tokio::select! {
            result = &mut serving => return result,
            _ = shutdown => {
                debug!("Shutdown requested");
                let _ = stop_tx.send(true);
            }
        }
        serving.await
    })
}

/// Drive one connection: inbound frames go to the service, queued frames go
/// out on the socket.
async fn serve_connection(
    service: Arc<BroadcastService>,
    stream: TcpStream,
    addr: SocketAddr,
) -> NetworkResult<()> {
    stream.set_nodelay(true)?;
    let (peer_id, mut outbound) = service.connect(addr)?;
    let mut framed = Framed::new(stream, FrameCodec::new(service.config().max_frame_size));

    let result = loop {
        tokio::select! {
            inbound = framed.next() => match inbound {
                Some(Ok(payload)) => {
                    if let Err(e) = service.handle_inbound(&peer_id, &payload) {
                        debug!("Ignoring message from {}: {}", peer_id, e);
                    }
                }
                Some(Err(e)) => break Err(e),
                None => {
                    debug!("Peer {} closed the connection", peer_id);
                    break Ok(());
                }
            },
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = framed.send(frame).await {
                        break Err(e);
                    }
                }
                // Dropped by the service after a failed delivery
                None => break Ok(()),
            },
        }
    };

    service.unregister(&peer_id);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{read_frame, write_frame};
    use crate::types::{ClientMessage, ServerMessage};
    use std::time::Duration;

    fn test_config() -> ServerConfig {
        ServerConfig {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = EventLoopServer::bind(test_config()).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(server.service().peer_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_signal() {
        let server = EventLoopServer::bind(test_config()).await.unwrap();
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(server.run(rx));

        tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_sender_stops_server() {
        let server = EventLoopServer::bind(test_config()).await.unwrap();
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(server.run(rx));

        drop(tx);
        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_current_thread_round_trip() {
        // Server on its own single-threaded runtime, blocking client here
        let (tx, rx) = watch::channel(false);
        let (addr_tx, addr_rx) = std::sync::mpsc::channel();

        let server_thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let server = EventLoopServer::bind(test_config()).await.unwrap();
                addr_tx.send(server.local_addr()).unwrap();
                server.run(rx).await
            })
        });

        let addr = addr_rx.recv().unwrap();
        let mut stream = std::net::TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        let snapshot = read_frame(&mut stream, 1024).unwrap().unwrap();
        assert_eq!(
            ServerMessage::decode(&snapshot).unwrap(),
            ServerMessage::History { messages: vec![] }
        );

        let msg = ClientMessage::message("abc", None).encode().unwrap();
        write_frame(&mut stream, &msg).unwrap();
        let req = ClientMessage::RequestHistory.encode().unwrap();
        write_frame(&mut stream, &req).unwrap();

        let reply = read_frame(&mut stream, 1024).unwrap().unwrap();
        match ServerMessage::decode(&reply).unwrap() {
            ServerMessage::History { messages } => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].hash.to_hex(), "b13180300000000000000000b1318030");
            }
            other => panic!("expected history, got {:?}", other),
        }

        tx.send(true).unwrap();
        assert!(server_thread.join().unwrap().is_ok());
    }

    #[test]
    fn test_run_current_thread_until_shutdown() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server_thread = std::thread::spawn(move || {
            run_current_thread(test_config(), async move {
                let _ = rx.await;
            })
        });

        tx.send(()).unwrap();
        assert!(server_thread.join().unwrap().is_ok());
    }

    #[test]
    fn test_run_current_thread_bind_error() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = ServerConfig {
            listen_addr: taken.local_addr().unwrap(),
            ..Default::default()
        };
        let result = run_current_thread(config, std::future::pending());
        assert!(matches!(result, Err(NetworkError::Bind { .. })));
    }
}
