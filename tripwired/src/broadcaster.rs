//! Notification Broadcaster: WebSocket fan-out for execution events
//!
//! Maintains the set of connected observers on a dedicated port and pushes
//! one text frame per notification. Delivery is best-effort and
//! at-most-once: a slow or disconnected observer is dropped without
//! blocking the publisher or the other observers. Inbound client frames
//! carry no protocol semantics; they are logged and ignored.
//!
//! The broadcaster is an injected component with an explicit lifecycle:
//! created at startup, torn down via its cancellation token.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tripwire_domain::{ExecutionEvent, Order};

use crate::error::{DaemonError, DaemonResult};
use crate::event_bus::{DaemonEvent, EventBus};

// =============================================================================
// Notifications
// =============================================================================

/// Payloads pushed to connected observers, one JSON text frame each.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Notification {
    /// Sent once to every new connection
    Welcome {
        /// Greeting line
        message: String,
    },
    /// A new order entered the store
    OrderCreated {
        /// The created order
        order: Order,
    },
    /// An order fired
    Execution {
        /// The confirmed execution
        #[serde(flatten)]
        inner: ExecutionEvent,
    },
}

impl Notification {
    fn welcome() -> Self {
        Notification::Welcome {
            message: "Welcome to the tripwire notification stream".to_string(),
        }
    }

    fn to_frame(&self) -> Message {
        // Serialization of these payloads cannot fail
        Message::Text(serde_json::to_string(self).unwrap_or_default())
    }
}

// =============================================================================
// Broadcaster
// =============================================================================

/// WebSocket fan-out server for daemon notifications.
pub struct Broadcaster {
    /// Host to bind
    host: String,
    /// Port to bind (0 lets the OS pick)
    port: u16,
    /// Connected observers (client id -> outbound queue)
    clients: RwLock<HashMap<u64, mpsc::UnboundedSender<Message>>>,
    /// Client id sequence
    next_client_id: AtomicU64,
    /// Source of notifications
    event_bus: Arc<EventBus>,
    /// Shutdown token
    shutdown_token: CancellationToken,
}

impl Broadcaster {
    /// Create a new broadcaster.
    pub fn new(host: String, port: u16, event_bus: Arc<EventBus>) -> Self {
        Self {
            host,
            port,
            clients: RwLock::new(HashMap::new()),
            next_client_id: AtomicU64::new(0),
            event_bus,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Bind the listener and start the accept and forwarder tasks.
    ///
    /// Returns the bound address and the accept loop's JoinHandle.
    pub async fn start(self: Arc<Self>) -> DaemonResult<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DaemonError::Broadcast(format!("Failed to bind {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| DaemonError::Broadcast(e.to_string()))?;

        info!(%local_addr, "Notification broadcaster started");

        // Forwarder: event bus -> connected observers
        let forwarder = self.clone();
        tokio::spawn(async move {
            let mut receiver = forwarder.event_bus.subscribe();
            loop {
                tokio::select! {
                    _ = forwarder.shutdown_token.cancelled() => break,
                    event = receiver.recv() => match event {
                        Some(Ok(DaemonEvent::Executed(execution))) => {
                            forwarder
                                .publish(&Notification::Execution { inner: execution })
                                .await;
                        }
                        Some(Ok(DaemonEvent::OrderCreated(order))) => {
                            forwarder.publish(&Notification::OrderCreated { order }).await;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(lag_msg)) => {
                            warn!(%lag_msg, "Broadcaster receiver lagged");
                        }
                        None => break,
                    }
                }
            }
            debug!("Broadcaster forwarder stopped");
        });

        // Accept loop
        let acceptor = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = acceptor.shutdown_token.cancelled() => {
                        info!("Broadcaster received shutdown signal");
                        break;
                    }
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            let conn = acceptor.clone();
                            tokio::spawn(async move {
                                conn.handle_connection(stream, peer).await;
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
            info!("Notification broadcaster stopped");
        });

        Ok((local_addr, handle))
    }

    /// Serve one observer connection until it disconnects.
    async fn handle_connection(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!(%peer, error = %e, "WebSocket handshake failed");
                return;
            }
        };

        info!(%peer, "Observer connected");

        let (mut write, mut read) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        // Greet before the observer is eligible for fan-out
        let _ = tx.send(Notification::welcome().to_frame());

        let client_id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        self.clients.write().await.insert(client_id, tx);

        // Writer: drain the outbound queue into the socket. A failed send
        // means the observer is gone; the read loop below will notice too.
        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if write.send(frame).await.is_err() {
                    break;
                }
            }
        });

        // Reader: inbound frames have no protocol semantics
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    info!(%peer, %text, "Received observer message");
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(%peer, error = %e, "Observer read error");
                    break;
                }
            }
        }

        // Deregister; dropping the sender ends the writer task
        self.clients.write().await.remove(&client_id);
        writer.abort();
        info!(%peer, "Observer disconnected");
    }

    /// Push a notification to every connected observer.
    ///
    /// Never blocks: each observer has an unbounded outbound queue, and a
    /// failed enqueue (observer gone) removes only that observer.
    pub async fn publish(&self, notification: &Notification) {
        let frame = notification.to_frame();

        let mut stale = Vec::new();
        {
            let clients = self.clients.read().await;
            for (client_id, tx) in clients.iter() {
                if tx.send(frame.clone()).is_err() {
                    stale.push(*client_id);
                }
            }
        }

        if !stale.is_empty() {
            let mut clients = self.clients.write().await;
            for client_id in stale {
                clients.remove(&client_id);
                debug!(client_id, "Removed stale observer");
            }
        }
    }

    /// Number of currently connected observers.
    pub async fn connected_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Stop the accept loop and the forwarder.
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }
}

// =============================================================================
// Tests
// =============================================================================
