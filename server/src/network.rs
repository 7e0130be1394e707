//! WebSocket transport feeding events into the dispatcher

use crate::config::InvocationSettings;
use crate::roster::ConnectionId;
use crate::router::{Context, Dispatcher, Event};
use crate::store::Store;
use crate::transport::ConnectionTable;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Accepts WebSocket clients and turns their traffic into events
pub struct WorldServer {
    listener: TcpListener,
    connections: Arc<ConnectionTable>,
    dispatcher: Arc<Dispatcher>,
}

impl WorldServer {
    pub async fn bind(
        addr: &str,
        store: Arc<dyn Store>,
        settings: InvocationSettings,
        carry_blocks: bool,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let connections = Arc::new(ConnectionTable::new());
        let context = Context {
            store,
            transport: connections.clone(),
            settings,
        };

        Ok(WorldServer {
            listener,
            connections,
            dispatcher: Arc::new(Dispatcher::new(context, carry_blocks)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn connections(&self) -> Arc<ConnectionTable> {
        Arc::clone(&self.connections)
    }

    /// Accept loop; runs until the listener fails
    pub async fn run(self) -> io::Result<()> {
        info!("Server started successfully");

        loop {
            let (stream, addr) = self.listener.accept().await?;
            let connections = Arc::clone(&self.connections);
            let dispatcher = Arc::clone(&self.dispatcher);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, connections, dispatcher).await {
                    warn!("Connection from {} ended with error: {}", addr, e);
                }
            });
        }
    }
}

/// Runs one event as its own task; events of a connection are not ordered
fn spawn_event(dispatcher: &Arc<Dispatcher>, event: Event) {
    let dispatcher = Arc::clone(dispatcher);
    tokio::spawn(async move {
        let ack = dispatcher.dispatch(event).await;
        debug!("Event acknowledged with {}", ack.status_code);
    });
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connections: Arc<ConnectionTable>,
    dispatcher: Arc<Dispatcher>,
) -> Result<(), WsError> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_write, mut ws_read) = ws_stream.split();

    let id = ConnectionId::generate();
    let mut outbound = connections.open(id.clone(), Some(addr)).await;

    let writer = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            if let Err(e) = ws_write.send(Message::Text(payload)).await {
                debug!("Writer stopped: {}", e);
                break;
            }
        }
        let _ = ws_write.close().await;
    });

    spawn_event(&dispatcher, Event::connect(id.clone()));

    let mut result = Ok(());
    while let Some(frame) = ws_read.next().await {
        match frame {
            Ok(Message::Text(text)) => spawn_event(&dispatcher, Event::frame(id.clone(), text)),
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => warn!("Ignoring binary frame from {}", id),
            Ok(_) => {}
            Err(e) => {
                error!("Error reading from {}: {}", id, e);
                result = Err(e);
                break;
            }
        }
    }

    connections.close(&id).await;
    writer.abort();
    spawn_event(&dispatcher, Event::disconnect(id));
    result
}
