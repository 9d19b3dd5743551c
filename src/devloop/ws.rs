//! WebSocket server for live reload notifications.

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tungstenite::{Message, WebSocket};

use super::message::ReloadMessage;

/// Maximum port retry attempts when the base port is taken.
const MAX_PORT_RETRIES: u16 = 10;

/// Broadcast-only WebSocket endpoint; clients connect from the injected
/// reload script.
pub struct WsServer {
    pub port: u16,
    clients: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
}

impl WsServer {
    /// Bind (retrying on busy ports) and start the acceptor thread.
    pub fn start(base_port: u16) -> Result<Self> {
        let (listener, port) = try_bind_port(base_port, MAX_PORT_RETRIES)?;
        let clients: Arc<Mutex<Vec<WebSocket<TcpStream>>>> = Arc::new(Mutex::new(Vec::new()));

        let accept_clients = clients.clone();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else {
                    continue;
                };
                crate::debug!("reload"; "client connected: {:?}", stream.peer_addr());
                match tungstenite::accept(stream) {
                    Ok(mut socket) => {
                        let _ = socket.send(Message::text(ReloadMessage::connected().to_json()));
                        accept_clients.lock().push(socket);
                    }
                    Err(e) => {
                        crate::debug!("reload"; "handshake failed: {e}");
                    }
                }
            }
        });

        Ok(Self { port, clients })
    }

    /// Send a message to every connected client, pruning dead connections.
    pub fn broadcast(&self, message: &ReloadMessage) {
        let payload = message.to_json();
        let mut clients = self.clients.lock();
        clients.retain_mut(|client| {
            client.send(Message::text(payload.clone())).is_ok()
        });
        crate::debug!("reload"; "broadcast to {} client(s)", clients.len());
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }
}

/// Try binding to port, retrying with incremented ports when in use.
fn try_bind_port(base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(("127.0.0.1", port)) {
            Ok(listener) => {
                let actual = listener.local_addr()?.port();
                return Ok((listener, actual));
            }
            Err(e) => {
                last_error = Some(e);
            }
        }
    }

    Err(anyhow::anyhow!(
        "failed to bind WebSocket server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
