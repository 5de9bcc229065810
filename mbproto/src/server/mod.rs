use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tracing::Instrument;

use crate::address::AddressLimits;
use crate::decode::DecodeLevel;

pub(crate) mod handler;
pub(crate) mod rest;
pub(crate) mod session;

pub use handler::*;
pub use rest::*;
pub use session::*;

/// A handle to the server async task. The task is shutdown when the handle is dropped.
#[derive(Debug)]
pub struct ServerHandle {
    _tx: tokio::sync::mpsc::Sender<()>,
    local_addr: SocketAddr,
}

impl ServerHandle {
    pub(crate) fn new(tx: tokio::sync::mpsc::Sender<()>, local_addr: SocketAddr) -> Self {
        Self {
            _tx: tx,
            local_addr,
        }
    }

    /// address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Spawns a TCP server task onto the runtime. This method can only
/// be called from within the runtime context.
///
/// Each incoming connection will spawn a new [`ServerSession`] that executes
/// requests with a clone of `handler`.
///
/// * `max_sessions` - Maximum number of concurrent sessions, the oldest is closed beyond it
/// * `addr` - A socket address to bind to
/// * `handler` - Executes requests, usually a [`crate::table::ModbusMemory`]
/// * `limits` - Address maxima used to validate requests
/// * `decode` - Decode log level
pub async fn spawn_tcp_server_task<H>(
    max_sessions: usize,
    addr: SocketAddr,
    handler: H,
    limits: AddressLimits,
    decode: DecodeLevel,
) -> Result<ServerHandle, std::io::Error>
where
    H: RequestHandler + Clone,
{
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    let (tx, rx) = tokio::sync::mpsc::channel(1);
    let mut task = ServerTask {
        listener,
        handler,
        limits,
        tracker: SessionTracker::wrapped(max_sessions),
        decode,
    };
    tokio::spawn(async move {
        task.run(rx)
            .instrument(tracing::info_span!("Modbus-Server-TCP", "listen" = ?local_addr))
            .await
    });

    Ok(ServerHandle::new(tx, local_addr))
}

struct SessionTracker {
    max: usize,
    id: u64,
    sessions: BTreeMap<u64, tokio::sync::mpsc::Sender<()>>,
}

type SessionTrackerWrapper = Arc<Mutex<SessionTracker>>;

impl SessionTracker {
    fn wrapped(max: usize) -> SessionTrackerWrapper {
        Arc::new(Mutex::new(Self {
            max,
            id: 0,
            sessions: BTreeMap::new(),
        }))
    }

    fn add(&mut self, sender: tokio::sync::mpsc::Sender<()>) -> u64 {
        if self.sessions.len() >= self.max {
            if let Some((&id, _)) = self.sessions.first_key_value() {
                tracing::warn!("exceeded max connections, closing oldest session: {}", id);
                // dropping the sender stops the session task
                self.sessions.remove(&id);
            }
        }

        let id = self.id;
        self.id += 1;
        self.sessions.insert(id, sender);
        id
    }

    fn remove(&mut self, id: u64) {
        self.sessions.remove(&id);
    }
}

struct ServerTask<H> {
    listener: TcpListener,
    handler: H,
    limits: AddressLimits,
    tracker: SessionTrackerWrapper,
    decode: DecodeLevel,
}

impl<H> ServerTask<H>
where
    H: RequestHandler + Clone,
{
    async fn run(&mut self, mut shutdown: tokio::sync::mpsc::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("server shutdown");
                    return;
                }
                result = self.listener.accept() => {
                    match result {
                        Err(err) => {
                            tracing::error!("error accepting connection: {}", err);
                            return;
                        }
                        Ok((socket, addr)) => self.handle(socket, addr),
                    }
                }
            }
        }
    }

    fn handle(&self, socket: TcpStream, addr: SocketAddr) {
        let mut session = ServerSession::new(
            socket,
            self.handler.clone(),
            self.limits,
            self.decode,
        );
        let tracker = self.tracker.clone();
        let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);

        let id = self.tracker.lock().add(tx);

        tracing::info!("accepted connection {} from: {}", id, addr);

        tokio::spawn(
            async move {
                tokio::select! {
                    result = session.run() => {
                        if let Err(err) = result {
                            tracing::info!("session closed: {}", err);
                        }
                    }
                    _ = rx.recv() => {
                        tracing::info!("session closed by server");
                    }
                }
                tracker.lock().remove(id);
            }
            .instrument(tracing::info_span!("Session", "remote" = ?addr)),
        );
    }
}
