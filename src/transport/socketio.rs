//! Socket.IO client transport over tokio-tungstenite

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, trace, warn};

use crate::core::{CONNECTION_EVENT, DISCONNECTION_EVENT, Error, Payload, Result};
use crate::transport::packet::{self, EnginePacket, SocketPacket};
use crate::transport::{Dialer, Handler, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Handlers = RwLock<HashMap<String, Handler>>;

enum Command {
    Frame(String),
    Heartbeat(Duration),
    Close,
}

/// State shared between the handle and its reader task
struct Shared {
    handlers: Handlers,
    closed: AtomicBool,
    acknowledged: AtomicBool,
}

impl Shared {
    fn dispatch(&self, event: &str, payload: Payload) {
        // Clone out of the lock: handlers may call back into the transport.
        let handler = self.handlers.read().get(event).cloned();
        match handler {
            Some(handler) => handler(payload),
            None => trace!("No handler for \"{}\"", event),
        }
    }
}

/// Socket.IO connection on the default namespace
pub struct SocketIoTransport {
    shared: Arc<Shared>,
    outgoing: mpsc::UnboundedSender<Command>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SocketIoTransport {
    pub async fn dial(endpoint: &str, ping_override: Option<Duration>) -> Result<Self> {
        info!("Connecting to WebSocket: {}", endpoint);

        let (ws_stream, _) = connect_async(endpoint).await?;
        let (write, read) = ws_stream.split();

        let shared = Arc::new(Shared {
            handlers: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            acknowledged: AtomicBool::new(false),
        });
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(write_loop(write, rx, ping_override));
        let reader = tokio::spawn(read_loop(read, shared.clone(), tx.clone()));

        Ok(Self {
            shared,
            outgoing: tx,
            reader: Mutex::new(Some(reader)),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl Transport for SocketIoTransport {
    fn on(&self, event: &str, handler: Handler) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.shared.handlers.write().insert(event.to_string(), handler.clone());

        // The connect packet may have raced ahead of this registration.
        if event == CONNECTION_EVENT && self.shared.acknowledged.load(Ordering::Acquire) {
            handler(Value::Null);
        }
        Ok(())
    }

    fn emit(&self, event: &str, payload: &Payload) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let frame = packet::encode_event(event, payload)?;
        self.outgoing
            .send(Command::Frame(frame))
            .map_err(|_| Error::Send("writer task has stopped".to_string()))
    }

    fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.handlers.write().clear();
        let _ = self.outgoing.send(Command::Close);
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        debug!("Socket.IO transport closed");
    }
}

impl Drop for SocketIoTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn write_loop(
    mut write: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    ping_override: Option<Duration>,
) {
    let mut heartbeat: Option<Interval> = None;

    loop {
        let cmd = tokio::select! {
            cmd = rx.recv() => cmd,
            _ = tick(&mut heartbeat) => Some(Command::Frame(packet::PING.to_string())),
        };

        match cmd {
            Some(Command::Frame(text)) => {
                trace!("→ {}", text);
                if let Err(e) = write.send(Message::Text(text)).await {
                    warn!("WebSocket write failed: {}", e);
                    break;
                }
            }
            Some(Command::Heartbeat(period)) => {
                let period = ping_override.unwrap_or(period);
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                heartbeat = Some(interval);
                debug!("Heartbeat every {:?}", period);
            }
            Some(Command::Close) | None => {
                let _ = write.send(Message::Text(packet::SOCKET_DISCONNECT.to_string())).await;
                let _ = write.send(Message::Close(None)).await;
                let _ = write.close().await;
                break;
            }
        }
    }
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn read_loop(
    mut read: SplitStream<WsStream>,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
) {
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => match packet::decode(&text) {
                Ok(incoming) => handle_packet(incoming, &shared, &commands),
                Err(e) => warn!("Dropping malformed packet: {}", e),
            },
            Ok(Message::Close(frame)) => {
                info!("WebSocket closed by remote: {:?}", frame);
                break;
            }
            Err(e) => {
                if !shared.closed.load(Ordering::Acquire) {
                    error!("WebSocket error: {}", e);
                }
                break;
            }
            _ => {}
        }
    }

    if !shared.closed.swap(true, Ordering::AcqRel) {
        shared.dispatch(DISCONNECTION_EVENT, Value::Null);
        shared.handlers.write().clear();
        let _ = commands.send(Command::Close);
    }
}

fn handle_packet(incoming: EnginePacket, shared: &Shared, commands: &mpsc::UnboundedSender<Command>) {
    match incoming {
        EnginePacket::Open(handshake) => {
            debug!("Engine.IO handshake sid={}", handshake.sid);
            let _ = commands.send(Command::Heartbeat(Duration::from_millis(handshake.ping_interval)));
        }
        EnginePacket::Ping(data) => {
            let _ = commands.send(Command::Frame(packet::encode_pong(&data)));
        }
        EnginePacket::Pong(_) => trace!("pong"),
        EnginePacket::Close => shared.dispatch(DISCONNECTION_EVENT, Value::Null),
        EnginePacket::Message(SocketPacket::Connect { namespace }) => {
            debug!("Socket.IO connected to namespace {}", namespace);
            shared.acknowledged.store(true, Ordering::Release);
            shared.dispatch(CONNECTION_EVENT, Value::Null);
        }
        EnginePacket::Message(SocketPacket::Disconnect { .. }) => {
            shared.dispatch(DISCONNECTION_EVENT, Value::Null);
        }
        EnginePacket::Message(SocketPacket::Event { name, args, .. }) => {
            let payload = args.into_iter().next().unwrap_or(Value::Null);
            shared.dispatch(&name, payload);
        }
        EnginePacket::Message(SocketPacket::Ack { id, .. }) => {
            debug!("Ignoring ack {:?}", id);
        }
        EnginePacket::Message(SocketPacket::Error { data, .. }) => {
            warn!("Socket.IO error packet: {}", data);
        }
        EnginePacket::Upgrade | EnginePacket::Noop => {}
    }
}

/// Production dialer
#[derive(Debug, Clone, Default)]
pub struct SocketIoDialer {
    ping_interval: Option<Duration>,
}

impl SocketIoDialer {
    pub fn new(ping_interval: Option<Duration>) -> Self {
        Self { ping_interval }
    }
}

#[async_trait]
impl Dialer for SocketIoDialer {
    async fn dial(&self, endpoint: &str) -> Result<Arc<dyn Transport>> {
        let transport = SocketIoTransport::dial(endpoint, self.ping_interval)
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;
        Ok(Arc::new(transport))
    }
}
