//! Connection handle - owns one persistent socket for its whole life

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::core::{CONNECTION_EVENT, Config, DISCONNECTION_EVENT, Error, Payload, Result};
use crate::transport::{Dialer, SocketIoDialer, Transport};

/// Handle to the remote service.
///
/// Created once by dialing; never reconnects. A handle whose dial failed
/// stays usable as a value but every operation on it fails.
pub struct Connection {
    transport: Option<Arc<dyn Transport>>,
    closed: AtomicBool,
    request_timeout: Duration,
}

impl Connection {
    /// Dial `config.endpoint`. `ready` receives exactly one value once the
    /// connect outcome is known: `false` on dial failure, `true` when the
    /// remote acknowledges the socket, `false` if the socket drops before
    /// that acknowledgement.
    pub async fn connect(config: &Config, ready: oneshot::Sender<bool>) -> Self {
        let dialer = SocketIoDialer::new(config.ping_interval());
        Self::connect_with(&dialer, config, ready).await
    }

    pub async fn connect_with(
        dialer: &dyn Dialer,
        config: &Config,
        ready: oneshot::Sender<bool>,
    ) -> Self {
        match dialer.dial(&config.endpoint).await {
            Ok(transport) => Self::from_transport(transport, config.request_timeout(), ready),
            Err(e) => {
                error!("Error connecting to websocket {}: {}", config.endpoint, e);
                let _ = ready.send(false);
                Self::disconnected(config.request_timeout())
            }
        }
    }

    pub fn from_transport(
        transport: Arc<dyn Transport>,
        request_timeout: Duration,
        ready: oneshot::Sender<bool>,
    ) -> Self {
        let ready = Arc::new(Mutex::new(Some(ready)));

        let signal = ready.clone();
        let connected = transport.on(
            CONNECTION_EVENT,
            Arc::new(move |_: Payload| {
                if let Some(tx) = signal.lock().take() {
                    info!("Connected to websocket.");
                    let _ = tx.send(true);
                }
            }),
        );

        // A drop before acknowledgement is a failed connect, not silence.
        let signal = ready.clone();
        let dropped = transport.on(
            DISCONNECTION_EVENT,
            Arc::new(move |_: Payload| {
                if let Some(tx) = signal.lock().take() {
                    error!("Websocket dropped before the connection was acknowledged");
                    let _ = tx.send(false);
                }
            }),
        );

        if let Err(e) = connected.and(dropped) {
            error!("Failed to watch for connection: {}", e);
            if let Some(tx) = ready.lock().take() {
                let _ = tx.send(false);
            }
        }

        Self {
            transport: Some(transport),
            closed: AtomicBool::new(false),
            request_timeout,
        }
    }

    /// A handle with no transport behind it.
    pub fn disconnected(request_timeout: Duration) -> Self {
        Self {
            transport: None,
            closed: AtomicBool::new(false),
            request_timeout,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some() && !self.is_closed()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Transmit an already-serialized payload on `topic`.
    pub fn send(&self, topic: &str, payload: &Payload) -> Result<()> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| Error::Connect("no transport, initial dial failed".to_string()))?;
        if self.is_closed() {
            return Err(Error::Closed);
        }
        transport.emit(topic, payload)
    }

    /// Invoke `handler` for every inbound message on `topic` until the
    /// handle closes or the registration is replaced.
    pub fn on_topic<F>(&self, topic: &str, handler: F) -> Result<()>
    where
        F: Fn(Payload) + Send + Sync + 'static,
    {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| Error::Registration("no transport, initial dial failed".to_string()))?;
        if self.is_closed() {
            return Err(Error::Registration("connection closed".to_string()));
        }
        transport
            .on(topic, Arc::new(handler))
            .map_err(|e| Error::Registration(format!("\"{}\": {}", topic, e)))
    }

    /// Release the transport. Only the first call has any effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("Connection already closed");
            return;
        }
        if let Some(transport) = &self.transport {
            transport.close();
        }
        info!("Closed websocket connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EmitBody;
    use crate::transport::mock::{MockDialer, MockTransport, sample_order};
    use futures::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    #[tokio::test]
    async fn test_dial_failure_signals_false_once() {
        let (tx, rx) = oneshot::channel();
        let dialer = MockDialer { transport: None };
        let connection = Connection::connect_with(&dialer, &Config::default(), tx).await;

        assert!(!rx.await.unwrap());
        assert!(!connection.is_connected());
        assert!(matches!(
            connection.send("getMarket", &json!({})),
            Err(Error::Connect(_))
        ));
        assert!(matches!(
            connection.emit_request("getMarket", &EmitBody::market("0xabc", None)),
            Err(Error::Connect(_))
        ));
        assert!(matches!(
            connection.post_order(&sample_order()),
            Err(Error::Connect(_))
        ));
        assert!(matches!(
            connection.on_topic("market", |_| {}),
            Err(Error::Registration(_))
        ));
    }

    #[tokio::test]
    async fn test_ready_after_acknowledgement() {
        let mock = MockTransport::new();
        let (tx, mut rx) = oneshot::channel();
        let dialer = MockDialer { transport: Some(mock.clone()) };
        let connection = Connection::connect_with(&dialer, &Config::default(), tx).await;

        // Socket open is not enough; the remote must acknowledge.
        assert!(rx.try_recv().is_err());
        assert!(mock.fire(CONNECTION_EVENT, Payload::Null));
        assert!(rx.await.unwrap());

        // Later acknowledgements and drops are ignored.
        assert!(mock.fire(CONNECTION_EVENT, Payload::Null));
        assert!(mock.fire(DISCONNECTION_EVENT, Payload::Null));
        assert!(connection.is_connected());
    }

    #[tokio::test]
    async fn test_drop_before_acknowledgement_signals_false() {
        let mock = MockTransport::new();
        let (tx, rx) = oneshot::channel();
        let _connection = Connection::from_transport(mock.clone(), Duration::from_secs(60), tx);

        assert!(mock.fire(DISCONNECTION_EVENT, Payload::Null));
        assert!(!rx.await.unwrap());

        // An acknowledgement after the drop cannot flip the answer.
        assert!(mock.fire(CONNECTION_EVENT, Payload::Null));
    }

    #[tokio::test]
    async fn test_remote_close_before_connect_packet_signals_false() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(
                r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":60000}"#.to_string(),
            ))
            .await
            .unwrap();
            // Hang up without ever sending "40".
            let _ = ws.close(None).await;
            while let Some(Ok(_)) = ws.next().await {}
        });

        let config = Config {
            endpoint: format!("ws://{}/socket.io/?EIO=3&transport=websocket", addr),
            ..Config::default()
        };
        let (tx, rx) = oneshot::channel();
        let _connection = Connection::connect(&config, tx).await;

        let ready = tokio::time::timeout(Duration::from_secs(5), rx).await;
        assert!(matches!(ready, Ok(Ok(false))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_connection_watch_signals_false() {
        let mock = MockTransport::new();
        mock.fail_registration();
        let (tx, rx) = oneshot::channel();
        let _connection = Connection::from_transport(mock, Duration::from_secs(60), tx);
        assert!(!rx.await.unwrap());
    }

    #[tokio::test]
    async fn test_close_is_effective_once() {
        let mock = MockTransport::new();
        let (tx, _rx) = oneshot::channel();
        let connection = Connection::from_transport(mock.clone(), Duration::from_secs(60), tx);

        connection.send("ping", &json!(1)).unwrap();
        connection.close();
        connection.close();

        assert_eq!(mock.close_calls(), 1);
        assert!(connection.is_closed());
        assert!(matches!(connection.send("ping", &json!(1)), Err(Error::Closed)));
        assert!(matches!(
            connection.on_topic("pong", |_| {}),
            Err(Error::Registration(_))
        ));
        assert_eq!(mock.emitted().len(), 1);
    }

    #[tokio::test]
    async fn test_real_dial_refused_signals_false() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = Config {
            endpoint: format!("ws://{}/socket.io/?EIO=3&transport=websocket", addr),
            ..Config::default()
        };
        let (tx, rx) = oneshot::channel();
        let connection = Connection::connect(&config, tx).await;

        assert!(!rx.await.unwrap());
        assert!(connection.send("getMarket", &json!({})).unwrap_err().is_send_failure());
    }
}
