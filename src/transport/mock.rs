//! In-memory transport for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::core::{Error, OrderPost, Payload, Result};
use crate::transport::{Dialer, Handler, Transport};

/// Records emits and close calls. Unlike the real transport it keeps
/// delivering to registered handlers after `close()`, so late replies can be
/// injected on purpose.
pub struct MockTransport {
    this: Weak<MockTransport>,
    handlers: Mutex<HashMap<String, Handler>>,
    emitted: Mutex<Vec<(String, Payload)>>,
    echo: Mutex<Option<(String, Duration, Payload)>>,
    close_calls: AtomicUsize,
    closed: AtomicBool,
    fail_on: AtomicBool,
    fail_emit: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            handlers: Mutex::new(HashMap::new()),
            emitted: Mutex::new(vec![]),
            echo: Mutex::new(None),
            close_calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            fail_on: AtomicBool::new(false),
            fail_emit: AtomicBool::new(false),
        })
    }

    /// Answer every emit with `payload` on `topic` after `delay`.
    pub fn echo_after(&self, topic: &str, delay: Duration, payload: Payload) {
        *self.echo.lock() = Some((topic.to_string(), delay, payload));
    }

    pub fn fail_registration(&self) {
        self.fail_on.store(true, Ordering::SeqCst);
    }

    pub fn fail_emits(&self) {
        self.fail_emit.store(true, Ordering::SeqCst);
    }

    /// Deliver `payload` on `topic`; false when nothing is registered.
    pub fn fire(&self, topic: &str, payload: Payload) -> bool {
        let handler = self.handlers.lock().get(topic).cloned();
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }

    pub fn emitted(&self) -> Vec<(String, Payload)> {
        self.emitted.lock().clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn on(&self, event: &str, handler: Handler) -> Result<()> {
        if self.fail_on.load(Ordering::SeqCst) {
            return Err(Error::WebSocket("mock registration failure".to_string()));
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        self.handlers.lock().insert(event.to_string(), handler);
        Ok(())
    }

    fn emit(&self, event: &str, payload: &Payload) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        if self.fail_emit.load(Ordering::SeqCst) {
            return Err(Error::Send("mock send failure".to_string()));
        }
        self.emitted.lock().push((event.to_string(), payload.clone()));

        if let Some((topic, delay, reply)) = self.echo.lock().clone() {
            let this = self.this.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(transport) = this.upgrade() {
                    transport.fire(&topic, reply);
                }
            });
        }
        Ok(())
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out a prepared transport, or fails like an unreachable host.
pub struct MockDialer {
    pub transport: Option<Arc<MockTransport>>,
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(&self, endpoint: &str) -> Result<Arc<dyn Transport>> {
        match &self.transport {
            Some(transport) => Ok(transport.clone() as Arc<dyn Transport>),
            None => Err(Error::Connect(format!("connection refused: {}", endpoint))),
        }
    }
}

pub fn sample_order() -> OrderPost {
    OrderPost {
        amount_get: "1000000000000000000".to_string(),
        amount_give: "250000000000000000".to_string(),
        token_get: "0x8f3470a7388c05ee4e7af3d01d8c722b0ff52374".to_string(),
        token_give: "0x0000000000000000000000000000000000000000".to_string(),
        contract_addr: "0x8d12a197cb00d4747a1fe03395095ce2a5cc6819".to_string(),
        expires: 4_900_000,
        nonce: 42,
        user: "0x1111111111111111111111111111111111111111".to_string(),
        v: 28,
        r: "0xab".to_string(),
        s: "0xcd".to_string(),
    }
}
