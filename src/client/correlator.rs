//! Correlator - single-shot request/response over a multiplexed socket
//!
//! One invocation races three independent paths into a shared
//! [`OutcomeCell`]: the reply handler (transport reader context), the
//! arm task (register, then emit; fails fast on either error) and the
//! timeout timer. A caller-held [`RequestHandle`] adds a fourth, `cancel`.
//! Whichever path settles first delivers the outcome, closes the
//! connection and stops the timer; every other path is a no-op.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info_span, trace, warn};
use uuid::Uuid;

use crate::client::{Connection, OutcomeCell};
use crate::core::{EmitBody, Error, ORDER_TOPIC, Outcome};

/// Everything one round-trip needs besides the result channel
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Topic the reply arrives on
    pub reply_topic: String,
    /// Topic the request goes out on; [`ORDER_TOPIC`] posts `body.order`
    pub emit_topic: String,
    pub body: EmitBody,
    /// Deadline for this request; the correlator's default when `None`
    pub timeout: Option<Duration>,
}

pub struct Correlator {
    connection: Arc<Connection>,
    timeout: Duration,
}

impl Correlator {
    pub fn new(connection: Arc<Connection>, timeout: Duration) -> Self {
        Self { connection, timeout }
    }

    /// Start one invocation. `result_tx` receives exactly one outcome.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, request: PendingRequest, result_tx: oneshot::Sender<Arc<Outcome>>) -> RequestHandle {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let race = Arc::new(Race {
            id: Uuid::new_v4(),
            reply_topic: request.reply_topic.clone(),
            cell: OutcomeCell::new(),
            connection: self.connection.clone(),
            result_tx: Mutex::new(Some(result_tx)),
            stop_timer: Mutex::new(Some(cancel_tx)),
        });

        let span = info_span!("request", id = %race.id, reply = %request.reply_topic, emit = %request.emit_topic);
        let timeout = request.timeout.unwrap_or(self.timeout);
        let timer = tokio::spawn(run_timer(race.clone(), timeout, cancel_rx).instrument(span.clone()));

        let armed = race.clone();
        let task = tokio::spawn(
            async move {
                armed.arm(&request);
                if let Err(e) = timer.await {
                    error!("Timer task failed: {}", e);
                }
            }
            .instrument(span),
        );

        RequestHandle { race, task }
    }
}

/// Shared state of one invocation
struct Race {
    id: Uuid,
    reply_topic: String,
    cell: OutcomeCell,
    connection: Arc<Connection>,
    result_tx: Mutex<Option<oneshot::Sender<Arc<Outcome>>>>,
    stop_timer: Mutex<Option<oneshot::Sender<()>>>,
}

impl Race {
    /// Returns true if this call won and performed teardown.
    fn settle(&self, outcome: Outcome) -> bool {
        if !self.cell.try_settle(outcome) {
            return false;
        }

        if let Some(outcome) = self.cell.outcome() {
            match &*outcome {
                Outcome::Success(_) => debug!("Got websocket data for \"{}\" topic", self.reply_topic),
                Outcome::Failure(e) => warn!("Request {} failed: {}", self.id, e),
            }
            if let Some(tx) = self.result_tx.lock().take() {
                if tx.send(outcome).is_err() {
                    debug!("Result receiver dropped before delivery");
                }
            }
        }
        self.connection.close();
        if let Some(stop) = self.stop_timer.lock().take() {
            let _ = stop.send(());
        }
        true
    }

    fn arm(self: &Arc<Self>, request: &PendingRequest) {
        let weak: Weak<Race> = Arc::downgrade(self);
        let registered = self.connection.on_topic(&request.reply_topic, move |message| {
            if let Some(race) = weak.upgrade() {
                race.settle(Outcome::Success(message));
            }
        });
        if let Err(e) = registered {
            self.settle(Outcome::Failure(e));
            return;
        }

        let sent = if request.emit_topic == ORDER_TOPIC {
            match &request.body.order {
                Some(order) => self.connection.post_order(order),
                None => Err(Error::Send(format!("\"{}\" requires an order body", ORDER_TOPIC))),
            }
        } else {
            self.connection.emit_request(&request.emit_topic, &request.body)
        };
        if let Err(e) = sent {
            self.settle(Outcome::Failure(e));
        }
    }
}

async fn run_timer(race: Arc<Race>, timeout: Duration, stop: oneshot::Receiver<()>) {
    tokio::select! {
        _ = tokio::time::sleep(timeout) => {
            race.settle(Outcome::Failure(Error::Timeout(timeout)));
        }
        _ = stop => trace!("Timer stopped"),
    }
}

/// Caller's view of a running invocation
pub struct RequestHandle {
    race: Arc<Race>,
    task: JoinHandle<()>,
}

impl RequestHandle {
    pub fn id(&self) -> Uuid {
        self.race.id
    }

    pub fn is_settled(&self) -> bool {
        self.race.cell.is_settled()
    }

    /// Settle as [`Error::Cancelled`] unless something else already won.
    pub fn cancel(&self) -> bool {
        self.race.settle(Outcome::Failure(Error::Cancelled))
    }

    /// Wait for the arm and timer tasks to finish.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("Request task failed: {}", e);
        }
    }
}

impl Connection {
    /// Send `body` on `emit_topic` and deliver the first message on
    /// `reply_topic` (or the failure) to `result_tx`, then close this
    /// connection. Uses the connection's configured request timeout.
    pub fn emit_listen_once_and_close(
        self: &Arc<Self>,
        reply_topic: &str,
        body: EmitBody,
        result_tx: oneshot::Sender<Arc<Outcome>>,
        emit_topic: &str,
    ) -> RequestHandle {
        let request = PendingRequest {
            reply_topic: reply_topic.to_string(),
            emit_topic: emit_topic.to_string(),
            body,
            timeout: None,
        };
        Correlator::new(self.clone(), self.request_timeout()).start(request, result_tx)
    }
}
