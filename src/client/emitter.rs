//! Request emitter - serialize once, send, log exactly what went out

use serde::Serialize;
use tracing::info;

use crate::client::Connection;
use crate::core::{ORDER_TOPIC, OrderPost, Result};

impl Connection {
    /// Fire-and-forget send of `body` on `topic`.
    pub fn emit_request<T: Serialize + ?Sized>(&self, topic: &str, body: &T) -> Result<()> {
        let payload = serde_json::to_value(body)?;
        self.send(topic, &payload)?;

        info!(
            "Emitted websocket request for \"{}\" topic with payload {}",
            topic, payload
        );
        Ok(())
    }

    /// Submit a signed order on the exchange's fixed order topic.
    pub fn post_order(&self, order: &OrderPost) -> Result<()> {
        let payload = serde_json::to_value(order)?;
        self.send(ORDER_TOPIC, &payload)?;

        info!(
            "Emitted websocket request for \"{}\" topic with order payload {}",
            ORDER_TOPIC, payload
        );
        Ok(())
    }
}
