//! Wire-facing types shared by the transport and the client

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::Error;

/// Topic the remote service reads order submissions from
pub const ORDER_TOPIC: &str = "message";

/// Reserved event fired once the remote acknowledges the socket
pub const CONNECTION_EVENT: &str = "connection";

/// Reserved event fired when the remote drops the socket
pub const DISCONNECTION_EVENT: &str = "disconnection";

/// Opaque inbound payload; its schema belongs to the topic
pub type Payload = Value;

/// Terminal result of one correlated request
#[derive(Debug)]
pub enum Outcome {
    Success(Payload),
    Failure(Error),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Outcome::Success(p) => Some(p),
            Outcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(e) => Some(e),
        }
    }
}

/// Signed order as the exchange expects it on [`ORDER_TOPIC`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPost {
    /// Amounts are wei integers, kept as strings to avoid precision loss
    pub amount_get: String,
    pub amount_give: String,
    pub token_get: String,
    pub token_give: String,
    pub contract_addr: String,
    pub expires: u64,
    pub nonce: u64,
    pub user: String,
    pub v: u8,
    pub r: String,
    pub s: String,
}

/// Request body for every emitted topic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderPost>,
}

impl EmitBody {
    pub fn market(token: impl Into<String>, user: Option<String>) -> Self {
        Self {
            token: Some(token.into()),
            user,
            order: None,
        }
    }

    pub fn order(order: OrderPost) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }
}
