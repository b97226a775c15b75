use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bus::Message;
use crate::codec::CodecError;

/// Execution reply sent from consumer to producer.
///
/// Wire format (JSON):
/// `{"txId":"…","success":true,"executeTime":"2026-10-16T08:00:00Z","executeHost":"node-1[10.0.0.5]"}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmMessage {
    pub tx_id: String,
    pub success: bool,
    pub execute_time: DateTime<Utc>,
    pub execute_host: String,
}

impl ConfirmMessage {
    pub const ID_PREFIX: &'static str = "confirm:";

    pub fn executed(tx_id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            tx_id: tx_id.into(),
            success: true,
            execute_time: Utc::now(),
            execute_host: host.into(),
        }
    }

    pub fn failed(tx_id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::executed(tx_id, host)
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Wrap the reply in a transport message.
    pub fn to_message(&self) -> Result<Message, CodecError> {
        Ok(Message::new(
            format!("{}{}", Self::ID_PREFIX, self.tx_id),
            self.to_json()?,
        ))
    }
}
