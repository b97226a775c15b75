use crate::bus::Message;
use crate::error::{ConsistencyError, ConsistencyResult};
use crate::record::{ConfirmLevel, ConsistencyRecord};

/// Correlation key header.
pub const TX_ID_HEADER: &str = "txId";
/// Confirm level header, as the level's ordinal.
pub const CONFIRM_LEVEL_HEADER: &str = "confirmLevel";

/// Build the transport message for a record.
///
/// The message id is `{tx_id}:{retry_count}`, unique per attempt, so a resend
/// never collides with an earlier copy still in flight. Consumers correlate
/// on the `txId` header.
///
/// EXECUTED-level records must carry a confirm destination; it becomes the
/// message's `reply_to`.
pub fn outbound_message(record: &ConsistencyRecord) -> ConsistencyResult<Message> {
    let level = record.confirm_level.resolve();
    let id = format!("{}:{}", record.tx_id, record.retry_count);
    let mut message = Message::new(id, record.content.clone())
        .with_header(TX_ID_HEADER, record.tx_id.clone())
        .with_header(CONFIRM_LEVEL_HEADER, level.ordinal().to_string());

    if level == ConfirmLevel::Executed {
        let reply_to = record
            .confirm_destination
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(ConsistencyError::no_confirm_destination)?;
        message = message.with_reply_to(reply_to);
    }

    Ok(message)
}

/// Protocol headers read from an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundHeaders {
    pub tx_id: Option<String>,
    pub confirm_level: Option<ConfirmLevel>,
}

impl InboundHeaders {
    /// Missing or unparsable headers come back as `None`.
    pub fn parse(message: &Message) -> Self {
        let tx_id = message
            .header(TX_ID_HEADER)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let confirm_level = message
            .header(CONFIRM_LEVEL_HEADER)
            .and_then(|v| v.trim().parse::<u8>().ok())
            .and_then(ConfirmLevel::from_ordinal);
        Self {
            tx_id,
            confirm_level,
        }
    }

    pub fn wants_confirmation(&self) -> bool {
        self.confirm_level == Some(ConfirmLevel::Executed)
    }

    /// Transaction id for logs and errors, empty when absent.
    pub fn tx_id_or_default(&self) -> &str {
        self.tx_id.as_deref().unwrap_or_default()
    }
}
