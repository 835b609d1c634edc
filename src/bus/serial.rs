use std::sync::Arc;

use tracing::debug;

use crate::bus::message::MessagePayload;
use crate::bus::transport::MessageBus;
use crate::core::errors::{Result, TetherError};

/// Fetch the next demonstration-event sequence number from the platform.
///
/// First reply wins; no reply within the bus default timeout is a
/// remote-communication failure.
pub async fn next_serial(bus: &Arc<dyn MessageBus>) -> Result<u64> {
    let replies = bus
        .gather(MessagePayload::SerialRequest, bus.default_timeout())
        .await?;
    for reply in replies {
        if let MessagePayload::SerialReply { serial } = reply.payload {
            debug!(serial, provider = %reply.sender, "serial number assigned");
            return Ok(serial);
        }
    }
    Err(TetherError::remote(
        "serial request",
        "no serial-number provider replied",
    ))
}
