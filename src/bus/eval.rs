use std::collections::HashMap;
use std::sync::Arc;

use crate::bus::message::MessagePayload;
use crate::bus::transport::MessageBus;
use crate::core::errors::{Result, TetherError};
use crate::types::term::Term;

/// Evaluate a term expression against a variable-binding set.
///
/// Used while an invocation is paused or stepped; the evaluation itself runs
/// on a remote reasoning peer. A peer-reported failure surfaces as a
/// remote-communication error carrying the peer's message.
pub async fn evaluate(
    bus: &Arc<dyn MessageBus>,
    expr: Term,
    bindings: HashMap<String, Term>,
) -> Result<Term> {
    let replies = bus
        .gather(
            MessagePayload::EvalRequest { expr, bindings },
            bus.default_timeout(),
        )
        .await?;
    for reply in replies {
        if let MessagePayload::EvalResult { value, error } = reply.payload {
            if let Some(message) = error {
                return Err(TetherError::remote("expression evaluation", message));
            }
            if let Some(value) = value {
                return Ok(value);
            }
        }
    }
    Err(TetherError::remote(
        "expression evaluation",
        "no evaluator replied",
    ))
}
