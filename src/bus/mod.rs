//! Message-bus surface: the transport contract, the message kinds the core
//! exchanges, and an in-process bus for tests and single-process embedding.

pub mod eval;
pub mod local;
pub mod message;
pub mod serial;
pub mod transport;

pub use eval::evaluate;
pub use local::{LocalBus, LocalBusHub, DEFAULT_GATHER_TIMEOUT};
pub use message::{Envelope, MessageKind, MessagePayload};
pub use serial::next_serial;
pub use transport::{BusHandler, MessageBus};
