//! Generic asynchronous composition primitives: typed result/error sinks,
//! stage chaining with cancellation aggregation, and the sync-over-async
//! adapter for callers that must block.

pub mod async_chain;
pub mod callback;
pub mod sync_adapter;

pub use async_chain::AsyncChain;
pub use callback::{Cancelable, CallbackHandler, ErrorCode, ErrorInfo};
pub use sync_adapter::SyncCallbackAdapter;
