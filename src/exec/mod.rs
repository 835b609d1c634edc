//! Distributed executor registry, invocation tracking, and the
//! cancellation-propagation protocol.

pub mod cancel;
pub mod executor;
pub mod invocation;
pub mod registry;

pub use cancel::{CancelReceiver, CANCEL_LOOKUP_TIMEOUT};
pub use executor::{ActionExecutor, StepCommand};
pub use invocation::{ActionInvocation, InvocationCache, InvocationStatus, StatusListener};
pub use registry::{ExecutorMap, PROCEDURE_NAMESPACE};
