//! System-wide activity broadcast: the ordered invocation-start pipeline
//! and the instrumentation start/stop lane.

pub mod global;
pub mod instrumentation;

pub use global::{GlobalActionListener, GlobalActionNotifier};
pub use instrumentation::{Instrumentation, InstrumentationControl};
