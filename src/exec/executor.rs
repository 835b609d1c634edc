use std::sync::Arc;

use async_trait::async_trait;

use crate::exec::invocation::ActionInvocation;

/// Stepping command for a paused invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepCommand {
    StepInto,
    StepOver,
    Continue,
}

/// Handler capability for a named action.
///
/// Cancellation is advisory and best-effort: the handler decides, by walking
/// the event's caller chain, whether any of its own in-flight invocations
/// were directly or transitively invoked by the canceled event, and if so
/// drives them to a terminal failed status. There is no acknowledgment and
/// no guaranteed cutoff point.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, invocation: Arc<ActionInvocation>) -> anyhow::Result<()>;

    /// Stepped execution; handlers without stepping support run normally
    async fn execute_stepped(&self, invocation: Arc<ActionInvocation>) -> anyhow::Result<()> {
        self.execute(invocation).await
    }

    async fn cancel(&self, event: Arc<ActionInvocation>);

    async fn continue_stepping(
        &self,
        _invocation: Arc<ActionInvocation>,
        _command: StepCommand,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}
