use crate::event::CallEvent;

/// Suspension callback invoked when a decision says to halt. The hook blocks
/// the calling thread until the operator resumes it; the resumption protocol
/// (debugger, terminal prompt, signal) is outside the core.
pub trait HaltHook: Send + Sync {
    fn halt(&self, event: &CallEvent);
}

/// Resumes immediately. The default hook for unattended runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHaltHook;

impl HaltHook for NoopHaltHook {
    fn halt(&self, _event: &CallEvent) {}
}
