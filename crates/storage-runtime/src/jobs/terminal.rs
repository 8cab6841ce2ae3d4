use std::sync::atomic::{AtomicBool, Ordering};

/// Enforces that only one of a job's terminal operations
/// (`finish`/`cancel`/`report_error`/`report_complete`) actually drives
/// the backend (`spec.md` §4.7, §5 Cancellation).
pub(crate) struct TerminalGuard(AtomicBool);

impl TerminalGuard {
    pub(crate) fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Returns `true` for exactly one caller; every later call, on any
    /// thread, returns `false`.
    pub(crate) fn take(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_first_caller_wins() {
        let guard = TerminalGuard::new();
        assert!(guard.take());
        assert!(!guard.take());
        assert!(!guard.take());
    }
}
