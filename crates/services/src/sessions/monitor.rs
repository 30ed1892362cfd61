use aptitude_core::model::{TestSession, WarningOutcome};

/// Focus-loss signal observed while a test is running.
///
/// Both channels escalate identically, and a hide that also blurs the
/// window counts twice (at-least-once escalation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegritySignal {
    PageHidden,
    WindowBlur,
}

/// Tab-switch detection bookkeeping for a running test.
///
/// Attached when a test starts, detached synchronously whenever Running is
/// exited. A detached monitor ignores signals.
#[derive(Debug, Clone, Default)]
pub struct IntegrityMonitor {
    attached: bool,
}

impl IntegrityMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self) {
        self.attached = true;
    }

    pub fn detach(&mut self) {
        self.attached = false;
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Record one focus-loss signal against the session. Detaches itself at
    /// the threshold so a trailing signal cannot fire a second submission.
    pub fn observe(&mut self, session: &mut TestSession, _signal: IntegritySignal) -> WarningOutcome {
        if !self.attached {
            return WarningOutcome::Ignored;
        }
        let outcome = session.record_warning();
        if matches!(outcome, WarningOutcome::ThresholdReached { .. }) {
            self.attached = false;
        }
        outcome
    }
}
