use std::sync::Arc;

use aptitude_core::model::{
    Phase, QuestionBank, SubmitTrigger, TestOutcome, TestReport, TestSession, TickOutcome, UserId,
    WarningOutcome,
};
use storage::repository::TestSessionRepository;

use super::draw::draw_questions;
use super::monitor::{IntegrityMonitor, IntegritySignal};
use super::timer::CountdownTimer;
use super::view::TestView;
use crate::Clock;
use crate::error::FlowError;

/// Owns the test state machine and arbitrates its three submit triggers.
///
/// All mutation goes through `&mut self`, so a tick, an integrity signal
/// and a manual submit can never interleave mid-operation. Every route out
/// of Running funnels into one private finish step that flips the phase
/// before any await and cleans up the timer and monitor synchronously;
/// persistence is best-effort afterwards.
pub struct TestFlow {
    clock: Clock,
    bank: QuestionBank,
    sessions: Arc<dyn TestSessionRepository>,
    user: Option<UserId>,
    session: Option<TestSession>,
    timer: CountdownTimer,
    monitor: IntegrityMonitor,
}

impl TestFlow {
    #[must_use]
    pub fn new(clock: Clock, bank: QuestionBank, sessions: Arc<dyn TestSessionRepository>) -> Self {
        Self {
            clock,
            bank,
            sessions,
            user: None,
            session: None,
            timer: CountdownTimer::new(),
            monitor: IntegrityMonitor::new(),
        }
    }

    /// Attribute finished tests to this user. Anonymous flows skip
    /// persistence entirely.
    #[must_use]
    pub fn with_user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    pub fn set_user(&mut self, user: Option<UserId>) {
        self.user = user;
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.session
            .as_ref()
            .map_or(Phase::Configuring, TestSession::phase)
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&TestOutcome> {
        self.session.as_ref().and_then(|s| s.outcome())
    }

    #[must_use]
    pub fn report(&self) -> Option<TestReport> {
        self.session.as_ref().and_then(|s| s.report())
    }

    #[must_use]
    pub fn view(&self) -> TestView {
        self.session
            .as_ref()
            .map_or_else(TestView::configuring, TestView::from_session)
    }

    /// Begin a fresh test: draw questions, start the countdown, attach the
    /// integrity monitor. Any test already in progress is discarded first.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Session` for a zero duration or when the draw
    /// comes up empty.
    pub fn start_test(
        &mut self,
        duration_minutes: u32,
        question_count: usize,
    ) -> Result<(), FlowError> {
        self.restart();
        let drawn = draw_questions(&self.bank, question_count);
        let duration_seconds = duration_minutes.saturating_mul(60);
        let session = TestSession::start(drawn, duration_seconds, self.clock.now())?;
        self.session = Some(session);
        self.timer.arm();
        self.monitor.attach();
        Ok(())
    }

    /// Record an answer for the current question. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::NoSession` outside a test, and rejects an
    /// out-of-range option without mutating anything.
    pub fn select_answer(&mut self, option_index: usize) -> Result<(), FlowError> {
        let session = self.session.as_mut().ok_or(FlowError::NoSession)?;
        session.select_answer(option_index)?;
        Ok(())
    }

    /// Move to the next question; gated on the current one being answered.
    pub fn advance(&mut self) -> bool {
        self.session.as_mut().is_some_and(|s| s.advance())
    }

    /// Move to the previous question; never gated.
    pub fn retreat(&mut self) -> bool {
        self.session.as_mut().is_some_and(|s| s.retreat())
    }

    /// One countdown tick. Expiry submits with `TimerExpiry` in the same
    /// call, after the zeroed clock is already observable.
    pub async fn tick(&mut self) -> TickOutcome {
        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Ignored;
        };
        let outcome = self.timer.on_tick(session);
        if outcome == TickOutcome::Expired {
            self.finish(SubmitTrigger::TimerExpiry).await;
        }
        outcome
    }

    /// One focus-loss signal. Reaching the threshold submits with
    /// `WarningThreshold` in the same call.
    pub async fn observe(&mut self, signal: IntegritySignal) -> WarningOutcome {
        let Some(session) = self.session.as_mut() else {
            return WarningOutcome::Ignored;
        };
        let outcome = self.monitor.observe(session, signal);
        if matches!(outcome, WarningOutcome::ThresholdReached { .. }) {
            self.finish(SubmitTrigger::WarningThreshold).await;
        }
        outcome
    }

    /// Manual submission. Returns the report on the first effective call;
    /// `None` when no test is running or it already finished.
    pub async fn submit(&mut self) -> Option<TestReport> {
        self.finish(SubmitTrigger::Manual).await
    }

    /// Drop any session and return to Configuring. Valid from any phase.
    pub fn restart(&mut self) {
        self.session = None;
        self.timer.cancel();
        self.monitor.detach();
    }

    async fn finish(&mut self, trigger: SubmitTrigger) -> Option<TestReport> {
        let now = self.clock.now();
        let session = self.session.as_mut()?;
        // Idempotent: only the first trigger flips the phase. No await may
        // happen before this point.
        session.submit(trigger, now)?;
        self.timer.cancel();
        self.monitor.detach();

        let report = session.report()?;
        if let Some(user) = self.user {
            if let Err(e) = self.sessions.append_session(user, &report, now).await {
                tracing::warn!(error = %e, "failed to persist test result; local report stands");
            }
        }
        Some(report)
    }
}

impl core::fmt::Debug for TestFlow {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TestFlow")
            .field("phase", &self.phase())
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}
