use aptitude_core::model::{TestSession, TickOutcome};

/// Countdown bookkeeping for a running test.
///
/// The timer is armed when a test starts and cancelled synchronously
/// whenever the Running phase is exited, by any route. A tick arriving
/// after cancellation is inert.
#[derive(Debug, Clone, Default)]
pub struct CountdownTimer {
    armed: bool,
}

impl CountdownTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn cancel(&mut self) {
        self.armed = false;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Deliver one tick to the session. Disarms itself on expiry so later
    /// ticks cannot fire a second submission.
    pub fn on_tick(&mut self, session: &mut TestSession) -> TickOutcome {
        if !self.armed {
            return TickOutcome::Ignored;
        }
        let outcome = session.tick();
        if outcome == TickOutcome::Expired {
            self.armed = false;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aptitude_core::model::{QuestionId, QuestionRecord, TestSession};
    use aptitude_core::time::fixed_now;

    fn session(duration: u32) -> TestSession {
        let q = QuestionRecord::new(
            QuestionId::new(1),
            "Logical",
            "Series",
            "Q1",
            vec!["a".into(), "b".into()],
            0,
            "",
        )
        .expect("valid question");
        TestSession::start(vec![q], duration, fixed_now()).expect("valid session")
    }

    #[test]
    fn disarmed_timer_ignores_ticks() {
        let mut timer = CountdownTimer::new();
        let mut session = session(10);

        assert_eq!(timer.on_tick(&mut session), TickOutcome::Ignored);
        assert_eq!(session.remaining_seconds(), 10);
    }

    #[test]
    fn expiry_disarms_the_timer() {
        let mut timer = CountdownTimer::new();
        let mut session = session(2);
        timer.arm();

        assert_eq!(timer.on_tick(&mut session), TickOutcome::Remaining(1));
        assert_eq!(timer.on_tick(&mut session), TickOutcome::Expired);
        assert!(!timer.is_armed());
        assert_eq!(timer.on_tick(&mut session), TickOutcome::Ignored);
        assert_eq!(session.remaining_seconds(), 0);
    }
}
