//! Liveness watchdog
//!
//! Armed once per successful open. At the deadline, a connection that never
//! delivered a frame is reported silent. Only one check per connection
//! lifetime; frames do not push the deadline back.

use livesync_connector_core::AttemptId;

/// Outcome of a watchdog check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The check belongs to a connection that is no longer armed.
    Stale,
    /// At least one frame arrived since arming.
    Alive,
    /// Nothing arrived since arming.
    Silent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Liveness {
    armed: Option<AttemptId>,
    saw_frame: bool,
}

impl Liveness {
    pub fn arm(&mut self, attempt: AttemptId) {
        self.armed = Some(attempt);
        self.saw_frame = false;
    }

    /// Record that a frame (structured or noise) arrived.
    pub fn observe_frame(&mut self) {
        if self.armed.is_some() {
            self.saw_frame = true;
        }
    }

    /// Consume the armed check for `attempt`.
    pub fn check(&mut self, attempt: AttemptId) -> Verdict {
        if self.armed != Some(attempt) {
            return Verdict::Stale;
        }
        self.armed = None;
        if self.saw_frame {
            Verdict::Alive
        } else {
            Verdict::Silent
        }
    }

    pub fn disarm(&mut self) {
        self.armed = None;
        self.saw_frame = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_without_frames() {
        let mut liveness = Liveness::default();
        liveness.arm(1);
        assert_eq!(liveness.check(1), Verdict::Silent);
    }

    #[test]
    fn alive_after_one_frame() {
        let mut liveness = Liveness::default();
        liveness.arm(1);
        liveness.observe_frame();
        assert_eq!(liveness.check(1), Verdict::Alive);
    }

    #[test]
    fn one_check_per_arming() {
        let mut liveness = Liveness::default();
        liveness.arm(3);
        assert_eq!(liveness.check(3), Verdict::Silent);
        assert_eq!(liveness.check(3), Verdict::Stale);
        assert!(!liveness.is_armed());
    }

    #[test]
    fn rearming_resets_observation() {
        let mut liveness = Liveness::default();
        liveness.arm(1);
        liveness.observe_frame();
        liveness.arm(2);
        assert_eq!(liveness.check(1), Verdict::Stale);
        assert_eq!(liveness.check(2), Verdict::Silent);
    }

    #[test]
    fn frames_before_arming_do_not_count() {
        let mut liveness = Liveness::default();
        liveness.observe_frame();
        liveness.arm(1);
        assert_eq!(liveness.check(1), Verdict::Silent);
    }

    #[test]
    fn disarmed_checks_are_stale() {
        let mut liveness = Liveness::default();
        liveness.arm(1);
        liveness.disarm();
        assert_eq!(liveness.check(1), Verdict::Stale);
    }
}
