//! Trailing-edge debounce over viewport-change events.
//!
//! The debouncer never sleeps itself. It hands out a [`TimerToken`] for every
//! (re)armed timer and only honours a firing carrying the most recent token,
//! so whoever owns the clock can deliver late or duplicate firings safely.

use std::time::Duration;

use tokio::time::Instant;

/// Default quiet period before a viewport change triggers a fetch.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending { token: TimerToken, deadline: Instant },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Timer to arm after a change. `replaces` is the timer it supersedes.
pub struct Arm {
    pub token: TimerToken,
    pub deadline: Instant,
    pub replaces: Option<TimerToken>,
}

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    state: DebounceState,
    next_token: u64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: DebounceState::Idle,
            next_token: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, DebounceState::Pending { .. })
    }

    /// Record a viewport change at `now`, arming or resetting the timer.
    pub fn on_change(&mut self, now: Instant) -> Arm {
        let replaces = self.armed_token();
        self.next_token += 1;
        let token = TimerToken(self.next_token);
        let deadline = now + self.delay;
        self.state = DebounceState::Pending { token, deadline };
        Arm {
            token,
            deadline,
            replaces,
        }
    }

    /// Returns true exactly once per quiescence window, for the current timer.
    pub fn on_timer(&mut self, token: TimerToken) -> bool {
        match self.state {
            DebounceState::Pending { token: armed, .. } if armed == token => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Disarm any pending timer, returning its token so it can be cancelled.
    pub fn cancel(&mut self) -> Option<TimerToken> {
        let token = self.armed_token();
        self.state = DebounceState::Idle;
        token
    }

    fn armed_token(&self) -> Option<TimerToken> {
        match self.state {
            DebounceState::Pending { token, .. } => Some(token),
            DebounceState::Idle => None,
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const D: Duration = Duration::from_millis(300);

    #[test]
    fn first_change_arms_timer() {
        let mut debouncer = Debouncer::new(D);
        let t0 = Instant::now();
        let arm = debouncer.on_change(t0);
        assert_eq!(arm.deadline, t0 + D);
        assert_eq!(arm.replaces, None);
        assert!(debouncer.is_pending());
    }

    #[test]
    fn change_while_pending_resets_deadline() {
        let mut debouncer = Debouncer::new(D);
        let t0 = Instant::now();
        let first = debouncer.on_change(t0);
        let later = t0 + Duration::from_millis(299);
        let second = debouncer.on_change(later);
        assert_eq!(second.replaces, Some(first.token));
        assert_eq!(second.deadline, later + D);
        assert!(!debouncer.on_timer(first.token));
        assert!(debouncer.is_pending());
        assert!(debouncer.on_timer(second.token));
        assert_eq!(debouncer.state(), DebounceState::Idle);
    }

    #[test]
    fn timer_fires_once() {
        let mut debouncer = Debouncer::new(D);
        let arm = debouncer.on_change(Instant::now());
        assert!(debouncer.on_timer(arm.token));
        assert!(!debouncer.on_timer(arm.token));
    }

    #[test]
    fn cancel_disarms_pending_timer() {
        let mut debouncer = Debouncer::new(D);
        let arm = debouncer.on_change(Instant::now());
        assert_eq!(debouncer.cancel(), Some(arm.token));
        assert!(!debouncer.on_timer(arm.token));
        assert_eq!(debouncer.cancel(), None);
    }
}
