use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Rate limiter for the "please sign in" notification
///
/// The first unauthorized failure notifies; further ones within the cooldown
/// window are swallowed.
#[derive(Debug)]
pub struct SignInNotice {
    cooldown: Duration,
    last_notified: Mutex<Option<Instant>>,
}

impl SignInNotice {
    /// Create with the given cooldown window
    pub const fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_notified: Mutex::new(None),
        }
    }

    /// Claim the right to notify now, returning `false` inside the cooldown window
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let mut last = self.last_notified.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(at) = *last
            && now.saturating_duration_since(at) < self.cooldown
        {
            return false;
        }
        *last = Some(now);
        true
    }

    /// Forget the last notification, e.g. after a successful sign-in
    pub fn reset(&self) {
        *self.last_notified.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
