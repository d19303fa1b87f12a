//! Idle close timer for one connection.
//!
//! At most one timer is live at a time: arming replaces the previous timer.
//! The timer is owned by the connection's task, so cancelling it cannot race
//! with it firing, and dropping the connection drops the timer with it.

use std::future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// Identifies one arming of an [`IdleCloser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken(u64);

struct Armed {
    token: TimerToken,
    sleep: Pin<Box<Sleep>>,
}

#[derive(Default)]
pub struct IdleCloser {
    generation: u64,
    armed: Option<Armed>,
}

impl IdleCloser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer to fire after `duration`, cancelling any armed timer.
    pub fn arm(&mut self, duration: Duration) -> TimerToken {
        self.generation += 1;
        let token = TimerToken(self.generation);
        self.armed = Some(Armed {
            token,
            sleep: Box::pin(tokio::time::sleep(duration)),
        });
        token
    }

    /// Cancels the armed timer. Returns whether one was armed.
    pub fn cancel(&mut self) -> bool {
        self.armed.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// The live arming, if any.
    pub fn token(&self) -> Option<TimerToken> {
        self.armed.as_ref().map(|armed| armed.token)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.as_ref().map(|armed| armed.sleep.deadline())
    }

    /// Completes when the armed timer fires and disarms it.
    ///
    /// Never completes while nothing is armed. Dropping the returned future
    /// before it completes leaves the timer armed.
    pub async fn fired(&mut self) -> TimerToken {
        let Some(armed) = self.armed.as_mut() else {
            return future::pending().await;
        };
        armed.sleep.as_mut().await;
        let token = armed.token;
        self.armed = None;
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_duration() {
        let mut idle = IdleCloser::new();
        let start = Instant::now();
        let token = idle.arm(Duration::from_secs(5));
        assert_eq!(idle.deadline(), Some(start + Duration::from_secs(5)));

        assert_eq!(idle.fired().await, token);
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(!idle.is_armed());
        assert_eq!(idle.deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_previous_timer() {
        let mut idle = IdleCloser::new();
        let first = idle.arm(Duration::from_secs(1));
        let second = idle.arm(Duration::from_secs(10));
        assert_ne!(first, second);
        assert_eq!(idle.token(), Some(second));

        let start = Instant::now();
        assert_eq!(idle.fired().await, second);
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let mut idle = IdleCloser::new();
        idle.arm(Duration::from_millis(10));
        assert!(idle.cancel());
        assert!(!idle.cancel());

        let fired = tokio::time::timeout(Duration::from_secs(60), idle.fired()).await;
        assert!(fired.is_err());
    }
}
