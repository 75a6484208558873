//! Reconnect scheduling.
//!
//! Owns the consecutive-failure counter and the single pending retry timer.
//! The session calls [`ReconnectScheduler::schedule`] whenever the channel is
//! lost or an attempt fails, and starts a new attempt when
//! [`ReconnectScheduler::fired`] completes. An explicit disconnect
//! [`suppress`](ReconnectScheduler::suppress)es scheduling until the next
//! explicit connect [`resume`](ReconnectScheduler::resume)s it.

use std::pin::Pin;
use std::time::Duration;

use secchat_core::backoff::ReconnectPolicy;
use tokio::time::{self, Sleep};

/// Result of asking for a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// A retry will fire after `delay`.
    Scheduled {
        /// 1-based attempt number.
        attempt: u32,
        /// Wait before the attempt.
        delay: Duration,
    },
    /// A retry is already pending; nothing changed.
    AlreadyPending {
        /// Attempt number of the pending retry.
        attempt: u32,
    },
    /// The policy's attempt limit was reached.
    Exhausted {
        /// Failed attempts made.
        attempts: u32,
    },
    /// Scheduling is suppressed by an explicit disconnect.
    Suppressed,
}

/// Backoff state for one session.
pub struct ReconnectScheduler {
    policy: ReconnectPolicy,
    attempts: u32,
    suppressed: bool,
    timer: Option<Pin<Box<Sleep>>>,
}

impl ReconnectScheduler {
    /// Create an idle scheduler.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            suppressed: false,
            timer: None,
        }
    }

    /// Count one more attempt and arm the timer for it.
    pub fn schedule(&mut self) -> Schedule {
        if self.suppressed {
            return Schedule::Suppressed;
        }
        if self.timer.is_some() {
            return Schedule::AlreadyPending {
                attempt: self.attempts,
            };
        }
        let attempt = self.attempts.saturating_add(1);
        if !self.policy.allows(attempt) {
            return Schedule::Exhausted {
                attempts: self.attempts,
            };
        }
        self.attempts = attempt;
        let delay = self.policy.delay_for(attempt);
        self.timer = Some(Box::pin(time::sleep(delay)));
        Schedule::Scheduled { attempt, delay }
    }

    /// Wait for the pending retry and return its attempt number.
    ///
    /// Never completes while no retry is pending. Cancel-safe.
    pub async fn fired(&mut self) -> u32 {
        let Some(timer) = &mut self.timer else {
            return std::future::pending().await;
        };
        timer.as_mut().await;
        self.timer = None;
        self.attempts
    }

    /// A connection opened: forget past failures.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.timer = None;
    }

    /// Drop the pending retry and refuse to schedule until [`resume`](Self::resume).
    pub fn suppress(&mut self) {
        self.suppressed = true;
        self.timer = None;
    }

    /// Explicit connect: lift suppression and start a fresh retry budget.
    pub fn resume(&mut self) {
        self.suppressed = false;
        self.reset();
    }

    /// Consecutive failed attempts so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether a retry timer is armed.
    pub fn is_pending(&self) -> bool {
        self.timer.is_some()
    }

    /// Whether scheduling is suppressed.
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }
}
