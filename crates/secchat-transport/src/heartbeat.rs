//! Heartbeat ping cadence and dead-man's switch.
//!
//! While running, [`HeartbeatMonitor::tick`] yields [`HeartbeatTick::Ping`]
//! every `interval` (the session answers with a `ping` frame) and
//! [`HeartbeatTick::Expired`] once no inbound traffic has been recorded for
//! `timeout`. Expiry stops the monitor before it is reported, so the caller
//! never sees a ping after a timeout.

use std::pin::Pin;

use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};

use crate::config::HeartbeatConfig;

/// What the monitor wants the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatTick {
    /// Send a liveness ping.
    Ping,
    /// Nothing arrived within the timeout; the channel is dead.
    Expired,
}

struct Armed {
    ping: Interval,
    deadline: Pin<Box<Sleep>>,
}

/// Ping interval plus inbound-activity watchdog.
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    armed: Option<Armed>,
}

impl HeartbeatMonitor {
    /// Create a stopped monitor.
    pub fn new(config: HeartbeatConfig) -> Self {
        Self { config, armed: None }
    }

    /// Start (or restart) both timers. The first ping fires one interval from now.
    pub fn start(&mut self) {
        let now = Instant::now();
        let mut ping = time::interval_at(now + self.config.interval, self.config.interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.armed = Some(Armed {
            ping,
            deadline: Box::pin(time::sleep_until(now + self.config.timeout)),
        });
    }

    /// Re-arm the dead-man's switch. No-op while stopped.
    pub fn record_activity(&mut self) {
        if let Some(armed) = &mut self.armed {
            armed
                .deadline
                .as_mut()
                .reset(Instant::now() + self.config.timeout);
        }
    }

    /// Cancel both timers. Idempotent.
    pub fn stop(&mut self) {
        self.armed = None;
    }

    /// Whether the timers are armed.
    pub fn is_running(&self) -> bool {
        self.armed.is_some()
    }

    /// Configured timing.
    pub fn config(&self) -> HeartbeatConfig {
        self.config
    }

    /// Wait for the next action. Never completes while stopped.
    ///
    /// Cancel-safe. When the deadline and a ping are due together the
    /// deadline wins.
    pub async fn tick(&mut self) -> HeartbeatTick {
        let Some(armed) = &mut self.armed else {
            return std::future::pending().await;
        };
        let expired = tokio::select! {
            biased;
            () = armed.deadline.as_mut() => true,
            _ = armed.ping.tick() => false,
        };
        if expired {
            self.stop();
            HeartbeatTick::Expired
        } else {
            HeartbeatTick::Ping
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> HeartbeatConfig {
        HeartbeatConfig {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(45),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_monitor_never_ticks() {
        let mut monitor = HeartbeatMonitor::new(config());
        let result = time::timeout(Duration::from_secs(600), monitor.tick()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn pings_every_interval() {
        let mut monitor = HeartbeatMonitor::new(config());
        monitor.start();
        let start = Instant::now();
        for n in 1..=3 {
            assert_eq!(monitor.tick().await, HeartbeatTick::Ping);
            assert_eq!(start.elapsed(), Duration::from_secs(5 * n));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expires_after_timeout_without_activity() {
        let mut monitor = HeartbeatMonitor::new(config());
        monitor.start();
        let start = Instant::now();

        let mut pings = 0;
        loop {
            match monitor.tick().await {
                HeartbeatTick::Ping => pings += 1,
                HeartbeatTick::Expired => break,
            }
        }
        assert_eq!(start.elapsed(), Duration::from_secs(45));
        // the ping due at 45 s loses to the deadline
        assert_eq!(pings, 8);
        assert!(!monitor.is_running());

        let after = time::timeout(Duration::from_secs(600), monitor.tick()).await;
        assert!(after.is_err(), "no ticks once expired");
    }

    #[tokio::test(start_paused = true)]
    async fn activity_pushes_deadline_back() {
        let mut monitor = HeartbeatMonitor::new(config());
        monitor.start();
        let start = Instant::now();

        time::advance(Duration::from_secs(30)).await;
        monitor.record_activity();

        loop {
            if monitor.tick().await == HeartbeatTick::Expired {
                break;
            }
        }
        assert_eq!(start.elapsed(), Duration::from_secs(75));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let mut monitor = HeartbeatMonitor::new(config());
        monitor.stop();
        monitor.start();
        assert!(monitor.is_running());
        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_running());
        monitor.record_activity();
        assert!(!monitor.is_running());
    }
}
