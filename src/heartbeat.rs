//! Connection health check.
//!
//! While enabled, the channel publishes a heartbeat event addressed to its
//! own client at every interval. The remote routes it back, and each echo
//! refreshes the last-received time. A tick that finds no echo within the
//! timeout window reports the connection as dead.

use log::debug;
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Outcome of a heartbeat tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatCheck {
    /// Still inside the window; send the next ping
    Alive,

    /// No echo within the window
    Expired,
}

/// Heartbeat timer and echo bookkeeping for one channel
#[derive(Debug, Default)]
pub struct Heartbeat {
    timeout: Duration,
    interval: Option<Interval>,
    last_received: Option<Instant>,
}

impl Heartbeat {
    /// Create a monitor; a zero timeout leaves it disabled
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Configured timeout, zero when disabled
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Update the timeout. Disabling stops a running timer.
    pub fn set_timeout(&mut self, timeout: Duration) {
        debug!("updating connection timeout to {:?}", timeout);
        self.timeout = timeout;
        if timeout.is_zero() {
            self.stop();
        }
    }

    /// Whether a timeout is configured
    pub fn is_enabled(&self) -> bool {
        !self.timeout.is_zero()
    }

    /// Whether the timer is running
    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// (Re)start the timer from now. Does nothing while disabled.
    pub fn start(&mut self) {
        self.stop();
        if !self.is_enabled() {
            return;
        }

        let mut interval = time::interval_at(Instant::now() + self.timeout, self.timeout);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        debug!("heartbeat started every {:?}", self.timeout);
    }

    /// Stop the timer and forget the last echo
    pub fn stop(&mut self) {
        if self.interval.take().is_some() {
            debug!("heartbeat stopped");
        }
        self.last_received = None;
    }

    /// Record an echoed heartbeat
    pub fn record_echo(&mut self, now: Instant) {
        self.last_received = Some(now);
    }

    /// Evaluate the window at a tick
    pub fn check(&mut self, now: Instant) -> HeartbeatCheck {
        let last = *self.last_received.get_or_insert(now);
        if now.duration_since(last) < self.timeout {
            HeartbeatCheck::Alive
        } else {
            HeartbeatCheck::Expired
        }
    }

    /// Wait for the next tick; pends forever while stopped
    pub async fn tick(&mut self) -> Instant {
        match self.interval.as_mut() {
            Some(interval) => interval.tick().await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_opens_window() {
        let mut heartbeat = Heartbeat::new(Duration::from_millis(1000));
        heartbeat.start();

        let first = heartbeat.tick().await;
        assert_eq!(heartbeat.check(first), HeartbeatCheck::Alive);

        // No echo during the next interval
        let second = heartbeat.tick().await;
        assert_eq!(heartbeat.check(second), HeartbeatCheck::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_echo_keeps_alive() {
        let mut heartbeat = Heartbeat::new(Duration::from_millis(1000));
        heartbeat.start();

        for _ in 0..10 {
            let now = heartbeat.tick().await;
            assert_eq!(heartbeat.check(now), HeartbeatCheck::Alive);
            time::advance(Duration::from_millis(100)).await;
            heartbeat.record_echo(Instant::now());
        }
    }

    #[test]
    fn test_zero_timeout_disables() {
        let mut heartbeat = Heartbeat::new(Duration::ZERO);
        heartbeat.start();
        assert!(!heartbeat.is_running());
        assert!(!heartbeat.is_enabled());
    }

    #[tokio::test]
    async fn test_disable_stops_running_timer() {
        let mut heartbeat = Heartbeat::new(Duration::from_secs(5));
        heartbeat.start();
        assert!(heartbeat.is_running());

        heartbeat.set_timeout(Duration::ZERO);
        assert!(!heartbeat.is_running());
    }
}
