//! Heartbeat monitoring for the venue connection.
//!
//! Tracks protocol-level ping/pong timing and inbound activity so the
//! message loop can detect a silently dead socket.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
struct HeartbeatState {
    last_ping: Option<Instant>,
    last_message: Instant,
    waiting_for_pong: bool,
}

/// Heartbeat manager for one connection.
#[derive(Debug)]
pub struct HeartbeatManager {
    /// Idle time after which a ping is sent.
    interval: Duration,
    /// How long to wait for the pong.
    timeout: Duration,
    state: Mutex<HeartbeatState>,
}

impl HeartbeatManager {
    pub fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
            state: Mutex::new(HeartbeatState {
                last_ping: None,
                last_message: Instant::now(),
                waiting_for_pong: false,
            }),
        }
    }

    /// Reset state for a fresh connection.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.last_ping = None;
        state.last_message = Instant::now();
        state.waiting_for_pong = false;
    }

    pub fn record_ping(&self) {
        let mut state = self.state.lock();
        state.last_ping = Some(Instant::now());
        state.waiting_for_pong = true;
    }

    pub fn record_pong(&self) {
        let mut state = self.state.lock();
        state.waiting_for_pong = false;
        state.last_message = Instant::now();
        if let Some(ping) = state.last_ping {
            debug!(rtt_ms = ping.elapsed().as_millis() as u64, "Received pong");
        }
    }

    /// Any inbound frame counts as liveness.
    pub fn record_message(&self) {
        self.state.lock().last_message = Instant::now();
    }

    /// True when a ping is outstanding for longer than the timeout.
    pub fn is_timed_out(&self) -> bool {
        let state = self.state.lock();
        state.waiting_for_pong && state.last_ping.is_some_and(|p| p.elapsed() > self.timeout)
    }

    /// True when the connection has been idle for a full interval and no
    /// ping is outstanding.
    pub fn should_send_heartbeat(&self) -> bool {
        let state = self.state.lock();
        !state.waiting_for_pong && state.last_message.elapsed() >= self.interval
    }

    /// Wait for the next heartbeat check.
    pub async fn wait_for_check(&self) {
        tokio::time::sleep((self.interval / 2).max(Duration::from_millis(100))).await;
    }
}
