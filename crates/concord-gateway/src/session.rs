//! Session state
//!
//! Everything needed to resume a dropped connection, plus heartbeat bookkeeping. Shared between
//! the read loop and the heartbeat task behind a `parking_lot::Mutex`; the lock is never held
//! across an await point.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Session shared by the connection and its heartbeat task
pub type SharedSession = Arc<Mutex<Session>>;

/// Outcome of a heartbeat timer tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatTick {
    /// Send a heartbeat carrying this sequence
    Send(Option<u64>),
    /// The previous heartbeat was never acknowledged
    Zombie,
}

/// Gateway session
#[derive(Debug, Clone, Default)]
pub struct Session {
    sequence: Option<u64>,
    session_id: Option<String>,
    resume_url: Option<String>,
    heartbeat_interval: Duration,
    last_heartbeat_sent_at: Option<Instant>,
    last_ack_received_at: Option<Instant>,
    awaiting_ack: bool,
    resumable: bool,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn shared() -> SharedSession {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn resume_url(&self) -> Option<&str> {
        self.resume_url.as_deref()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn last_heartbeat_sent_at(&self) -> Option<Instant> {
        self.last_heartbeat_sent_at
    }

    pub fn last_ack_received_at(&self) -> Option<Instant> {
        self.last_ack_received_at
    }

    /// Record the sequence number of an inbound frame
    ///
    /// The stored sequence never decreases. Returns whether it advanced.
    pub fn update_sequence(&mut self, sequence: u64) -> bool {
        match self.sequence {
            Some(current) if current >= sequence => false,
            _ => {
                self.sequence = Some(sequence);
                true
            }
        }
    }

    /// Store the identity delivered by READY
    pub fn mark_ready(&mut self, session_id: String, resume_url: Option<String>) {
        self.session_id = Some(session_id);
        self.resume_url = resume_url;
        self.resumable = true;
    }

    /// Check if a RESUME can be attempted
    pub fn is_resumable(&self) -> bool {
        self.resumable && self.session_id.is_some() && self.sequence.is_some()
    }

    /// Forget the session; the next connection must IDENTIFY
    pub fn reset(&mut self) {
        self.sequence = None;
        self.session_id = None;
        self.resume_url = None;
        self.resumable = false;
    }

    /// Reset heartbeat bookkeeping for a new connection
    pub fn start_heartbeat(&mut self, interval: Duration) {
        self.heartbeat_interval = interval;
        self.last_heartbeat_sent_at = None;
        self.last_ack_received_at = None;
        self.awaiting_ack = false;
    }

    /// Called on every heartbeat timer tick
    pub fn heartbeat_tick(&mut self, now: Instant) -> HeartbeatTick {
        if self.awaiting_ack {
            return HeartbeatTick::Zombie;
        }
        self.record_heartbeat_sent(now);
        HeartbeatTick::Send(self.sequence)
    }

    /// Record a heartbeat leaving the client
    pub fn record_heartbeat_sent(&mut self, now: Instant) {
        self.last_heartbeat_sent_at = Some(now);
        self.awaiting_ack = true;
    }

    /// Record a HEARTBEAT_ACK
    pub fn record_ack(&mut self, now: Instant) {
        self.last_ack_received_at = Some(now);
        self.awaiting_ack = false;
    }

    pub fn is_awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }

    /// Round-trip time of the last acknowledged heartbeat
    pub fn latency(&self) -> Option<Duration> {
        match (self.last_heartbeat_sent_at, self.last_ack_received_at) {
            (Some(sent), Some(ack)) if ack >= sent => Some(ack - sent),
            _ => None,
        }
    }
}
