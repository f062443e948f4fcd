//! Heartbeat scheduler
//!
//! One task per connection. The first heartbeat goes out after a random fraction of the
//! interval; every later tick checks that the previous heartbeat was acknowledged.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::debug::{DebugEmitter, DebugTag};
use crate::protocol::GatewayMessage;
use crate::session::{HeartbeatTick, SharedSession};
use crate::shard::{OutboundFrame, ShardSignal};

/// Handle of a running heartbeat task; the task stops when the handle is dropped
#[derive(Debug)]
pub struct Heartbeater {
    task: JoinHandle<()>,
}

impl Heartbeater {
    pub fn spawn(
        interval: Duration,
        session: SharedSession,
        outbound: mpsc::Sender<OutboundFrame>,
        signals: mpsc::UnboundedSender<ShardSignal>,
        debug: DebugEmitter,
    ) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let task = tokio::spawn(async move {
            let jitter = interval.mul_f64(rand::random::<f64>());
            tracing::debug!(
                interval_ms = interval.as_millis() as u64,
                jitter_ms = jitter.as_millis() as u64,
                "Heartbeat scheduled"
            );
            tokio::time::sleep(jitter).await;

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let tick = session.lock().heartbeat_tick(Instant::now());
                match tick {
                    HeartbeatTick::Send(sequence) => {
                        let frame = OutboundFrame::Payload(GatewayMessage::heartbeat(sequence));
                        if outbound.send(frame).await.is_err() {
                            tracing::debug!("Outbound channel closed, stopping heartbeat");
                            break;
                        }
                        debug.emit(
                            DebugTag::HeartbeatSent,
                            Some(serde_json::json!({ "seq": sequence })),
                        );
                    }
                    HeartbeatTick::Zombie => {
                        tracing::warn!(
                            interval_ms = interval.as_millis() as u64,
                            "Heartbeat not acknowledged, connection zombied"
                        );
                        debug.emit(DebugTag::MissedAck, None);
                        debug.emit(DebugTag::ZombieConnection, None);
                        let _ = signals.send(ShardSignal::Zombie);
                        break;
                    }
                }
            }
        });

        Self { task }
    }

    /// Stop the heartbeat task
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Heartbeater {
    fn drop(&mut self) {
        self.task.abort();
    }
}
