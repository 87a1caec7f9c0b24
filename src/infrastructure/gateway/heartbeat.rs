//! Heartbeat Scheduler
//!
//! Runs alongside the receive loop for the lifetime of one socket. Reads
//! the sequence and the active socket from watch cells, so it never sends
//! on a socket that has been superseded.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::connection::{ActiveSocket, Outbound};
use super::messages::GatewaySend;
use crate::infrastructure::metrics;

/// Tracks unacknowledged heartbeats for the missed-ACK watchdog.
#[derive(Debug, Default)]
pub struct HeartbeatMonitor {
    unacked: AtomicU32,
    last_sent: Mutex<Option<Instant>>,
}

impl HeartbeatMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Heartbeats sent since the last ACK.
    pub fn unacked(&self) -> u32 {
        self.unacked.load(Ordering::Acquire)
    }

    pub fn beat_sent(&self) {
        self.unacked.fetch_add(1, Ordering::AcqRel);
        *self.last_sent.lock() = Some(Instant::now());
    }

    /// Record an ACK. Returns the round trip of the last heartbeat if one is pending.
    pub fn ack_received(&self) -> Option<Duration> {
        self.unacked.store(0, Ordering::Release);
        self.last_sent.lock().take().map(|sent| sent.elapsed())
    }

    pub fn reset(&self) {
        self.unacked.store(0, Ordering::Release);
        *self.last_sent.lock() = None;
    }
}

/// Parameters for one heartbeat loop.
pub struct HeartbeatTask {
    pub interval: Duration,
    /// Delay before the first beat (the jittered interval on the first start).
    pub first_delay: Duration,
    /// Socket generation this loop belongs to.
    pub generation: u64,
    /// Consecutive unacknowledged beats tolerated; 0 disables the watchdog.
    pub max_missed_acks: u32,
    pub sequence: watch::Receiver<Option<u64>>,
    pub socket: watch::Receiver<Option<ActiveSocket>>,
    pub monitor: Arc<HeartbeatMonitor>,
    /// Signalled when the watchdog gives up on the connection.
    pub zombie: mpsc::UnboundedSender<()>,
}

/// First-beat delay: `interval * jitter`.
pub fn jittered(interval: Duration, jitter: f64) -> Duration {
    interval.mul_f64(jitter)
}

fn current_socket(
    socket: &watch::Receiver<Option<ActiveSocket>>,
    generation: u64,
) -> Option<ActiveSocket> {
    socket
        .borrow()
        .as_ref()
        .filter(|active| active.generation == generation)
        .cloned()
}

/// Run the heartbeat loop until the socket it was started for is replaced or cleared.
pub async fn run_heartbeat(task: HeartbeatTask) {
    let HeartbeatTask {
        interval,
        first_delay,
        generation,
        max_missed_acks,
        sequence,
        mut socket,
        monitor,
        zombie,
    } = task;

    tracing::debug!(
        generation = generation,
        interval_ms = interval.as_millis() as u64,
        first_delay_ms = first_delay.as_millis() as u64,
        "Heartbeat task started"
    );

    let mut deadline = Instant::now() + first_delay;

    loop {
        tokio::select! {
            biased;

            changed = socket.changed() => {
                if changed.is_err() || current_socket(&socket, generation).is_none() {
                    tracing::debug!(generation = generation, "Socket replaced, heartbeat task exiting");
                    return;
                }
                continue;
            }

            _ = tokio::time::sleep_until(deadline) => {}
        }

        let Some(active) = current_socket(&socket, generation) else {
            return;
        };

        if max_missed_acks > 0 && monitor.unacked() >= max_missed_acks {
            tracing::warn!(
                generation = generation,
                missed = monitor.unacked(),
                "Heartbeat ACKs missed, connection is unresponsive"
            );
            let _ = zombie.send(());
            return;
        }

        let seq = *sequence.borrow();
        if active
            .outbound
            .send(Outbound::Frame(GatewaySend::heartbeat(seq)))
            .is_err()
        {
            tracing::debug!(generation = generation, "Writer closed, heartbeat task exiting");
            return;
        }

        monitor.beat_sent();
        metrics::record_heartbeat();
        tracing::trace!(seq = ?seq, "Heartbeat sent");

        deadline += interval;
    }
}
