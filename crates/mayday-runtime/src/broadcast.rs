//! Broadcast scheduler
//!
//! A cancellable periodic task that repeats the emergency packet while the
//! session is active. Two independent rate limits apply: the configured
//! interval and the transport's minimum transmit spacing. Within a session
//! the effective wait between sends is the larger of the two; a restart
//! under a fresh emergency id broadcasts as soon as the hardware spacing
//! since the previous transmission allows.
//!
//! The arming state arrives over a watch channel and every sleep races
//! `changed()`, so a `stop` wakes the task immediately instead of waiting
//! out the current interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use mayday_core::channel::{Effect, EffectSender};
use mayday_core::geo::GeoLocation;
use mayday_core::packet::{EmergencyPayload, MaydayPacket};
use mayday_core::transport::Transport;
use mayday_core::types::{EmergencyId, TimeSource};

use crate::engine::InternalEvent;

// ----------------------------------------------------------------------------
// Arming State
// ----------------------------------------------------------------------------

/// What the scheduler should be repeating right now
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastOrder {
    pub emergency_id: EmergencyId,
    pub message: String,
    /// Fixed location given at `start`; when None the scheduler samples the
    /// link's position on every send
    pub location: Option<GeoLocation>,
}

/// Scheduler input published by the engine over the watch channel
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastState {
    /// None disarms the scheduler entirely
    pub order: Option<BroadcastOrder>,
    /// Sends are paused (not queued) while the link is down
    pub link_up: bool,
}

impl Default for BroadcastState {
    fn default() -> Self {
        Self {
            order: None,
            link_up: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Broadcast Task
// ----------------------------------------------------------------------------

/// Periodic emergency broadcast task
pub struct BroadcastTask<T: TimeSource> {
    interval: Duration,
    port: u16,
    link: Arc<dyn Transport>,
    state_rx: watch::Receiver<BroadcastState>,
    effect_tx: EffectSender,
    internal_tx: mpsc::UnboundedSender<InternalEvent>,
    time_source: T,
    /// Monotonic instant of the last send, session changes notwithstanding
    last_sent_at: Option<Instant>,
    /// Which emergency the last send belonged to
    last_sent_id: Option<EmergencyId>,
}

impl<T: TimeSource> BroadcastTask<T> {
    pub fn new(
        interval: Duration,
        port: u16,
        link: Arc<dyn Transport>,
        state_rx: watch::Receiver<BroadcastState>,
        effect_tx: EffectSender,
        internal_tx: mpsc::UnboundedSender<InternalEvent>,
        time_source: T,
    ) -> Self {
        Self {
            interval,
            port,
            link,
            state_rx,
            effect_tx,
            internal_tx,
            time_source,
            last_sent_at: None,
            last_sent_id: None,
        }
    }

    pub async fn run(mut self) {
        info!("broadcast scheduler starting");

        loop {
            let state = self.state_rx.borrow_and_update().clone();
            let order = match state {
                BroadcastState {
                    order: Some(order),
                    link_up: true,
                } => order,
                _ => {
                    // Disarmed or link down: nothing to pace, just wait for a
                    // state change
                    if self.state_rx.changed().await.is_err() {
                        break;
                    }
                    continue;
                }
            };

            // Within one session the cadence is max(interval, spacing); a
            // fresh emergency id broadcasts as soon as the hardware spacing
            // since the previous transmission allows
            let spacing = self.link.min_send_spacing();
            let gap = if self.last_sent_id == Some(order.emergency_id) {
                self.interval.max(spacing)
            } else {
                spacing
            };
            let deadline = match self.last_sent_at {
                Some(at) => at + gap,
                None => Instant::now(),
            };

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    // The order may have flipped while we slept
                    let current = self.state_rx.borrow().clone();
                    if current.link_up && current.order.as_ref() == Some(&order) {
                        self.send(&order).await;
                    }
                }
                changed = self.state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("broadcast scheduler stopped");
    }

    async fn send(&mut self, order: &BroadcastOrder) {
        let now = self.time_source.now();
        let packet = MaydayPacket::Emergency(EmergencyPayload {
            emergency_id: order.emergency_id,
            message: order.message.clone(),
            location: order.location.or_else(|| self.link.local_position()),
            battery: self.link.battery_level(),
            timestamp: now,
        });

        let payload = match packet.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to encode emergency broadcast: {e}");
                return;
            }
        };

        self.last_sent_at = Some(Instant::now());
        self.last_sent_id = Some(order.emergency_id);
        if self
            .effect_tx
            .send(Effect::BroadcastPacket {
                port: self.port,
                payload,
            })
            .await
            .is_err()
        {
            debug!("effect channel closed, dropping broadcast");
            return;
        }

        debug!(emergency_id = %order.emergency_id, "emergency broadcast queued");
        let _ = self.internal_tx.send(InternalEvent::BroadcastSent {
            emergency_id: order.emergency_id,
            at: now,
        });
    }
}
