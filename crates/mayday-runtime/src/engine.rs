//! Engine task, the dispatch façade
//!
//! A single consumer loop that owns every piece of mutable state: the
//! session, the acknowledgement tracker, the incoming-alert registry, and
//! the proximity monitor. Commands from the shell, events from the
//! transport, and notifications from the sibling tasks all funnel through
//! one `select!`, so no operation can observe a half-updated session or a
//! torn read across the tables.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use mayday_core::channel::{
    AppEvent, AppEventSender, Command, CommandReceiver, Effect, EffectSender, Event, EventReceiver,
};
use mayday_core::config::MaydayConfig;
use mayday_core::geo::GeoLocation;
use mayday_core::packet::{AckPayload, ClearPayload, MaydayPacket};
use mayday_core::proximity::ProximityMonitor;
use mayday_core::registry::AlertRegistry;
use mayday_core::session::{SessionState, StatusSnapshot};
use mayday_core::tracker::AckTracker;
use mayday_core::transport::Transport;
use mayday_core::types::{EmergencyId, NodeId, TimeSource, Timestamp};

use crate::broadcast::{BroadcastOrder, BroadcastState};
use crate::event_log::{EventLog, EventRecord};

// ----------------------------------------------------------------------------
// Inter-Task Notifications
// ----------------------------------------------------------------------------

/// Notifications sent to the engine by the sibling tasks
#[derive(Debug, Clone)]
pub enum InternalEvent {
    /// The scheduler put a broadcast on the air
    BroadcastSent {
        emergency_id: EmergencyId,
        at: Timestamp,
    },
    /// The housekeeping task requests a staleness sweep
    SweepDue,
}

// ----------------------------------------------------------------------------
// Engine State
// ----------------------------------------------------------------------------

/// All mutable engine state, owned exclusively by the engine task
struct EngineState<T: TimeSource> {
    session: SessionState<T>,
    acks: AckTracker<T>,
    alerts: AlertRegistry<T>,
    proximity: ProximityMonitor<T>,
    event_log: Option<EventLog>,
    link_up: bool,
}

// ----------------------------------------------------------------------------
// Engine Task
// ----------------------------------------------------------------------------

/// The dispatch façade: routes commands to the session state machine and
/// inbound packets to the tracker, registry, and proximity monitor
pub struct EngineTask<T: TimeSource + Clone> {
    config: MaydayConfig,
    link: Arc<dyn Transport>,
    time_source: T,
    command_rx: CommandReceiver,
    event_rx: EventReceiver,
    internal_rx: mpsc::UnboundedReceiver<InternalEvent>,
    effect_tx: EffectSender,
    app_event_tx: AppEventSender,
    broadcast_tx: watch::Sender<BroadcastState>,
    state: EngineState<T>,
    running: bool,
}

impl<T: TimeSource + Clone> EngineTask<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: MaydayConfig,
        link: Arc<dyn Transport>,
        time_source: T,
        event_log: Option<EventLog>,
        command_rx: CommandReceiver,
        event_rx: EventReceiver,
        internal_rx: mpsc::UnboundedReceiver<InternalEvent>,
        effect_tx: EffectSender,
        app_event_tx: AppEventSender,
        broadcast_tx: watch::Sender<BroadcastState>,
    ) -> Self {
        let state = EngineState {
            session: SessionState::new(time_source.clone()),
            acks: AckTracker::new(config.ack_timeout(), time_source.clone()),
            alerts: AlertRegistry::new(
                config.alert_retention(),
                config.cleared_grace(),
                time_source.clone(),
            ),
            proximity: ProximityMonitor::new(config.alert_radius_m, time_source.clone()),
            event_log,
            link_up: true,
        };

        Self {
            config,
            link,
            time_source,
            command_rx,
            event_rx,
            internal_rx,
            effect_tx,
            app_event_tx,
            broadcast_tx,
            state,
            running: true,
        }
    }

    pub async fn run(mut self) {
        info!(node = %self.link.local_node(), "engine task starting");

        while self.running {
            tokio::select! {
                Some(command) = self.command_rx.recv() => {
                    self.handle_command(command).await;
                }
                Some(event) = self.event_rx.recv() => {
                    self.handle_event(event).await;
                }
                Some(internal) = self.internal_rx.recv() => {
                    self.handle_internal(internal);
                }
                else => {
                    debug!("all channels closed, stopping engine");
                    break;
                }
            }
        }

        info!("engine task stopped");
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start {
                message,
                location,
                reply,
            } => {
                let message =
                    message.unwrap_or_else(|| self.config.default_message.clone());
                let outcome = self.state.session.start(message, location);
                self.state.acks.register_session(outcome.id);
                if outcome.restarted {
                    warn!(emergency_id = %outcome.id, "emergency broadcast restarted under a fresh id");
                } else {
                    warn!(emergency_id = %outcome.id, "emergency broadcast started");
                }
                self.publish_broadcast_state();
                let _ = reply.send(outcome.id);
            }

            Command::Stop { reply } => match self.state.session.stop() {
                Ok(id) => {
                    self.publish_broadcast_state();
                    warn!(emergency_id = %id, "emergency broadcast stopped, announcing all-clear");
                    self.send_clear(id).await;
                    let _ = reply.send(Ok(()));
                }
                Err(e) => {
                    info!("stop requested but no session is active");
                    let _ = reply.send(Err(e.into()));
                }
            },

            Command::Clear { reply } => match self.state.session.clear_target() {
                Ok(id) => {
                    info!(emergency_id = %id, "re-announcing all-clear");
                    self.send_clear(id).await;
                    let _ = reply.send(Ok(()));
                }
                Err(e) => {
                    info!("clear requested but no prior session exists");
                    let _ = reply.send(Err(e.into()));
                }
            },

            Command::Status { reply } => {
                let _ = reply.send(self.snapshot());
            }

            Command::Shutdown => {
                self.shutdown().await;
            }
        }
    }

    async fn shutdown(&mut self) {
        info!("engine shutting down");
        // Best-effort final all-clear when a session is still active
        if let Ok(id) = self.state.session.stop() {
            self.publish_broadcast_state();
            self.send_clear(id).await;
        }
        self.running = false;
    }

    fn snapshot(&self) -> StatusSnapshot {
        let session = self.state.session.current_session();
        let emergency_id = session.map(|s| s.id);
        StatusSnapshot {
            session_active: self.state.session.is_active(),
            emergency_id,
            started_at: session.map(|s| s.started_at),
            sent_count: session.map(|s| s.sent_count).unwrap_or(0),
            acknowledged_by: emergency_id
                .map(|id| self.state.acks.confirmed_for(id))
                .unwrap_or_default(),
            incoming_alerts: self.state.alerts.active_alerts(),
        }
    }

    // ------------------------------------------------------------------------
    // Inbound Events
    // ------------------------------------------------------------------------

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::PacketReceived {
                from,
                port,
                payload,
                received_at,
            } => {
                if from == self.link.local_node() {
                    return;
                }
                if port != self.config.port {
                    trace!(%from, port, "ignoring packet on unrelated port");
                    return;
                }
                match MaydayPacket::decode(&payload) {
                    Ok(packet) => self.handle_packet(from, packet, received_at).await,
                    Err(e) => {
                        // Dropped, never fatal to the dispatch path
                        warn!(%from, "dropping malformed packet: {e}");
                    }
                }
            }

            Event::PositionReceived { from, location, .. } => {
                if from == self.link.local_node() {
                    return;
                }
                self.check_proximity(from, location);
            }

            Event::LinkUp => {
                if !self.state.link_up {
                    info!("mesh link up, resuming broadcast attempts");
                }
                self.state.link_up = true;
                self.publish_broadcast_state();
                self.notify(AppEvent::LinkStatusChanged { up: true });
            }

            Event::LinkDown => {
                warn!("mesh link down, pausing broadcast attempts");
                self.state.link_up = false;
                self.publish_broadcast_state();
                self.notify(AppEvent::LinkStatusChanged { up: false });
            }
        }
    }

    async fn handle_packet(&mut self, from: NodeId, packet: MaydayPacket, received_at: Timestamp) {
        if let Some(log) = self.state.event_log.as_mut() {
            log.append(&EventRecord {
                at: received_at,
                kind: packet.kind(),
                emergency_id: packet.emergency_id(),
                originator: from,
            });
        }

        match packet {
            MaydayPacket::Emergency(p) => {
                let created = self.state.alerts.upsert(
                    p.emergency_id,
                    from,
                    p.message,
                    p.location,
                    p.battery,
                );
                if created {
                    warn!(%from, emergency_id = %p.emergency_id, "emergency received");
                } else {
                    debug!(%from, emergency_id = %p.emergency_id, "emergency refreshed");
                }

                // One directed acknowledgement straight back to the sender
                self.send_ack(from, p.emergency_id).await;

                if let Some(alert) = self.state.alerts.get(p.emergency_id) {
                    self.notify(AppEvent::EmergencyReceived {
                        alert: alert.clone(),
                    });
                }
            }

            MaydayPacket::Ack(p) => {
                if self.state.acks.record_ack(p.emergency_id, from) {
                    info!(%from, emergency_id = %p.emergency_id, "acknowledgement received");
                    self.notify(AppEvent::AckReceived {
                        from,
                        emergency_id: p.emergency_id,
                    });
                } else {
                    debug!(%from, emergency_id = %p.emergency_id, "ignoring ack for an emergency that is not ours");
                }
            }

            MaydayPacket::Clear(p) => {
                if self.state.alerts.mark_cleared(p.emergency_id) {
                    info!(%from, emergency_id = %p.emergency_id, "all-clear received");
                    self.notify(AppEvent::AlertCleared {
                        from,
                        emergency_id: p.emergency_id,
                    });
                } else {
                    debug!(%from, emergency_id = %p.emergency_id, "all-clear for an untracked emergency");
                }
            }
        }
    }

    fn check_proximity(&mut self, from: NodeId, location: GeoLocation) {
        if !self.state.proximity.is_enabled() {
            return;
        }
        let Some(ours) = self.link.local_position() else {
            debug!("own position unknown, skipping proximity check");
            return;
        };
        if let Some(distance) = self.state.proximity.observe(from, location, ours) {
            warn!(node = %from, distance_m = format_args!("{distance:.1}"), "proximity alert: node within alert radius");
            self.notify(AppEvent::ProximityAlert {
                node: from,
                distance_m: distance,
            });
        }
    }

    // ------------------------------------------------------------------------
    // Internal Notifications
    // ------------------------------------------------------------------------

    fn handle_internal(&mut self, internal: InternalEvent) {
        match internal {
            InternalEvent::BroadcastSent { emergency_id, at } => {
                self.state.session.record_send(emergency_id, at);
                self.notify(AppEvent::BroadcastSent { emergency_id, at });
            }
            InternalEvent::SweepDue => {
                let acks = self.state.acks.purge_stale();
                let alerts = self.state.alerts.purge_stale();
                let proximity = self.state.proximity.evict_cold();
                if acks + alerts + proximity > 0 {
                    debug!(acks, alerts, proximity, "housekeeping evicted stale entries");
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Outputs
    // ------------------------------------------------------------------------

    async fn send_clear(&mut self, id: EmergencyId) {
        let packet = MaydayPacket::Clear(ClearPayload {
            emergency_id: id,
            timestamp: self.time_source.now(),
        });
        self.emit_broadcast(packet).await;
    }

    async fn send_ack(&mut self, to: NodeId, id: EmergencyId) {
        let packet = MaydayPacket::Ack(AckPayload {
            emergency_id: id,
            timestamp: self.time_source.now(),
        });
        let payload = match packet.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to encode {} packet: {e}", packet.kind());
                return;
            }
        };
        let _ = self
            .effect_tx
            .send(Effect::SendPacket {
                to,
                port: self.config.port,
                payload,
            })
            .await;
    }

    async fn emit_broadcast(&mut self, packet: MaydayPacket) {
        let payload = match packet.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to encode {} packet: {e}", packet.kind());
                return;
            }
        };
        let _ = self
            .effect_tx
            .send(Effect::BroadcastPacket {
                port: self.config.port,
                payload,
            })
            .await;
    }

    fn publish_broadcast_state(&self) {
        let order = self.state.session.active_session().map(|s| BroadcastOrder {
            emergency_id: s.id,
            message: s.message.clone(),
            location: s.location,
        });
        let _ = self.broadcast_tx.send(BroadcastState {
            order,
            link_up: self.state.link_up,
        });
    }

    fn notify(&self, event: AppEvent) {
        // Best-effort: a shell that is not draining its queue loses
        // notifications, never blocks the engine
        let _ = self.app_event_tx.try_send(event);
    }
}
