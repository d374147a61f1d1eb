//! Mayday Runtime
//!
//! Wires the channels, spawns the engine, broadcast scheduler, housekeeping
//! task, and effect executor, and hands back an [`EngineHandle`] for the
//! shell. The runtime owns no protocol state itself; everything mutable
//! lives inside the engine task.
//!
//! Shutdown is graceful: a shutdown command lets the engine attempt one
//! final all-clear, the watch channel closing stops the scheduler, and the
//! remaining tasks are joined with a timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use mayday_core::channel::{
    create_app_event_channel, create_command_channel, create_effect_channel, AppEventReceiver,
    Command, CommandSender, Effect, EffectReceiver, EventReceiver,
};
use mayday_core::config::{ChannelConfig, MaydayConfig};
use mayday_core::geo::GeoLocation;
use mayday_core::session::StatusSnapshot;
use mayday_core::transport::Transport;
use mayday_core::types::{EmergencyId, SystemTimeSource};
use mayday_core::{MaydayError, Result};

use crate::broadcast::{BroadcastState, BroadcastTask};
use crate::engine::EngineTask;
use crate::event_log::EventLog;
use crate::housekeeping::HousekeepingTask;

/// Upper bound on a single transport send
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// How long shutdown waits for each task before aborting it
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ----------------------------------------------------------------------------
// Runtime
// ----------------------------------------------------------------------------

/// Orchestrator for the engine and its sibling tasks
pub struct MaydayRuntime {
    config: MaydayConfig,
    channels: ChannelConfig,
    link: Arc<dyn Transport>,
    handles: Vec<JoinHandle<()>>,
    command_tx: Option<CommandSender>,
}

impl MaydayRuntime {
    /// Create a runtime; configuration problems are fatal here, before
    /// anything starts
    pub fn new(config: MaydayConfig, link: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            channels: ChannelConfig::default(),
            link,
            handles: Vec::new(),
            command_tx: None,
        })
    }

    /// Spawn the engine and its sibling tasks. The caller supplies the
    /// receiving end of the event channel whose sender it gave to the link,
    /// and gets back the command handle plus the app-event stream.
    pub fn start(&mut self, event_rx: EventReceiver) -> Result<(EngineHandle, AppEventReceiver)> {
        if self.command_tx.is_some() {
            return Err(MaydayError::channel_error("runtime already started"));
        }

        let (command_tx, command_rx) = create_command_channel(self.channels.command_buffer_size);
        let (effect_tx, effect_rx) = create_effect_channel(self.channels.effect_buffer_size);
        let (app_event_tx, app_event_rx) =
            create_app_event_channel(self.channels.app_event_buffer_size);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = watch::channel(BroadcastState::default());

        let event_log = match &self.config.event_log {
            Some(path) => match EventLog::open(path) {
                Ok(log) => Some(log),
                Err(e) => {
                    warn!(path = %path.display(), "could not open event log, continuing without: {e}");
                    None
                }
            },
            None => None,
        };

        let engine = EngineTask::new(
            self.config.clone(),
            Arc::clone(&self.link),
            SystemTimeSource,
            event_log,
            command_rx,
            event_rx,
            internal_rx,
            effect_tx.clone(),
            app_event_tx,
            broadcast_tx,
        );
        let broadcaster = BroadcastTask::new(
            self.config.interval(),
            self.config.port,
            Arc::clone(&self.link),
            broadcast_rx,
            effect_tx,
            internal_tx.clone(),
            SystemTimeSource,
        );
        let housekeeping = HousekeepingTask::new(self.config.sweep_interval(), internal_tx);

        self.handles.push(tokio::spawn(engine.run()));
        self.handles.push(tokio::spawn(broadcaster.run()));
        self.handles.push(tokio::spawn(housekeeping.run()));
        self.handles.push(tokio::spawn(run_effect_executor(
            Arc::clone(&self.link),
            effect_rx,
        )));

        info!("runtime started");
        self.command_tx = Some(command_tx.clone());
        Ok((EngineHandle { command_tx }, app_event_rx))
    }

    /// Stop every task, letting the engine attempt a final all-clear first
    pub async fn shutdown(mut self) {
        info!("runtime shutting down");
        if let Some(command_tx) = self.command_tx.take() {
            let _ = command_tx.send(Command::Shutdown).await;
        }

        for handle in self.handles.drain(..) {
            let abort = handle.abort_handle();
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
                warn!("task did not stop in time, aborting");
                abort.abort();
            }
        }
        info!("runtime shutdown complete");
    }
}

// ----------------------------------------------------------------------------
// Engine Handle
// ----------------------------------------------------------------------------

/// Command interface to a running engine
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: CommandSender,
}

impl EngineHandle {
    /// Begin (or restart) the emergency broadcast
    pub async fn start(
        &self,
        message: Option<String>,
        location: Option<GeoLocation>,
    ) -> Result<EmergencyId> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Start {
            message,
            location,
            reply,
        })
        .await?;
        response
            .await
            .map_err(|_| MaydayError::channel_error("engine dropped the reply"))
    }

    /// Stop the broadcast and announce all-clear
    pub async fn stop(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Stop { reply }).await?;
        response
            .await
            .map_err(|_| MaydayError::channel_error("engine dropped the reply"))?
    }

    /// Re-announce all-clear for the most recent emergency
    pub async fn clear(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Clear { reply }).await?;
        response
            .await
            .map_err(|_| MaydayError::channel_error("engine dropped the reply"))?
    }

    /// Snapshot the session, acknowledgements, and incoming alerts
    pub async fn status(&self) -> Result<StatusSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Status { reply }).await?;
        response
            .await
            .map_err(|_| MaydayError::channel_error("engine dropped the reply"))
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| MaydayError::channel_error("engine is not running"))
    }
}

// ----------------------------------------------------------------------------
// Effect Executor
// ----------------------------------------------------------------------------

/// Executes send effects against the link, time-bounded so a stalled
/// transport can never wedge the engine or housekeeping paths
async fn run_effect_executor(link: Arc<dyn Transport>, mut effect_rx: EffectReceiver) {
    debug!("effect executor starting");

    while let Some(effect) = effect_rx.recv().await {
        let result = match &effect {
            Effect::BroadcastPacket { port, payload } => {
                tokio::time::timeout(SEND_TIMEOUT, link.broadcast(*port, payload)).await
            }
            Effect::SendPacket { to, port, payload } => {
                tokio::time::timeout(SEND_TIMEOUT, link.send_to(*to, *port, payload)).await
            }
        };

        match result {
            Err(_) => warn!("transport send timed out"),
            // Not queued for retry: the next broadcast cycle covers it
            Ok(Err(e)) => warn!("transport send failed: {e}"),
            Ok(Ok(())) => {}
        }
    }

    debug!("effect executor stopped");
}
