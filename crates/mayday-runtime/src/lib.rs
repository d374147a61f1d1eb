//! Mayday Runtime Engine
//!
//! This crate contains the running engine for the Mayday emergency beacon:
//!
//! - `EngineTask`: the dispatch façade owning all mutable state
//! - `BroadcastTask`: the cancellable periodic emergency broadcaster
//! - `HousekeepingTask`: the independent staleness sweep
//! - `MaydayRuntime`: the orchestrator that wires channels and spawns tasks
//!
//! `mayday-core` provides the protocol types and bookkeeping components;
//! this crate makes them run.

pub mod broadcast;
pub mod engine;
pub mod event_log;
pub mod housekeeping;
mod runtime;

pub use broadcast::{BroadcastOrder, BroadcastState, BroadcastTask};
pub use engine::{EngineTask, InternalEvent};
pub use event_log::{EventLog, EventRecord};
pub use housekeeping::HousekeepingTask;
pub use runtime::{EngineHandle, MaydayRuntime};

// Re-export core types for convenience
pub use mayday_core::{
    channel::{
        create_app_event_channel, create_command_channel, create_effect_channel,
        create_event_channel, AppEventReceiver, AppEventSender, CommandReceiver, CommandSender,
        EffectReceiver, EffectSender, EventReceiver, EventSender,
    },
    AppEvent, Command, Effect, Event, MaydayConfig, MaydayError, Result, StatusSnapshot,
    Transport,
};
