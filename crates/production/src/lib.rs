//! Production runner with async I/O.
//!
//! This crate provides the production runner that wraps the deterministic
//! state machine with real async I/O:
//!
//! - Events via tokio mpsc channels
//! - Timers via spawned tokio tasks
//! - Store reads and writes via `spawn_blocking`
//! - Channel fan-out via per-session tokio broadcast channels
//!
//! # Architecture
//!
//! Uses the event aggregator pattern: a single task owns the state machine
//! and receives events via an mpsc channel. This avoids mutex contention.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                        Stewarding Node                             │
//! │                                                                    │
//! │  ProductionRunner (one task owns the state machine)                │
//! │  ┌────────────────────────────────────────────────────────────────┐│
//! │  │  loop { event = recv(); actions = machine.handle(event); }     ││
//! │  └────────────────────────────────────────────────────────────────┘│
//! │         │                      │                       │           │
//! │         ▼                      ▼                       ▼           │
//! │  TimerManager           Store tasks             SessionChannels    │
//! │  - flush tick           - penalty writes        - live fan-out     │
//! │  (dedicated channel)    - rulebook fetch        - broadcast        │
//! │                         (spawn_blocking)        - viewer control   │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Timer fires and store callbacks re-enter the loop as events on
//! higher-priority channels, so the flush tick is never queued behind a
//! telemetry flood. The axum RPC surface talks to the loop the same way:
//! director commands become events; reads come from mirrors the loop
//! maintains.

mod channels;
pub mod metrics;
pub mod rpc;
mod runner;
mod storage;
pub mod telemetry;
mod timers;

pub use channels::{SessionChannels, ViewerControl};
pub use telemetry::{init_telemetry, TelemetryConfig, TelemetryError};
pub use timers::TimerManager;

pub use runner::{
    ProductionRunner, ProductionRunnerBuilder, RunnerError, RunnerHandle, ShutdownHandle,
};
pub use storage::{
    FileRulebookStore, InMemoryPenaltyStore, PenaltyStore, RulebookStore, SharedPenaltyStore,
    SharedRulebookStore, StoreError,
};
