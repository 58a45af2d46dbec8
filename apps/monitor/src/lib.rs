//! Uppe monitoring engine.
//!
//! Probes a set of monitors on their own intervals, keeps a bounded history
//! of results, opens and resolves incidents on up/down transitions and sends
//! alerts when an incident opens. State is persisted through a pluggable
//! [`database::StateStore`].

pub mod config;
pub mod database;
pub mod diagnostics;
pub mod error;
pub mod ledger;
pub mod models;
pub mod monitoring;
pub mod notification;
pub mod orchestrator;
pub mod pool;

pub use error::EngineError;
pub use orchestrator::{EngineOptions, Orchestrator};
