//! Engine data model: monitors, incidents and settings.

pub mod incident;
pub mod monitor;
pub mod settings;

pub use incident::Incident;
pub use monitor::{MAX_INTERVAL_SECONDS, Monitor, NewMonitor};
pub use settings::Settings;
