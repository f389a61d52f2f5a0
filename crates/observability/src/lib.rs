//! Process-wide tracing setup shared by every binary.

pub mod subscriber;

pub use subscriber::{LogConfig, LogFormat};

/// Initialize tracing from the environment.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    subscriber::init(LogConfig::from_env());
}
