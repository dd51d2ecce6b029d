//! Runtime for rindex.
//!
//! Loads a [`RuntimeConfig`] and runs the [`Bootstrap`] pipeline: install
//! logging at the configured level, connect a store, and register one
//! repository per configured collection. A [`ConnectionRegistry`] keeps live
//! client connections for pushing events.
//!
//! # Key Types
//!
//! - [`RuntimeConfig`] - TOML configuration: name, log level, collections
//! - [`Bootstrap`] - Ordered, fail-fast pipeline of [`InitStep`]s
//! - [`Runtime`] - The bootstrapped result: store, repositories, connections
//! - [`ConnectionRegistry`] - Connection table keyed by generated ids

pub mod bootstrap;
pub mod config;
pub mod connections;
pub mod error;
pub mod logging;

pub use bootstrap::{
    Bootstrap, BootstrapContext, BootstrapReport, ConnectStore, InitLogging, InitStep,
    RegisterRepositories, Runtime, StepOutcome, StepResult,
};
pub use config::RuntimeConfig;
pub use connections::{
    ChannelSink, ConnectionId, ConnectionInfo, ConnectionRegistry, ConnectionSink, Envelope,
};
pub use error::{BootstrapError, RuntimeError, RuntimeResult};
pub use logging::init_logging;
