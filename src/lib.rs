//! Hearth Library
//!
//! Hierarchical configuration with prioritized sources, driver-keyed
//! resource factories built over it, a channel pub/sub registry and timer
//! triggers.

pub mod bag;
pub mod cli;
pub mod config;
pub mod error;
pub mod factory;
pub mod format;
pub mod kernel;
pub mod logging;
pub mod pubsub;
pub mod trigger;

pub use bag::{Bag, Value};
pub use config::Config;
pub use error::{Error, ErrorCode, Result};
pub use factory::{Creator, ResourceConfig, ResourceFactory};
pub use kernel::Kernel;
pub use pubsub::PubSub;
pub use trigger::{Pulse, Recurring, Trigger};
