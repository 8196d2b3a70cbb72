//! Configuration for Postline.
//!
//! Everything is loaded from the environment; every retry count and
//! interval used by the queue, runner, publisher and reconciler is an
//! explicit field here rather than a constant buried in the code.

pub mod error;
pub mod system;

pub use error::{ConfigError, ConfigResult};
pub use system::{
    LinkedInConfig, PublisherConfig, QueueConfig, ReconcilerConfig, SystemConfig,
};
