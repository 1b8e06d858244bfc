//! Runtime core: the work queue and its moving parts.
//!
//! The public API from this module is [`WorkQueue`] (built through
//! [`WorkQueueBuilder`]) and its [`QueueConfig`].
//!
//! Internal modules:
//! - [`queue`]: pending sequence, admission, active/idle transitions, abort;
//! - [`runner`]: runs one admitted item with panic isolation and completion hooks;
//! - [`builder`]: wires registries, listeners and subscribers into a queue;
//! - [`config`]: queue settings;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod config;
mod queue;
mod runner;
mod shutdown;

pub use builder::WorkQueueBuilder;
pub use config::QueueConfig;
pub use queue::WorkQueue;
pub use shutdown::wait_for_shutdown_signal;
