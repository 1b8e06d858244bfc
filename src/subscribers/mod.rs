//! # Event subscribers for the migravisor runtime.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`]
//! fan-out used by the work queue to deliver runtime [`Event`](crate::Event)s
//! to observers (logging, metrics, dashboards).
//!
//! ## Architecture
//! ```text
//! WorkQueue / workers ── publish(Event) ──► Bus ──► queue event listener
//!                                                        │
//!                                                        ▼
//!                                                  SubscriberSet::emit
//!                                              ┌─────────┼─────────┐
//!                                              ▼         ▼         ▼
//!                                          LogWriter  Metrics   Custom
//! ```
//!
//! Subscribers are passive: they can never slow down or block the scheduler.
//! For state the observer must not miss, use [`QueueListener`](crate::QueueListener).

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod embedded;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
