//! # Host Capabilities
//!
//! The inference-serving host owns request lifetimes, buffer allocation,
//! response delivery and statistics. This module describes the slice of that
//! API the backend consumes, as traits, so the batching logic never depends
//! on a particular host binding.
//!
//! ## Usage
//!
//! A host binding implements [`Host`] for its per-instance context along with
//! [`HostRequest`] and [`HostResponse`] for its request and response handles,
//! then hands batches of requests to a model instance.

mod core_trait;

pub use core_trait::*;

#[cfg(test)]
/// Mock host implementation.
///
/// Keeps every lifecycle call in an ordered event log
pub(crate) mod mock_host;
