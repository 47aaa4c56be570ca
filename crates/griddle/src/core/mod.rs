//! # Batch Execution
//!
//! Everything that happens to one batch of host requests.
//!
//! ## Module Structure
//!
//! * [`adapter`] - Reads each request's inputs as zero-copy views in the
//!   model's configured order, materializing string tensors into fixed-width
//!   text.
//!
//! * [`engine`] - Calls the transform once per batch with the interpreter gate
//!   held, and checks it answered every request.
//!
//! * [`writer`] - Copies transform outputs into host response buffers.
//!
//! * [`executor`] - Drives a batch through all of the above and reports every
//!   request back to the host exactly once, whatever failed along the way.
//!
//! * [`stats`] - Timestamps for the host's statistics reports.
pub mod adapter;
pub mod engine;
pub mod executor;
pub mod stats;
pub mod writer;
