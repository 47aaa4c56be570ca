//! # Models
//!
//! Model-level configuration and the per-instance entry point.
//!
//! * [`config`] parses the host's JSON model configuration
//! * [`ModelState`] validates it once per model and decides where the
//!   transform is loaded from
//! * [`ModelInstance`] loads the transform under the interpreter gate and
//!   executes batches for one instance
//! * [`BatchDispatcher`] runs those batches from async code without blocking
//!   the reactor

pub mod config;
mod columns;
mod dispatch;
mod instance;
mod state;

pub use columns::ColumnTypeMap;
pub use config::{ModelConfig, ParameterValue, TensorConfig};
pub use dispatch::BatchDispatcher;
pub use instance::ModelInstance;
pub use state::{InitializeArgs, InstanceIdentity, InstanceKind, ModelState, OutputDescriptor, DEFAULT_SCRIPT};
