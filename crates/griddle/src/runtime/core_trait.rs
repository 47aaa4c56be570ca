use std::fmt;
use std::path::PathBuf;

use super::gate::GateGuard;
use crate::core::engine::{InferenceResponse, TransformBatch};
use crate::error::Result;
use crate::model::{ColumnTypeMap, InitializeArgs};

/// Where the transform for a model is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    /// A module importable by name, from the model's `python_module` parameter.
    Named(String),
    /// A script bundled with the model version, `<repository>/<version>/model.py`.
    ScriptFile(PathBuf),
}

impl fmt::Display for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "module '{name}'"),
            Self::ScriptFile(path) => write!(f, "script '{}'", path.display()),
        }
    }
}

/// An embedded, single-threaded scripting runtime.
///
/// Implementations are only ever driven from behind an
/// [`InterpreterGate`](super::InterpreterGate): `initialize` and
/// `finalize` run with the gate held, and `load_transformer` receives the
/// guard as proof.
pub trait EmbeddedRuntime: Send + Sync {
    /// Locate and load the runtime's dynamic library.
    ///
    /// Failing here should be reported as
    /// [`BackendError::RuntimeLoad`](crate::error::BackendError::RuntimeLoad).
    fn load_library(&self) -> Result<()>;

    fn initialize(&self) -> Result<()>;

    fn finalize(&self) -> Result<()>;

    /// Import `source` and construct its transform, passing it the model and
    /// instance description.
    fn load_transformer(
        &self,
        gate: &GateGuard<'_>,
        source: &ModuleSource,
        args: &InitializeArgs,
    ) -> Result<Box<dyn Transformer>>;
}

/// The opaque feature-engineering computation hosted by the runtime.
///
/// Given the adapted requests of a batch and the requested output names, it
/// answers with one [`InferenceResponse`] per request (carrying either named
/// outputs or that request's own error), or fails the batch as a whole.
/// Responses own their arrays, so nothing produced here can be referenced
/// once the gate is released.
pub trait Transformer: Send + Sync {
    /// Schema introspection: which output columns are categorical.
    fn column_types(&self, gate: &GateGuard<'_>) -> Result<ColumnTypeMap>;

    fn execute(&self, gate: &GateGuard<'_>, batch: &TransformBatch<'_, '_>) -> Result<Vec<InferenceResponse>>;
}
