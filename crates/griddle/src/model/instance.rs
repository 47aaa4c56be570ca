use std::sync::Arc;

use tracing::{info, warn};

use super::columns::ColumnTypeMap;
use super::state::{InstanceIdentity, ModelState};
use crate::core::engine::{InferenceResponse, TransformBatch};
use crate::core::executor::{BatchExecutor, BatchReport};
use crate::error::{BackendError, Result};
use crate::host::Host;
use crate::runtime::{GateGuard, InterpreterGate, Transformer};

/// One instance of a model: the host context it answers through and the
/// transform loaded for it.
///
/// The transform is loaded under the gate when the instance is created and
/// dropped under the gate when the instance is dropped. Several instances,
/// of the same or different models, share a single gate.
pub struct ModelInstance<H: Host> {
    model: Arc<ModelState>,
    gate: Arc<InterpreterGate>,
    host: H,
    identity: InstanceIdentity,
    transformer: Box<dyn Transformer>,
    column_types: ColumnTypeMap,
}

impl<H: Host> ModelInstance<H> {
    /// Load the model's transform and introspect its output columns.
    ///
    /// The gate must already be started.
    pub fn new(
        model: Arc<ModelState>,
        gate: Arc<InterpreterGate>,
        host: H,
        identity: InstanceIdentity,
    ) -> Result<Self> {
        let source = model.module_source();
        let args = model.initialize_args(&identity);
        info!(
            model = model.name(),
            instance = %identity.name,
            kind = %identity.kind,
            device_id = identity.device_id,
            %source,
            "initializing model instance"
        );

        let (transformer, column_types) = {
            let guard = gate.acquire()?;
            let transformer = guard.runtime().load_transformer(&guard, &source, &args)?;
            let column_types = transformer.column_types(&guard)?;
            (transformer, column_types)
        };

        Ok(Self {
            model,
            gate,
            host,
            identity,
            transformer,
            column_types,
        })
    }

    /// Execute one batch on the calling thread.
    pub fn execute(&self, requests: Vec<H::Request>) -> BatchReport {
        info!(
            model = self.model.name(),
            instance = %self.identity.name,
            "executing {} requests",
            requests.len()
        );
        BatchExecutor::new(
            &self.host,
            &self.gate,
            self.transformer.as_ref(),
            &self.model,
            &self.column_types,
        )
        .execute(requests)
    }

    pub fn model(&self) -> &ModelState {
        &self.model
    }

    pub fn identity(&self) -> &InstanceIdentity {
        &self.identity
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn gate(&self) -> &Arc<InterpreterGate> {
        &self.gate
    }

    pub fn column_types(&self) -> &ColumnTypeMap {
        &self.column_types
    }
}

impl<H: Host> Drop for ModelInstance<H> {
    fn drop(&mut self) {
        let transformer = std::mem::replace(&mut self.transformer, Box::new(Unloaded));
        match self.gate.acquire() {
            Ok(_guard) => drop(transformer),
            Err(e) => {
                warn!(instance = %self.identity.name, error = %e, "dropping transform without the interpreter gate");
                drop(transformer);
            }
        }
        info!(instance = %self.identity.name, "model instance finalized");
    }
}

// Takes the transform's place while the instance is being dropped
struct Unloaded;

impl Transformer for Unloaded {
    fn column_types(&self, _gate: &GateGuard<'_>) -> Result<ColumnTypeMap> {
        Ok(ColumnTypeMap::default())
    }

    fn execute(&self, _gate: &GateGuard<'_>, _batch: &TransformBatch<'_, '_>) -> Result<Vec<InferenceResponse>> {
        Err(BackendError::GateStopped)
    }
}
