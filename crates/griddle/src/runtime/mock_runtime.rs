use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::core_trait::{EmbeddedRuntime, ModuleSource, Transformer};
use super::gate::GateGuard;
use crate::core::engine::{InferenceResponse, OutputTensor, TransformBatch};
use crate::error::{BackendError, Result};
use crate::model::{ColumnTypeMap, InitializeArgs};

#[derive(Debug, Default)]
pub struct RuntimeCounters {
    pub loads: AtomicUsize,
    pub initializations: AtomicUsize,
    pub finalizations: AtomicUsize,
    pub transformers: AtomicUsize,
}

type Factory = Arc<dyn Fn() -> Box<dyn Transformer> + Send + Sync>;

// A runtime that only counts lifecycle calls and hands out canned transformers
pub struct MockRuntime {
    counters: Arc<RuntimeCounters>,
    loadable: bool,
    factory: Factory,
    loaded: Arc<Mutex<Vec<(ModuleSource, InitializeArgs)>>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::with_transformer(|| Box::new(FnTransformer::echo()))
    }

    pub fn unloadable() -> Self {
        Self {
            loadable: false,
            ..Self::new()
        }
    }

    pub fn with_transformer<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn Transformer> + Send + Sync + 'static,
    {
        Self {
            counters: Arc::default(),
            loadable: true,
            factory: Arc::new(factory),
            loaded: Arc::default(),
        }
    }

    pub fn counters(&self) -> Arc<RuntimeCounters> {
        self.counters.clone()
    }

    pub fn loaded(&self) -> Arc<Mutex<Vec<(ModuleSource, InitializeArgs)>>> {
        self.loaded.clone()
    }
}

impl EmbeddedRuntime for MockRuntime {
    fn load_library(&self) -> Result<()> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        if self.loadable {
            Ok(())
        } else {
            Err(BackendError::RuntimeLoad("libmock.so: cannot open shared object file".to_string()))
        }
    }

    fn initialize(&self) -> Result<()> {
        self.counters.initializations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finalize(&self) -> Result<()> {
        self.counters.finalizations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load_transformer(
        &self,
        _gate: &GateGuard<'_>,
        source: &ModuleSource,
        args: &InitializeArgs,
    ) -> Result<Box<dyn Transformer>> {
        self.counters.transformers.fetch_add(1, Ordering::SeqCst);
        self.loaded.lock().push((source.clone(), args.clone()));
        Ok((self.factory)())
    }
}

/// One response per request, echoing each requested output from the input
/// of the same name.
pub fn echo_responses(batch: &TransformBatch<'_, '_>) -> Vec<InferenceResponse> {
    batch
        .requests()
        .iter()
        .map(|request| {
            let mut outputs = vec![];
            for name in batch.output_names() {
                match request.input(name) {
                    Some(input) => {
                        let array = input.as_native().into_owned();
                        outputs.push(OutputTensor::new(name.clone(), array));
                    }
                    None => return InferenceResponse::failure(format!("no input for output '{name}'")),
                }
            }
            InferenceResponse::success(outputs)
        })
        .collect()
}

type ExecuteFn = dyn Fn(&TransformBatch<'_, '_>) -> Result<Vec<InferenceResponse>> + Send + Sync;

// A transformer driven by a closure, which also checks it is never entered twice at once
pub struct FnTransformer {
    column_types: ColumnTypeMap,
    execute: Box<ExecuteFn>,
    inside: AtomicBool,
    pub calls: Arc<AtomicUsize>,
}

impl FnTransformer {
    pub fn new<F>(execute: F) -> Self
    where
        F: Fn(&TransformBatch<'_, '_>) -> Result<Vec<InferenceResponse>> + Send + Sync + 'static,
    {
        Self {
            column_types: ColumnTypeMap::default(),
            execute: Box::new(execute),
            inside: AtomicBool::new(false),
            calls: Arc::default(),
        }
    }

    pub fn with_column_types(mut self, column_types: ColumnTypeMap) -> Self {
        self.column_types = column_types;
        self
    }

    /// Answers every requested output with the input of the same name.
    pub fn echo() -> Self {
        Self::new(|batch| Ok(echo_responses(batch)))
    }

    pub fn failing(message: &'static str) -> Self {
        Self::new(move |_| Err(BackendError::TransformFailure(message.to_string())))
    }
}

impl Transformer for FnTransformer {
    fn column_types(&self, _gate: &GateGuard<'_>) -> Result<ColumnTypeMap> {
        Ok(self.column_types.clone())
    }

    fn execute(&self, _gate: &GateGuard<'_>, batch: &TransformBatch<'_, '_>) -> Result<Vec<InferenceResponse>> {
        assert!(
            !self.inside.swap(true, Ordering::SeqCst),
            "transformer entered concurrently"
        );
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = (self.execute)(batch);
        self.inside.store(false, Ordering::SeqCst);
        result
    }
}
