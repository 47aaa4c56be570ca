use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use super::config::ModelConfig;
use crate::error::{BackendError, Result};
use crate::runtime::ModuleSource;
use crate::tensor::DataType;

/// Script loaded from the model version directory when no module override is set.
pub const DEFAULT_SCRIPT: &str = "model.py";

/// A configured output: what the transform must produce and the dtype the
/// host expects back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDescriptor {
    pub name: String,
    pub dtype: DataType,
}

/// Where an instance of the model runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceKind {
    #[default]
    Auto,
    Cpu,
    Gpu,
    Model,
}

impl fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Auto => "AUTO",
            Self::Cpu => "CPU",
            Self::Gpu => "GPU",
            Self::Model => "MODEL",
        };
        f.write_str(kind)
    }
}

/// Identity of one model instance, as assigned by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdentity {
    pub name: String,
    pub kind: InstanceKind,
    pub device_id: i32,
}

impl InstanceIdentity {
    pub fn new(name: impl Into<String>, kind: InstanceKind, device_id: i32) -> Self {
        Self {
            name: name.into(),
            kind,
            device_id,
        }
    }
}

/// Arguments handed to the transform when it is loaded.
///
/// Serializes to the flat string map the transform's `initialize` expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitializeArgs {
    pub model_config: String,
    pub model_version: String,
    pub model_name: String,
    pub model_repository: String,
    pub model_instance_kind: String,
    pub model_instance_name: String,
    pub model_instance_device_id: String,
}

impl InitializeArgs {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| BackendError::Config(e.to_string()))
    }
}

/// Model-level state shared by every instance of one model.
#[derive(Debug, Clone)]
pub struct ModelState {
    name: String,
    version: u64,
    repository: PathBuf,
    config_json: String,
    config: ModelConfig,
    input_names: Vec<String>,
    outputs: Vec<OutputDescriptor>,
}

impl ModelState {
    /// Parse and validate the model configuration.
    ///
    /// The configuration must declare at least one input, and input and
    /// output names must each be unique. Input names are what requests are
    /// later adapted against.
    pub fn new(
        name: impl Into<String>,
        version: u64,
        repository: impl Into<PathBuf>,
        config_json: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let config_json = config_json.into();
        let config = ModelConfig::from_json(&config_json)?;

        if config.input.is_empty() {
            return Err(BackendError::Config(format!("model '{name}' declares no inputs")));
        }
        let input_names: Vec<String> = config.input.iter().map(|t| t.name.clone()).collect();
        ensure_unique(&name, "input", &input_names)?;

        let outputs = config
            .output
            .iter()
            .map(|t| {
                Ok(OutputDescriptor {
                    name: t.name.clone(),
                    dtype: t.dtype()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let output_names: Vec<String> = outputs.iter().map(|o| o.name.clone()).collect();
        ensure_unique(&name, "output", &output_names)?;

        let state = Self {
            name,
            version,
            repository: repository.into(),
            config_json,
            config,
            input_names,
            outputs,
        };
        info!(
            model = %state.name,
            version = state.version,
            inputs = state.input_names.len(),
            outputs = state.outputs.len(),
            "model state initialized"
        );
        Ok(state)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn repository(&self) -> &Path {
        &self.repository
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn outputs(&self) -> &[OutputDescriptor] {
        &self.outputs
    }

    pub fn output_names(&self) -> Vec<String> {
        self.outputs.iter().map(|o| o.name.clone()).collect()
    }

    /// The module override if configured, otherwise `<repository>/<version>/model.py`.
    pub fn module_source(&self) -> ModuleSource {
        match self.config.python_module() {
            Some(module) => ModuleSource::Named(module.to_string()),
            None => ModuleSource::ScriptFile(
                self.repository
                    .join(self.version.to_string())
                    .join(DEFAULT_SCRIPT),
            ),
        }
    }

    pub fn initialize_args(&self, instance: &InstanceIdentity) -> InitializeArgs {
        InitializeArgs {
            model_config: self.config_json.clone(),
            model_version: self.version.to_string(),
            model_name: self.name.clone(),
            model_repository: self.repository.display().to_string(),
            model_instance_kind: instance.kind.to_string(),
            model_instance_name: instance.name.clone(),
            model_instance_device_id: instance.device_id.to_string(),
        }
    }
}

fn ensure_unique(model: &str, what: &str, names: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(BackendError::Config(format!(
                "model '{model}' declares {what} '{name}' more than once"
            )));
        }
    }
    Ok(())
}
