//! The host's model configuration, as JSON.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{BackendError, Result};
use crate::tensor::DataType;

/// Name of the parameter that overrides which module the transform is loaded from.
pub const PYTHON_MODULE_PARAMETER: &str = "python_module";

/// A `parameters` entry of the model configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParameterValue {
    #[serde(default)]
    pub string_value: String,
}

/// One `input` or `output` entry of the model configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorConfig {
    pub name: String,
    pub data_type: String,
    #[serde(default, deserialize_with = "deserialize_dims")]
    pub dims: Vec<i64>,
}

impl TensorConfig {
    pub fn dtype(&self) -> Result<DataType> {
        DataType::from_config_str(&self.data_type).ok_or_else(|| {
            BackendError::Config(format!(
                "tensor '{}' has unknown data_type '{}'",
                self.name, self.data_type
            ))
        })
    }
}

/// The parts of a model configuration the backend reads.
///
/// Unknown fields are ignored, so the full configuration the host hands over
/// can be parsed as is.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub max_batch_size: i64,
    #[serde(default)]
    pub input: Vec<TensorConfig>,
    #[serde(default)]
    pub output: Vec<TensorConfig>,
    #[serde(default)]
    pub parameters: HashMap<String, ParameterValue>,
}

impl ModelConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| BackendError::Config(format!("invalid model configuration: {e}")))
    }

    /// String value of a named parameter, if set.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(|p| p.string_value.as_str())
    }

    /// The module override, when set to a non-empty value.
    pub fn python_module(&self) -> Option<&str> {
        self.parameter(PYTHON_MODULE_PARAMETER).filter(|m| !m.is_empty())
    }

    pub fn input_by_name(&self, name: &str) -> Option<&TensorConfig> {
        self.input.iter().find(|t| t.name == name)
    }

    pub fn output_by_name(&self, name: &str) -> Option<&TensorConfig> {
        self.output.iter().find(|t| t.name == name)
    }

    pub fn supports_batching(&self) -> bool {
        self.max_batch_size > 0
    }
}

// Protobuf JSON renders int64 as strings, so dims may arrive either way.
fn deserialize_dims<'de, D>(deserializer: D) -> std::result::Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Dim {
        Int(i64),
        Text(String),
    }

    Vec::<Dim>::deserialize(deserializer)?
        .into_iter()
        .map(|dim| match dim {
            Dim::Int(value) => Ok(value),
            Dim::Text(text) => text
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("dimension '{text}' is not an integer"))),
        })
        .collect()
}
