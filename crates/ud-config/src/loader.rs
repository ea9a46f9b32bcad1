//! YAML configuration loader with custom tag support
//!
//! Supported tags:
//! - `!include path` - Include another YAML file, relative to the including file
//! - `!env_var VAR` - Environment variable substitution

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// YAML loader that resolves custom tags before deserialization
#[derive(Debug, Default)]
pub struct YamlLoader {
    /// Track included files to detect circular includes
    include_stack: HashSet<PathBuf>,
}

impl YamlLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and process a YAML file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "loading YAML file");

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.insert(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.remove(&path);

        result
    }

    /// Load and process YAML from a string
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process_value(value, source_path)
    }

    fn process_value(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    let processed_value = self.process_value(v, source_path)?;
                    result.insert(k, processed_value);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => {
                let result: ConfigResult<Vec<Value>> = seq
                    .into_iter()
                    .map(|v| self.process_value(v, source_path))
                    .collect();
                Ok(Value::Sequence(result?))
            }
            _ => Ok(value),
        }
    }

    fn process_tagged(
        &mut self,
        tagged: serde_yaml::value::TaggedValue,
        source_path: &Path,
    ) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!(%tag, value = ?tagged.value, "processing tag");

        match tag.as_str() {
            "!include" => {
                let include = self.tagged_string(&tag, tagged.value)?;
                let base = source_path.parent().unwrap_or_else(|| Path::new("."));
                let path = base.join(include);
                if !path.exists() {
                    return Err(ConfigError::IncludeNotFound { path });
                }
                self.load_file(path)
            }
            "!env_var" => {
                let var = self.tagged_string(&tag, tagged.value)?;
                let value = std::env::var(&var)
                    .map_err(|_| ConfigError::EnvVarNotFound { var: var.clone() })?;
                debug!(%var, "substituted environment variable");
                Ok(Value::String(value))
            }
            _ => Err(ConfigError::invalid(&tag, "unsupported YAML tag")),
        }
    }

    fn tagged_string(&self, tag: &str, value: Value) -> ConfigResult<String> {
        match value {
            Value::String(s) => Ok(s),
            _ => Err(ConfigError::invalid(tag, "tag argument must be a string")),
        }
    }
}

/// Load a YAML file with tag processing
pub fn load_yaml(path: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new().load_file(path)
}
