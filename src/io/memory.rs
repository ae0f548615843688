//! In-memory `ScienceFile`, used to drive extractors without touching GDAL.
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::io::science::{ScienceFile, Variable};

#[derive(Debug, Clone, Default)]
pub struct InMemoryFile {
    name: String,
    variables: HashMap<String, Variable>,
    globals: HashMap<String, String>,
}

impl InMemoryFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.insert(variable.name.clone(), variable);
        self
    }

    pub fn with_global(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.globals.insert(key.into(), value.into());
        self
    }
}

impl ScienceFile for InMemoryFile {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn variable(&self, name: &str) -> Result<Variable> {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::MissingVariable(name.to_string()))
    }

    fn global_attribute(&self, key: &str) -> Option<String> {
        self.globals.get(key).cloned()
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }
}
