//! Explicit configuration for loading and writing collections.
//!
//! Every "default" location is a field here and gets passed to the
//! constructors that need it; nothing is kept in process-wide state.

use crate::error::{Error, Result};
use crate::node::{DEFAULT_ID_ALPHABET, DEFAULT_ID_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Checks applied to every tree while a collection directory is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadVerification {
    None,
    /// Root, dangling children, cycles and connectivity.
    Structural,
    /// Everything [`crate::Collection::verify_tree`] checks.
    Full,
}

impl Default for LoadVerification {
    fn default() -> Self {
        Self::Structural
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub json_folder: PathBuf,
    pub node_types_folder: PathBuf,
    pub tree_extension: String,
    pub node_types_extension: String,
    pub hidden_prefixes: Vec<String>,
    pub id_length: usize,
    pub id_alphabet: String,
    pub load_verification: LoadVerification,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            json_folder: PathBuf::from("jsons"),
            node_types_folder: PathBuf::from("node_types"),
            tree_extension: "json".to_owned(),
            node_types_extension: "csv".to_owned(),
            hidden_prefixes: vec![".".to_owned(), "_".to_owned()],
            id_length: DEFAULT_ID_LENGTH,
            id_alphabet: DEFAULT_ID_ALPHABET.to_owned(),
            load_verification: LoadVerification::default(),
        }
    }
}

impl Settings {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn with_json_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.json_folder = folder.into();
        self
    }

    pub fn with_node_types_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.node_types_folder = folder.into();
        self
    }

    pub fn with_load_verification(mut self, level: LoadVerification) -> Self {
        self.load_verification = level;
        self
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.hidden_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && name.starts_with(prefix.as_str()))
    }

    /// File stem of a visible directory entry carrying `extension`.
    pub(crate) fn visible_stem<'a>(&self, path: &'a Path, extension: &str) -> Option<&'a str> {
        let name = path.file_name()?.to_str()?;
        if self.is_hidden(name) || path.extension()?.to_str()? != extension {
            return None;
        }
        path.file_stem()?.to_str()
    }

    pub fn generate_id(&self) -> String {
        crate::Node::generate_id(self.id_length, &self.id_alphabet)
    }
}
