//! Minimal project context.
//!
//! A project is the unit that gates project-scoped commands and
//! contributes its own plugin list to the loader. The on-disk layout
//! beyond `skiff.json` is owned elsewhere; here we only care whether a
//! project is loaded, what it is called, and which plugins it declares.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const PROJECT_MANIFEST: &str = "skiff.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectContext {
    pub name: String,
    /// Plugin descriptors handed verbatim to the plugin loader.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<String>,
    #[serde(skip)]
    pub root_path: PathBuf,
}

impl ProjectContext {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plugins: Vec::new(),
            root_path: PathBuf::new(),
        }
    }

    /// Load the project manifest from `dir`, if one exists there.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let manifest = dir.join(PROJECT_MANIFEST);
        if !manifest.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&manifest)?;
        let mut project: ProjectContext = serde_json::from_str(&contents)?;
        project.root_path = dir.to_path_buf();
        Ok(Some(project))
    }
}
