use std::{collections::BTreeMap, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::common::sha256_file;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHash {
    pub path: PathBuf,
    pub sha256: String,
}

/// Provenance of a prepared run: crate version, hashed inputs, counts and written files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub version: String,
    pub inputs: BTreeMap<String, FileHash>,
    pub counts: BTreeMap<String, usize>,
    pub files: BTreeMap<String, FileHash>,
}

impl RunManifest {
    pub(crate) fn new(inputs: &[(&str, &Path)], counts: BTreeMap<String, usize>) -> Result<Self> {
        let mut hashed = BTreeMap::new();
        for &(role, path) in inputs {
            let sha256 = sha256_file(path)
                .with_context(|| format!("[pipeline] hashing {role} input"))?;
            hashed.insert(role.to_string(), FileHash { path: path.to_path_buf(), sha256 });
        }

        Ok(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            inputs: hashed,
            counts,
            files: BTreeMap::new(),
        })
    }

    /// Record an output file written under `root` by its relative name.
    pub(crate) fn add_file(&mut self, root: &Path, name: &str) -> Result<()> {
        let sha256 = sha256_file(&root.join(name))?;
        self.files.insert(name.to_string(), FileHash { path: PathBuf::from(name), sha256 });
        Ok(())
    }
}
