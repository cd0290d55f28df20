//! Compiled artifact loading
//!
//! Creation bytecode is read from `<dir>/<Name>.json`. Both brownie
//! (`"bytecode": "0x..."`) and forge (`"bytecode": {"object": "0x..."}`)
//! layouts are accepted. Loaded bytecode is kept in an owned cache for the
//! lifetime of the store; callers invalidate explicitly after a rebuild.

use alloy_primitives::Bytes;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::error::{DeployError, DeployResult};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BytecodeField {
    Hex(String),
    Forge { object: String },
}

#[derive(Debug, Deserialize)]
struct ArtifactFile {
    bytecode: BytecodeField,
}

#[derive(Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
    cache: HashMap<String, Bytes>,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            cache: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    /// Creation bytecode for `name`, loading it on first use.
    pub fn bytecode(&mut self, name: &str) -> DeployResult<Bytes> {
        if let Some(code) = self.cache.get(name) {
            trace!("Artifact cache hit: {}", name);
            return Ok(code.clone());
        }

        let path = self.path_for(name);
        let code = load_bytecode(&path)?;
        debug!("Loaded {} ({} bytes) from {}", name, code.len(), path.display());
        self.cache.insert(name.to_string(), code.clone());
        Ok(code)
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    pub fn invalidate(&mut self, name: &str) {
        self.cache.remove(name);
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

fn load_bytecode(path: &Path) -> DeployResult<Bytes> {
    let content = fs::read_to_string(path).map_err(|e| DeployError::Artifact {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let artifact: ArtifactFile = serde_json::from_str(&content).map_err(|e| DeployError::Artifact {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let hex_code = match artifact.bytecode {
        BytecodeField::Hex(code) => code,
        BytecodeField::Forge { object } => object,
    };
    let digits = hex_code.strip_prefix("0x").unwrap_or(&hex_code);

    if digits.is_empty() {
        return Err(DeployError::Artifact {
            path: path.to_path_buf(),
            reason: "empty bytecode (abstract contract or interface?)".to_string(),
        });
    }
    // unlinked libraries leave `__$...$__` placeholders behind
    if digits.contains("__") {
        return Err(DeployError::Artifact {
            path: path.to_path_buf(),
            reason: "bytecode has unlinked library placeholders".to_string(),
        });
    }

    Ok(Bytes::from(hex::decode(digits)?))
}
