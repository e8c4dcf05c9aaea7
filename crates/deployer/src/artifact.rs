//! Compiler boundary: the coordinator consumes the compiler's per contract
//! build output (abi + bytecode JSON documents) and treats compilation
//! itself as an external concern.

use {
    crate::error::Result,
    serde::Deserialize,
    std::{collections::HashMap, fs, path::Path},
    web3::ethabi,
};

/// One compiler output document, as found in the build directory.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    pub source_path: String,
    pub abi: ethabi::Contract,
    /// Hex encoded creation bytecode, possibly containing link placeholders.
    pub bytecode: String,
}

/// A compiled contract ready for linking and deployment. Cached in process
/// for the lifetime of one session, never persisted.
#[derive(Clone, Debug)]
pub struct CompiledArtifact {
    pub name: String,
    pub bytecode: String,
    pub abi: ethabi::Contract,
}

/// In-memory view of the compiler's build output directory, keyed by source
/// file name.
pub struct ArtifactStore {
    artifacts: HashMap<String, Artifact>,
}

impl ArtifactStore {
    /// Recursively loads every artifact below `dir`. Documents that are not
    /// compiler output and abstract contracts (empty bytecode) are skipped.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut artifacts = HashMap::new();
        scan(dir, &mut artifacts)?;
        tracing::debug!(count = artifacts.len(), dir = %dir.display(), "loaded artifacts");
        Ok(Self { artifacts })
    }

    /// Looks up the artifact compiled from source file `file`.
    pub fn get(&self, file: &str) -> Option<&Artifact> {
        self.artifacts.get(file)
    }
}

fn scan(dir: &Path, artifacts: &mut HashMap<String, Artifact>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            scan(&path, artifacts)?;
            continue;
        }
        if path.extension().is_none_or(|extension| extension != "json") {
            continue;
        }
        let artifact: Artifact = match serde_json::from_str(&fs::read_to_string(&path)?) {
            Ok(artifact) => artifact,
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "skipping non artifact json");
                continue;
            }
        };
        if artifact.bytecode == "0x" {
            // Interfaces and abstract contracts have no code to deploy.
            continue;
        }
        let file = Path::new(&artifact.source_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| artifact.source_path.clone());
        artifacts.insert(file, artifact);
    }
    Ok(())
}
