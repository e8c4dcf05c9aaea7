//! Durable per output directory record of deployed contract addresses and
//! compiled source locations.
//!
//! Two JSON documents live in each output directory, one mapping contract
//! name to deployed address and one mapping contract name to source location.
//! Both are serialized as an ordered list of `[key, value]` pairs so diffs
//! between deployment runs stay stable. Every mutation loads the full map,
//! applies the single change and rewrites the file.

use {
    indexmap::IndexMap,
    std::{
        fs, io,
        path::{Path, PathBuf},
    },
    thiserror::Error,
};

const ADDRESS_FILE: &str = "ContractAddress.json";
const LOCATION_FILE: &str = "ContractLocation.json";

#[derive(Debug, Error)]
pub enum Error {
    /// Expected and recoverable: the contract has not been deployed to this
    /// output directory yet. Callers use it to decide deploy vs. reuse.
    #[error("{0} is not deployed")]
    NotDeployed(String),
    #[error("no source location recorded for {0}")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("malformed ledger file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Record store scoped to one output directory. Use one directory per
/// network so records of different environments never collide.
///
/// There is no concurrent writer protection; mutations are whole file
/// read-modify-rewrite and the last writer wins. Coordinators running in
/// parallel must target distinct output directories.
#[derive(Clone, Debug)]
pub struct Ledger {
    dir: PathBuf,
}

impl Ledger {
    /// Opens the ledger in `dir`, creating the directory if necessary.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the recorded address of `name`.
    pub fn address(&self, name: &str) -> Result<String, Error> {
        self.load(ADDRESS_FILE)?
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotDeployed(name.to_string()))
    }

    /// Records the address of `name`, returning the previously recorded
    /// address if one existed so the caller can report replace vs. create.
    pub fn set_address(&self, name: &str, address: &str) -> Result<Option<String>, Error> {
        self.store(ADDRESS_FILE, name, address)
    }

    /// Returns the recorded source location of `name`, in the
    /// `<File>.sol:<Contract>` format.
    pub fn location(&self, name: &str) -> Result<String, Error> {
        self.load(LOCATION_FILE)?
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    pub fn set_location(&self, name: &str, location: &str) -> Result<Option<String>, Error> {
        self.store(LOCATION_FILE, name, location)
    }

    fn load(&self, file: &str) -> Result<IndexMap<String, String>, Error> {
        let content = match fs::read_to_string(self.dir.join(file)) {
            Ok(content) => content,
            // No record has been written yet.
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(IndexMap::new()),
            Err(err) => return Err(err.into()),
        };
        let pairs: Vec<(String, String)> = serde_json::from_str(&content)?;
        Ok(pairs.into_iter().collect())
    }

    fn store(&self, file: &str, key: &str, value: &str) -> Result<Option<String>, Error> {
        let mut map = self.load(file)?;
        let prior = map.insert(key.to_string(), value.to_string());
        let pairs = map.iter().collect::<Vec<_>>();
        fs::write(self.dir.join(file), serde_json::to_string(&pairs)?)?;
        Ok(prior)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> (tempfile::TempDir, Ledger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path()).unwrap();
        (dir, ledger)
    }

    #[test]
    fn missing_address_is_not_deployed() {
        let (_dir, ledger) = ledger();
        assert!(matches!(
            ledger.address("Secp256k1"),
            Err(Error::NotDeployed(name)) if name == "Secp256k1",
        ));
    }

    #[test]
    fn set_then_get_round_trips() {
        let (_dir, ledger) = ledger();
        let prior = ledger.set_address("Secp256k1", "0x01").unwrap();
        assert_eq!(prior, None);
        assert_eq!(ledger.address("Secp256k1").unwrap(), "0x01");
    }

    #[test]
    fn overwrite_reports_prior_address() {
        let (_dir, ledger) = ledger();
        ledger.set_address("Token", "0x01").unwrap();
        let prior = ledger.set_address("Token", "0x02").unwrap();
        assert_eq!(prior, Some("0x01".to_string()));
        assert_eq!(ledger.address("Token").unwrap(), "0x02");
    }

    #[test]
    fn file_is_an_ordered_pair_list() {
        let (dir, ledger) = ledger();
        ledger.set_address("A", "0x0a").unwrap();
        ledger.set_address("B", "0x0b").unwrap();
        // Overwriting keeps the original position.
        ledger.set_address("A", "0xaa").unwrap();
        let content = fs::read_to_string(dir.path().join("ContractAddress.json")).unwrap();
        assert_eq!(content, r#"[["A","0xaa"],["B","0x0b"]]"#);
    }

    #[test]
    fn locations_are_stored_separately() {
        let (dir, ledger) = ledger();
        ledger.set_location("Lib", "Lib.sol:Lib").unwrap();
        assert_eq!(ledger.location("Lib").unwrap(), "Lib.sol:Lib");
        assert!(matches!(
            ledger.location("Other"),
            Err(Error::NotFound(name)) if name == "Other",
        ));
        // The address file is untouched by location writes.
        assert!(!dir.path().join("ContractAddress.json").exists());
        assert!(matches!(ledger.address("Lib"), Err(Error::NotDeployed(_))));
    }
}
