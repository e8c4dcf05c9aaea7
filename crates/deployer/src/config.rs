use {
    crate::error::{Error, Result},
    network::Network,
    serde::Deserialize,
    std::{
        fs,
        path::{Path, PathBuf},
        time::Duration,
    },
    url::Url,
    web3::signing::SecretKey,
};

/// Configuration of one deployment session.
///
/// The network selects the chain id, the signed envelope format and which
/// ledger subdirectory is read and written; mainnet and testnet records never
/// collide.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub network: Network,

    /// JSON-RPC endpoint of the node used for nonce queries, broadcasting
    /// and receipt polling.
    pub node_url: Url,

    /// Hex encoded 32 byte signing key, without 0x prefix.
    pub private_key: String,

    /// Directory holding the compiler's build output.
    pub contract_dir: PathBuf,

    /// Base directory for the deployment records. A per network subdirectory
    /// is appended. Defaults to `deployments`.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Gas price in wei. On EIP-1559 networks this caps the max fee.
    #[serde(default = "default_gas_price")]
    pub gas_price: u64,

    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,

    /// How long to wait for a definitive receipt before giving up.
    #[serde(with = "humantime_serde", default = "default_confirm_timeout")]
    pub confirm_timeout: Duration,

    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
}

fn default_gas_price() -> u64 {
    180_000_000_000
}

fn default_gas_limit() -> u64 {
    8_000_000
}

fn default_confirm_timeout() -> Duration {
    Duration::from_secs(180)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

impl Config {
    /// Reads and validates a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("cannot read {}: {err}", path.display())))?;
        let config: Self = toml::from_str(&content)
            .map_err(|err| Error::Config(format!("cannot parse {}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.private_key.len() != 64 || !self.private_key.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(Error::Config("invalid private key".to_string()));
        }
        if !self.contract_dir.is_dir() {
            return Err(Error::Config(format!(
                "contract dir {} doesn't exist",
                self.contract_dir.display()
            )));
        }
        Ok(())
    }

    pub fn signing_key(&self) -> Result<SecretKey> {
        let bytes = hex::decode(&self.private_key)
            .map_err(|_| Error::Config("invalid private key".to_string()))?;
        SecretKey::from_slice(&bytes).map_err(|_| Error::Config("invalid private key".to_string()))
    }

    /// The directory the ledger files of this session live in.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("deployments"))
            .join(self.network.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> Config {
        Config {
            network: Network::WanchainTestnet,
            node_url: "http://localhost:8545".parse().unwrap(),
            private_key: "4c0883a69102937d6231471b5dbb6204fe512961708279df95b4a2200e856f45"
                .to_string(),
            contract_dir: dir.to_path_buf(),
            output_dir: None,
            gas_price: default_gas_price(),
            gas_limit: default_gas_limit(),
            confirm_timeout: default_confirm_timeout(),
            poll_interval: default_poll_interval(),
        }
    }

    #[test]
    fn accepts_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        config.validate().unwrap();
        config.signing_key().unwrap();
    }

    #[test]
    fn rejects_bad_private_key() {
        let dir = tempfile::tempdir().unwrap();
        for key in ["", "abcd", &"g".repeat(64)] {
            let config = Config {
                private_key: key.to_string(),
                ..config(dir.path())
            };
            assert!(matches!(config.validate(), Err(Error::Config(_))));
        }
    }

    #[test]
    fn rejects_missing_contract_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            contract_dir: dir.path().join("nope"),
            ..config(dir.path())
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn output_dir_is_scoped_by_network() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        assert_eq!(
            config.output_dir(),
            PathBuf::from("deployments/wanchain-testnet")
        );
    }

    #[test]
    fn parses_toml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let raw = format!(
            "network = \"wanchain\"\n\
             node_url = \"https://gwan-ssl.wandevs.org:56891\"\n\
             private_key = \"{}\"\n\
             contract_dir = {:?}\n\
             confirm_timeout = \"2m\"\n",
            "4c0883a69102937d6231471b5dbb6204fe512961708279df95b4a2200e856f45",
            dir.path(),
        );
        let config: Config = toml::from_str(&raw).unwrap();
        assert_eq!(config.network, Network::Wanchain);
        assert_eq!(config.gas_price, 180_000_000_000);
        assert_eq!(config.confirm_timeout, Duration::from_secs(120));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
    }
}
