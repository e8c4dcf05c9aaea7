use {
    serde::{Deserialize, Serialize},
    std::{
        fmt::{self, Display, Formatter},
        str::FromStr,
    },
    thiserror::Error,
};

/// Represents each network the deployment coordinator can target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u64)]
pub enum Network {
    Ethereum = 1,
    Wanchain = 888,
    WanchainTestnet = 999,
    Sepolia = 11155111,
}

/// Signed transaction envelope format expected by a network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxEncoding {
    /// Pre EIP-1559 envelope with a single gas price, replay protected via
    /// EIP-155.
    Legacy,
    /// EIP-1559 type 2 envelope with max fee and priority fee.
    Eip1559,
}

/// Which block to query when fetching the account nonce for a fresh
/// transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NonceMode {
    /// Count includes transactions still in the pool.
    Pending,
    /// Confirmed transactions only. Used on networks whose nodes misreport
    /// the pending count.
    Latest,
}

impl Network {
    /// Returns the network's chain ID.
    pub fn chain_id(&self) -> u64 {
        *self as u64
    }

    /// Returns the canonical name of the network.
    pub fn name(&self) -> &'static str {
        match &self {
            Self::Ethereum => "Ethereum / Mainnet",
            Self::Wanchain => "Wanchain / Mainnet",
            Self::WanchainTestnet => "Wanchain / Testnet",
            Self::Sepolia => "Ethereum / Sepolia",
        }
    }

    /// Returns the signed transaction envelope format the network expects.
    pub fn tx_encoding(&self) -> TxEncoding {
        match self {
            Self::Ethereum | Self::Sepolia => TxEncoding::Eip1559,
            // Wanchain nodes reject type 2 envelopes.
            Self::Wanchain | Self::WanchainTestnet => TxEncoding::Legacy,
        }
    }

    /// Returns how the account nonce should be queried on this network.
    pub fn nonce_mode(&self) -> NonceMode {
        match self {
            Self::Ethereum | Self::Sepolia => NonceMode::Pending,
            // gwan nodes report the confirmed count for the pending block,
            // which collides with transactions still in the pool.
            Self::Wanchain | Self::WanchainTestnet => NonceMode::Latest,
        }
    }

    /// Returns the block time in milliseconds.
    pub fn block_time_in_ms(&self) -> u64 {
        match self {
            Self::Ethereum => 12_000,
            Self::Wanchain => 5_000,
            Self::WanchainTestnet => 5_000,
            Self::Sepolia => 12_000,
        }
    }
}

impl TryFrom<u64> for Network {
    type Error = Error;

    /// Initializes `Network` from a chain ID, returns an error if the chain
    /// id is not supported.
    fn try_from(value: u64) -> Result<Self, Self::Error> {
        let network = match value {
            x if x == Self::Ethereum as u64 => Self::Ethereum,
            x if x == Self::Wanchain as u64 => Self::Wanchain,
            x if x == Self::WanchainTestnet as u64 => Self::WanchainTestnet,
            x if x == Self::Sepolia as u64 => Self::Sepolia,
            _ => return Err(Error::UnsupportedChain(value)),
        };
        Ok(network)
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ethereum" => Ok(Self::Ethereum),
            "wanchain" => Ok(Self::Wanchain),
            "wanchain-testnet" => Ok(Self::WanchainTestnet),
            "sepolia" => Ok(Self::Sepolia),
            _ => Err(Error::UnknownNetwork(value.to_string())),
        }
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ethereum => "ethereum",
            Self::Wanchain => "wanchain",
            Self::WanchainTestnet => "wanchain-testnet",
            Self::Sepolia => "sepolia",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("unsupported chain id: {0}")]
    UnsupportedChain(u64),
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_ids() {
        assert_eq!(Network::Ethereum.chain_id(), 1);
        assert_eq!(Network::Wanchain.chain_id(), 888);
        assert_eq!(Network::WanchainTestnet.chain_id(), 999);
        assert_eq!(Network::Sepolia.chain_id(), 11155111);
    }

    #[test]
    fn from_chain_id() {
        assert_eq!(Network::try_from(888), Ok(Network::Wanchain));
        assert_eq!(Network::try_from(2), Err(Error::UnsupportedChain(2)));
    }

    #[test]
    fn parse_round_trips_display() {
        for network in [
            Network::Ethereum,
            Network::Wanchain,
            Network::WanchainTestnet,
            Network::Sepolia,
        ] {
            assert_eq!(network.to_string().parse(), Ok(network));
        }
        assert!("tron".parse::<Network>().is_err());
    }

    #[test]
    fn wanchain_uses_legacy_envelope_and_confirmed_nonce() {
        assert_eq!(Network::Wanchain.tx_encoding(), TxEncoding::Legacy);
        assert_eq!(Network::Wanchain.nonce_mode(), NonceMode::Latest);
        assert_eq!(Network::Ethereum.tx_encoding(), TxEncoding::Eip1559);
        assert_eq!(Network::Ethereum.nonce_mode(), NonceMode::Pending);
    }
}
