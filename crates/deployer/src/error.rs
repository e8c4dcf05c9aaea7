use {thiserror::Error, web3::types::H256};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure modes of a deployment session.
///
/// None of these are retried automatically. Transaction related variants
/// carry the transaction hash so a stuck or failed submission can be
/// diagnosed or resumed out of band.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid required setting. Fatal, surfaced immediately.
    #[error("configuration error: {0}")]
    Config(String),

    /// No usable compiler output for the contract. Fatal for this contract
    /// but does not abort sibling deployments.
    #[error("failed to compile {name}@{file}")]
    Compile { name: String, file: String },

    /// The creation payload still contains link placeholders. Deployment is
    /// rejected before submission instead of letting the chain reject the
    /// bytecode.
    #[error("{contract} has unresolved link references: {references:?}")]
    UnresolvedLinks {
        contract: String,
        references: Vec<String>,
    },

    /// Expected and recoverable: no address is recorded for the contract in
    /// this output directory.
    #[error("{0} is not deployed")]
    NotDeployed(String),

    /// Signing or broadcasting failed. Never retried automatically because a
    /// rebroadcast risks a double deploy.
    #[error("broadcast failed: {0}")]
    Broadcast(#[source] web3::Error),

    /// No definitive receipt arrived within the configured budget. Polling
    /// can be resumed out of band with the carried transaction hash.
    #[error("timed out waiting for receipt of transaction {tx:?}")]
    ReceiptTimeout { tx: H256 },

    /// The receipt arrived but reports failure.
    #[error("transaction {tx:?} reverted")]
    Reverted { tx: H256 },

    /// The caller abandoned the receipt wait.
    #[error("receipt wait for transaction {tx:?} cancelled")]
    Cancelled { tx: H256 },

    /// The creation receipt carries no contract address.
    #[error("receipt of transaction {tx:?} carries no contract address")]
    MissingContractAddress { tx: H256 },

    #[error("malformed bytecode for {0}")]
    Bytecode(String),

    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    #[error("abi error: {0}")]
    Abi(#[from] web3::ethabi::Error),

    #[error(transparent)]
    Ledger(ledger::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ledger::Error> for Error {
    fn from(err: ledger::Error) -> Self {
        match err {
            ledger::Error::NotDeployed(name) => Self::NotDeployed(name),
            other => Self::Ledger(other),
        }
    }
}
