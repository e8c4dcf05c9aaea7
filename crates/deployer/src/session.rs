//! One deployment session against a single network and output directory.

use {
    crate::{
        artifact::{ArtifactStore, CompiledArtifact},
        config::Config,
        error::{Error, Result},
        linker::{self, LinkReport, Resolution},
        submit::{ChainRpc, DriverSettings, NodeRpc, SendOptions, TransactionDriver},
    },
    futures::future,
    ledger::Ledger,
    std::{collections::HashMap, future::Future, sync::Arc},
    web3::{
        ethabi::{self, Token},
        types::{H160, H256, TransactionReceipt, U64, U256},
    },
};

/// Handle to a deployed (or attached) contract.
#[derive(Clone, Debug)]
pub struct DeployedContract {
    pub name: String,
    pub address: H160,
    pub abi: ethabi::Contract,
}

/// Outcome of a successful deployment.
#[derive(Clone, Debug)]
pub struct Deployment {
    pub name: String,
    pub address: H160,
    pub tx: H256,
    pub block_number: Option<U64>,
    pub gas_used: Option<U256>,
    /// Whether an earlier record for this name was replaced.
    pub replaced: bool,
}

/// Deployment session: compiles (or reuses cached compilations of) named
/// contracts, resolves their library references, deploys them and records
/// the resulting addresses.
///
/// Operations are strictly sequential, so an address written by one call is
/// visible to every later link step of the same session. Run one session per
/// output directory; the ledger has no concurrent writer protection.
pub struct Deployer {
    config: Config,
    driver: TransactionDriver,
    ledger: Ledger,
    artifacts: ArtifactStore,
    compiled: HashMap<String, CompiledArtifact>,
}

impl Deployer {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let rpc = NodeRpc::new(config.node_url.as_str())
            .map_err(|err| Error::Config(format!("invalid node url {}: {err}", config.node_url)))?;
        Self::with_rpc(config, Arc::new(rpc))
    }

    /// Injection point for tests and custom transports.
    pub fn with_rpc(config: Config, rpc: Arc<dyn ChainRpc>) -> Result<Self> {
        config.validate()?;
        let ledger = Ledger::new(config.output_dir())?;
        let artifacts = ArtifactStore::load(&config.contract_dir)?;
        let driver = TransactionDriver::new(
            rpc,
            config.network,
            config.signing_key()?,
            DriverSettings {
                gas_price: U256::from(config.gas_price),
                gas_limit: U256::from(config.gas_limit),
                confirm_timeout: config.confirm_timeout,
                poll_interval: config.poll_interval,
            },
        );
        tracing::info!(
            network = %config.network,
            node = %config.node_url,
            sender = ?driver.sender(),
            "deployment session started",
        );
        Ok(Self {
            config,
            driver,
            ledger,
            artifacts,
            compiled: HashMap::new(),
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Address of the session signing key.
    pub fn account(&self) -> H160 {
        self.driver.sender()
    }

    /// Resolves the compiled artifact for `name` from `<name>.sol`, caching
    /// it for the session and recording the source location.
    pub fn compile(&mut self, name: &str) -> Result<CompiledArtifact> {
        self.compile_file(name, None)
    }

    /// Like [`Self::compile`]; `file` is needed when the source file name is
    /// not consistent with the contract name.
    pub fn compile_file(&mut self, name: &str, file: Option<&str>) -> Result<CompiledArtifact> {
        let file = match file {
            Some(file) => {
                if !file.to_ascii_lowercase().ends_with(".sol") {
                    return Err(Error::Config(format!("invalid contract filename {file}")));
                }
                file.to_string()
            }
            None => format!("{name}.sol"),
        };
        let artifact = self
            .artifacts
            .get(&file)
            .filter(|artifact| artifact.contract_name == name)
            .ok_or_else(|| Error::Compile {
                name: name.to_string(),
                file: file.clone(),
            })?;
        tracing::info!(source = %artifact.source_path, "compiling");
        let compiled = CompiledArtifact {
            name: name.to_string(),
            bytecode: artifact.bytecode.clone(),
            abi: artifact.abi.clone(),
        };
        self.ledger.set_location(name, &format!("{file}:{name}"))?;
        self.compiled.insert(name.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Resolves library placeholders in `contract`'s cached bytecode against
    /// the addresses recorded for `libraries`, compiling the contract first
    /// when necessary. Returns the per reference resolution report; the
    /// caller decides whether unresolved references are fatal.
    pub fn link(&mut self, contract: &str, libraries: &[&str]) -> Result<LinkReport> {
        if !self.compiled.contains_key(contract) {
            self.compile(contract)?;
        }
        let artifact = self
            .compiled
            .get_mut(contract)
            .ok_or_else(|| Error::Compile {
                name: contract.to_string(),
                file: format!("{contract}.sol"),
            })?;
        let report = linker::link(&mut artifact.bytecode, libraries, &self.ledger)?;
        for resolution in &report.resolutions {
            match resolution {
                Resolution::Resolved {
                    library, address, ..
                } => {
                    tracing::info!(contract, library = %library, address = ?address, "linking");
                }
                Resolution::Unresolved { reference } => {
                    tracing::warn!(contract, reference = %reference, "link reference unresolved");
                }
            }
        }
        Ok(report)
    }

    /// Deploys `name`, recording the address on success. Compilation and
    /// linking can be skipped for simple contracts; a cached artifact is
    /// reused when present.
    pub async fn deploy(&mut self, name: &str, constructor_args: &[Token]) -> Result<Deployment> {
        self.deploy_with_cancel(name, constructor_args, future::pending())
            .await
    }

    /// Like [`Self::deploy`] but abandons the receipt wait when `cancel`
    /// completes.
    pub async fn deploy_with_cancel(
        &mut self,
        name: &str,
        constructor_args: &[Token],
        cancel: impl Future<Output = ()> + Send,
    ) -> Result<Deployment> {
        let artifact = match self.compiled.get(name) {
            Some(artifact) => artifact.clone(),
            None => self.compile(name)?,
        };

        // Unlinked bytecode would only fail later at the chain boundary
        // where the cause is much harder to see, so reject it here.
        let unresolved = linker::find_link_references(&artifact.bytecode);
        if !unresolved.is_empty() {
            return Err(Error::UnresolvedLinks {
                contract: name.to_string(),
                references: unresolved
                    .into_iter()
                    .map(|reference| reference.name)
                    .collect(),
            });
        }

        let code = hex::decode(artifact.bytecode.trim_start_matches("0x"))
            .map_err(|_| Error::Bytecode(name.to_string()))?;
        let payload = match &artifact.abi.constructor {
            Some(constructor) => constructor.encode_input(code, constructor_args)?,
            None if constructor_args.is_empty() => code,
            None => return Err(Error::Abi(ethabi::Error::InvalidData)),
        };

        tracing::info!(contract = name, "deploying");
        let receipt = self
            .driver
            .execute(None, payload, &SendOptions::default(), cancel)
            .await?;
        let address = receipt
            .contract_address
            .ok_or(Error::MissingContractAddress {
                tx: receipt.transaction_hash,
            })?;

        let prior = self.ledger.set_address(name, &format!("{address:#x}"))?;
        tracing::info!(
            contract = name,
            address = ?address,
            tx = ?receipt.transaction_hash,
            block = ?receipt.block_number,
            gas_used = ?receipt.gas_used,
            action = if prior.is_some() { "replacing" } else { "deploying" },
            "contract deployed",
        );
        Ok(Deployment {
            name: name.to_string(),
            address,
            tx: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            replaced: prior.is_some(),
        })
    }

    /// Sends `data` to the deployed contract `name`, looked up in the
    /// ledger.
    pub async fn send(
        &mut self,
        name: &str,
        data: Vec<u8>,
        options: SendOptions,
    ) -> Result<TransactionReceipt> {
        let contract = self.deployed(name, None)?;
        self.send_to(contract.address, data, options).await
    }

    /// Sends `data` to an explicit address.
    pub async fn send_to(
        &mut self,
        to: H160,
        data: Vec<u8>,
        options: SendOptions,
    ) -> Result<TransactionReceipt> {
        let receipt = self
            .driver
            .execute(Some(to), data, &options, future::pending())
            .await?;
        tracing::info!(
            ?to,
            tx = ?receipt.transaction_hash,
            block = ?receipt.block_number,
            gas_used = ?receipt.gas_used,
            "transaction confirmed",
        );
        Ok(receipt)
    }

    /// Attaches to an already deployed contract without touching the chain.
    ///
    /// With an explicit `address` the record is created when absent;
    /// otherwise the ledger must already know the name. Fails with
    /// [`Error::NotDeployed`] when neither holds, creating no record.
    pub fn deployed(&mut self, name: &str, address: Option<H160>) -> Result<DeployedContract> {
        let recorded = match self.ledger.address(name) {
            Ok(address) => Some(linker::parse_address(&address)?),
            Err(ledger::Error::NotDeployed(_)) => None,
            Err(err) => return Err(err.into()),
        };
        // Attaching must leave the ledger untouched on failure, so the
        // artifact store is read directly instead of going through compile.
        let abi = match self.compiled.get(name) {
            Some(artifact) => artifact.abi.clone(),
            None => match self
                .artifacts
                .get(&format!("{name}.sol"))
                .filter(|artifact| artifact.contract_name == name)
            {
                Some(artifact) => artifact.abi.clone(),
                None => {
                    // Attaching only needs the abi for caller side encoding;
                    // no artifact means an empty interface.
                    tracing::warn!(
                        contract = name,
                        "no artifact for attached contract, interface is empty",
                    );
                    ethabi::Contract::load(&b"[]"[..])?
                }
            },
        };
        match (address, recorded) {
            (Some(address), recorded) => {
                if recorded.is_none() {
                    self.ledger.set_address(name, &format!("{address:#x}"))?;
                }
                Ok(DeployedContract {
                    name: name.to_string(),
                    address,
                    abi,
                })
            }
            (None, Some(address)) => Ok(DeployedContract {
                name: name.to_string(),
                address,
                abi,
            }),
            (None, None) => Err(Error::NotDeployed(name.to_string())),
        }
    }

    /// Strict attach: the address is required.
    pub fn at(&mut self, name: &str, address: H160) -> Result<DeployedContract> {
        self.deployed(name, Some(address))
    }

    pub fn network(&self) -> network::Network {
        self.config.network
    }
}
