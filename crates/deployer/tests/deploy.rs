//! End to end deployment scenarios against an in-memory chain stub.

use {
    async_trait::async_trait,
    deployer::{ChainRpc, Config, Deployer, Error, SendOptions},
    network::Network,
    std::{
        path::Path,
        sync::{Arc, Mutex},
        time::Duration,
    },
    web3::{
        ethabi::Token,
        signing::SecretKey,
        types::{
            BlockNumber, H160, H256, TransactionParameters, TransactionReceipt, U64, U256,
        },
    },
};

/// Chain stub: accepts every broadcast, hands out the receipt on the second
/// poll and derives the created contract address from a counter.
#[derive(Default)]
struct FakeChain {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    transactions: u64,
    submitted: Vec<TransactionParameters>,
    // tx hash -> polls outstanding before the receipt materializes
    pending: Vec<(H256, u32)>,
}

#[async_trait]
impl ChainRpc for FakeChain {
    async fn transaction_count(
        &self,
        _address: H160,
        _block: Option<BlockNumber>,
    ) -> Result<U256, web3::Error> {
        Ok(U256::from(self.state.lock().unwrap().transactions))
    }

    async fn submit_signed(
        &self,
        tx: TransactionParameters,
        _key: &SecretKey,
    ) -> Result<H256, web3::Error> {
        let mut state = self.state.lock().unwrap();
        state.transactions += 1;
        let hash = H256::from_low_u64_be(state.transactions);
        state.submitted.push(tx);
        state.pending.push((hash, 1));
        Ok(hash)
    }

    async fn transaction_receipt(
        &self,
        tx: H256,
    ) -> Result<Option<TransactionReceipt>, web3::Error> {
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state.pending.iter_mut().find(|(hash, _)| *hash == tx) else {
            return Ok(None);
        };
        if entry.1 > 0 {
            entry.1 -= 1;
            return Ok(None);
        }
        let index = tx.to_low_u64_be();
        let created = state.submitted[index as usize - 1].to.is_none();
        Ok(Some(TransactionReceipt {
            transaction_hash: tx,
            status: Some(U64::from(1)),
            contract_address: created.then(|| H160::from_low_u64_be(0xc0ffee + index)),
            block_number: Some(U64::from(index)),
            gas_used: Some(U256::from(21_000)),
            ..Default::default()
        }))
    }
}

fn write_artifact(dir: &Path, file: &str, name: &str, bytecode: &str, abi: serde_json::Value) {
    std::fs::write(
        dir.join(file).with_extension("json"),
        serde_json::json!({
            "contractName": name,
            "sourcePath": format!("contracts/{file}"),
            "abi": abi,
            "bytecode": bytecode,
        })
        .to_string(),
    )
    .unwrap();
}

fn placeholder(reference: &str) -> String {
    let mut marker = format!("__{reference}");
    while marker.len() < 40 {
        marker.push('_');
    }
    marker
}

fn session_config(contracts: &Path, output: &Path) -> Config {
    Config {
        network: Network::WanchainTestnet,
        node_url: "http://localhost:8545".parse().unwrap(),
        private_key: "4c0883a69102937d6231471b5dbb6204fe512961708279df95b4a2200e856f45"
            .to_string(),
        contract_dir: contracts.to_path_buf(),
        output_dir: Some(output.to_path_buf()),
        gas_price: 1_000_000_000,
        gas_limit: 8_000_000,
        confirm_timeout: Duration::from_secs(1),
        poll_interval: Duration::from_millis(5),
    }
}

struct Setup {
    _contracts: tempfile::TempDir,
    _output: tempfile::TempDir,
    chain: Arc<FakeChain>,
    deployer: Deployer,
}

fn setup() -> Setup {
    observe::tracing::initialize_reentrant("debug");
    let contracts = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    write_artifact(
        contracts.path(),
        "Secp256k1.sol",
        "Secp256k1",
        "0x600160020160005260206000f3",
        serde_json::json!([]),
    );
    write_artifact(
        contracts.path(),
        "SchnorrVerifier.sol",
        "SchnorrVerifier",
        &format!("0x6080{}6001", placeholder("Secp256k1.sol:Secp256k1")),
        serde_json::json!([]),
    );
    write_artifact(
        contracts.path(),
        "WanToken.sol",
        "WanToken",
        "0x60806040",
        serde_json::json!([
            {
                "type": "constructor",
                "stateMutability": "nonpayable",
                "inputs": [
                    {"name": "name", "type": "string"},
                    {"name": "symbol", "type": "string"},
                    {"name": "decimals", "type": "uint8"}
                ]
            },
            {
                "type": "function",
                "name": "mint",
                "stateMutability": "nonpayable",
                "inputs": [
                    {"name": "to", "type": "address"},
                    {"name": "value", "type": "uint256"}
                ],
                "outputs": []
            }
        ]),
    );

    let config = session_config(contracts.path(), output.path());
    let chain = Arc::new(FakeChain::default());
    let deployer = Deployer::with_rpc(config, chain.clone()).unwrap();
    Setup {
        _contracts: contracts,
        _output: output,
        chain,
        deployer,
    }
}

#[tokio::test]
async fn deploys_and_records_a_simple_contract() {
    let mut setup = setup();

    // Nothing is recorded before the first deployment.
    assert!(matches!(
        setup.deployer.ledger().address("Secp256k1"),
        Err(ledger::Error::NotDeployed(_)),
    ));

    let deployment = setup.deployer.deploy("Secp256k1", &[]).await.unwrap();
    assert!(!deployment.replaced);

    let recorded = setup.deployer.ledger().address("Secp256k1").unwrap();
    assert_eq!(recorded, format!("{:#x}", deployment.address));
}

#[tokio::test]
async fn redeploying_replaces_the_record() {
    let mut setup = setup();

    let first = setup.deployer.deploy("Secp256k1", &[]).await.unwrap();
    let second = setup.deployer.deploy("Secp256k1", &[]).await.unwrap();
    assert!(second.replaced);
    assert_ne!(first.address, second.address);
    assert_eq!(
        setup.deployer.ledger().address("Secp256k1").unwrap(),
        format!("{:#x}", second.address),
    );
}

#[tokio::test]
async fn links_against_a_previously_deployed_library() {
    let mut setup = setup();

    setup.deployer.deploy("Secp256k1", &[]).await.unwrap();
    setup.deployer.compile("SchnorrVerifier").unwrap();
    let report = setup.deployer.link("SchnorrVerifier", &["Secp256k1"]).unwrap();
    assert!(report.is_fully_resolved());

    let deployment = setup.deployer.deploy("SchnorrVerifier", &[]).await.unwrap();
    // The broadcast payload contains no placeholder markers.
    let state = setup.chain.state.lock().unwrap();
    let payload = &state.submitted.last().unwrap().data.0;
    assert!(!payload.windows(2).any(|window| window == b"__"));
    drop(state);
    setup
        .deployer
        .ledger()
        .address("SchnorrVerifier")
        .unwrap();
    assert!(!deployment.replaced);
}

#[tokio::test]
async fn unlinked_bytecode_is_rejected_before_submission() {
    let mut setup = setup();

    let result = setup.deployer.deploy("SchnorrVerifier", &[]).await;
    assert!(matches!(
        result,
        Err(Error::UnresolvedLinks { contract, references })
            if contract == "SchnorrVerifier" && references == ["Secp256k1.sol:Secp256k1"],
    ));
    // Nothing was broadcast.
    assert_eq!(setup.chain.state.lock().unwrap().transactions, 0);
}

#[tokio::test]
async fn deploys_with_constructor_arguments() {
    let mut setup = setup();

    let deployment = setup
        .deployer
        .deploy(
            "WanToken",
            &[
                Token::String("WRC20 BTC".to_string()),
                Token::String("WBTC".to_string()),
                Token::Uint(8u64.into()),
            ],
        )
        .await
        .unwrap();

    let state = setup.chain.state.lock().unwrap();
    let payload = &state.submitted[0].data.0;
    // Creation code plus the abi encoded arguments.
    assert!(payload.len() > 4);
    assert!(payload.starts_with(&[0x60, 0x80, 0x60, 0x40]));
    drop(state);
    assert_eq!(
        setup.deployer.ledger().address("WanToken").unwrap(),
        format!("{:#x}", deployment.address),
    );
}

#[tokio::test]
async fn sends_a_transaction_to_a_deployed_contract() {
    let mut setup = setup();

    let deployment = setup
        .deployer
        .deploy(
            "WanToken",
            &[
                Token::String("WRC20 BTC".to_string()),
                Token::String("WBTC".to_string()),
                Token::Uint(8u64.into()),
            ],
        )
        .await
        .unwrap();

    let token = setup.deployer.deployed("WanToken", None).unwrap();
    let mint = token
        .abi
        .function("mint")
        .unwrap()
        .encode_input(&[
            Token::Address(deployment.address),
            Token::Uint(2_100_000_000_000_000u64.into()),
        ])
        .unwrap();
    setup
        .deployer
        .send("WanToken", mint, SendOptions::default())
        .await
        .unwrap();

    let state = setup.chain.state.lock().unwrap();
    assert_eq!(state.submitted.last().unwrap().to, Some(deployment.address));
}

#[tokio::test]
async fn attach_without_a_record_fails_and_records_nothing() {
    let mut setup = setup();

    let result = setup.deployer.deployed("WanToken", None);
    assert!(matches!(result, Err(Error::NotDeployed(name)) if name == "WanToken"));
    assert!(matches!(
        setup.deployer.ledger().address("WanToken"),
        Err(ledger::Error::NotDeployed(_)),
    ));
    // The location file stays untouched as well.
    assert!(matches!(
        setup.deployer.ledger().location("WanToken"),
        Err(ledger::Error::NotFound(_)),
    ));
}

#[tokio::test]
async fn garbled_bytecode_is_rejected() {
    observe::tracing::initialize_reentrant("debug");
    let contracts = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    // A placeholder marker whose 40 byte span ends inside a two byte char.
    write_artifact(
        contracts.path(),
        "Broken.sol",
        "Broken",
        &format!("0x__{}é", "a".repeat(37)),
        serde_json::json!([]),
    );
    let chain = Arc::new(FakeChain::default());
    let config = session_config(contracts.path(), output.path());
    let mut deployer = Deployer::with_rpc(config, chain.clone()).unwrap();

    let result = deployer.deploy("Broken", &[]).await;
    assert!(matches!(result, Err(Error::Bytecode(name)) if name == "Broken"));
    assert_eq!(chain.state.lock().unwrap().transactions, 0);
}

#[tokio::test]
async fn attach_with_an_explicit_address_creates_the_record() {
    let mut setup = setup();

    let address = H160::from_low_u64_be(0xbeef);
    let contract = setup.deployer.at("WanToken", address).unwrap();
    assert_eq!(contract.address, address);
    assert_eq!(
        setup.deployer.ledger().address("WanToken").unwrap(),
        format!("{address:#x}"),
    );

    // Attaching by name afterwards resolves through the ledger.
    let again = setup.deployer.deployed("WanToken", None).unwrap();
    assert_eq!(again.address, address);
}
