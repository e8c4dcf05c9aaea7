//! Deploys the Secp256k1 library, the SchnorrVerifier contract linked
//! against it and a WRC20 token, then mints some tokens.
//!
//! Run with a `deployer.toml` in the working directory:
//!
//! ```text
//! cargo run --example deploy
//! ```

use {
    anyhow::ensure,
    deployer::{Config, Deployer, SendOptions},
    std::path::Path,
    web3::ethabi::Token,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observe::tracing::initialize("info", tracing::level_filters::LevelFilter::ERROR);

    let config = Config::load(Path::new("deployer.toml"))?;
    let mut deployer = Deployer::new(config)?;

    deployer.deploy("Secp256k1", &[]).await?;

    deployer.compile("SchnorrVerifier")?;
    let report = deployer.link("SchnorrVerifier", &["Secp256k1"])?;
    ensure!(
        report.is_fully_resolved(),
        "unresolved references: {:?}",
        report.unresolved()
    );
    deployer.deploy("SchnorrVerifier", &[]).await?;

    let deployment = deployer
        .deploy(
            "WanToken",
            &[
                Token::String("WRC20 BTC".to_string()),
                Token::String("WBTC".to_string()),
                Token::Uint(8u64.into()),
            ],
        )
        .await?;

    let token = deployer.deployed("WanToken", None)?;
    let mint = token.abi.function("mint")?.encode_input(&[
        Token::Address(deployer.account()),
        Token::Uint(2_100_000_000_000_000u64.into()),
    ])?;
    let receipt = deployer
        .send("WanToken", mint, SendOptions::default())
        .await?;
    tracing::info!(
        token = ?deployment.address,
        tx = ?receipt.transaction_hash,
        "minted",
    );

    Ok(())
}
