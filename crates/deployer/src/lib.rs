//! Coordinates deployment of compiled contract bytecode onto EVM family
//! networks: resolves library link references against previously recorded
//! addresses, drives the transaction lifecycle (build, sign, broadcast, poll
//! for receipt) and keeps a durable record of contract name to address per
//! output directory, so later runs reuse already deployed contracts instead
//! of redeploying them.

pub mod arguments;
pub mod artifact;
pub mod config;
pub mod error;
pub mod linker;
pub mod session;
pub mod submit;

pub use {
    artifact::CompiledArtifact,
    config::Config,
    error::{Error, Result},
    linker::{LinkReport, Resolution},
    session::{DeployedContract, Deployer, Deployment},
    submit::{ChainRpc, NodeRpc, SendOptions, TransactionDriver},
};
