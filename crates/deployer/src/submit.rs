//! Drives one transaction through build, sign, broadcast and receipt
//! polling.

use {
    crate::error::{Error, Result},
    async_trait::async_trait,
    futures::FutureExt,
    network::{Network, NonceMode, TxEncoding},
    std::{
        future::Future,
        sync::Arc,
        time::{Duration, Instant},
    },
    web3::{
        Web3,
        signing::{Key as _, SecretKey, SecretKeyRef},
        transports::Http,
        types::{
            BlockNumber, Bytes, H160, H256, TransactionParameters, TransactionReceipt, U64, U256,
        },
    },
};

/// Priority fee offered on EIP-1559 networks, capped by the configured gas
/// price.
const MAX_PRIORITY_FEE_WEI: u64 = 1_500_000_000;

/// Node boundary used by the transaction driver. The coordinator only needs
/// eventual delivery; whether the transport is HTTP or a socket is the
/// implementation's business.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Current transaction count of `address` at `block`.
    async fn transaction_count(
        &self,
        address: H160,
        block: Option<BlockNumber>,
    ) -> Result<U256, web3::Error>;

    /// Signs `tx` offline with `key` and broadcasts the raw envelope,
    /// returning the transaction hash.
    async fn submit_signed(
        &self,
        tx: TransactionParameters,
        key: &SecretKey,
    ) -> Result<H256, web3::Error>;

    async fn transaction_receipt(
        &self,
        tx: H256,
    ) -> Result<Option<TransactionReceipt>, web3::Error>;
}

/// `ChainRpc` over a JSON-RPC HTTP endpoint.
pub struct NodeRpc {
    web3: Web3<Http>,
}

impl NodeRpc {
    pub fn new(url: &str) -> Result<Self, web3::Error> {
        Ok(Self {
            web3: Web3::new(Http::new(url)?),
        })
    }
}

#[async_trait]
impl ChainRpc for NodeRpc {
    async fn transaction_count(
        &self,
        address: H160,
        block: Option<BlockNumber>,
    ) -> Result<U256, web3::Error> {
        self.web3.eth().transaction_count(address, block).await
    }

    async fn submit_signed(
        &self,
        tx: TransactionParameters,
        key: &SecretKey,
    ) -> Result<H256, web3::Error> {
        // Every field is filled in by the driver so signing never falls back
        // to querying the node.
        let signed = self
            .web3
            .accounts()
            .sign_transaction(tx, SecretKeyRef::new(key))
            .await?;
        self.web3
            .eth()
            .send_raw_transaction(signed.raw_transaction)
            .await
    }

    async fn transaction_receipt(
        &self,
        tx: H256,
    ) -> Result<Option<TransactionReceipt>, web3::Error> {
        self.web3.eth().transaction_receipt(tx).await
    }
}

/// Options for a single submission.
#[derive(Clone, Debug, Default)]
pub struct SendOptions {
    pub value: U256,
    pub gas_price: Option<U256>,
    pub gas_limit: Option<U256>,
    /// Overrides the session signing key, for multi signer setups.
    pub key: Option<SecretKey>,
}

#[derive(Clone, Debug)]
pub struct DriverSettings {
    pub gas_price: U256,
    pub gas_limit: U256,
    pub confirm_timeout: Duration,
    pub poll_interval: Duration,
}

/// Builds, signs, broadcasts and confirms transactions on one network with
/// one default signing key.
pub struct TransactionDriver {
    rpc: Arc<dyn ChainRpc>,
    network: Network,
    key: SecretKey,
    settings: DriverSettings,
}

impl TransactionDriver {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        network: Network,
        key: SecretKey,
        settings: DriverSettings,
    ) -> Self {
        Self {
            rpc,
            network,
            key,
            settings,
        }
    }

    /// Address of the default signing key.
    pub fn sender(&self) -> H160 {
        SecretKeyRef::new(&self.key).address()
    }

    /// Submits a transaction and waits for its receipt. `to` of `None`
    /// creates a contract. A success receipt with failure status surfaces as
    /// [`Error::Reverted`], never as success.
    ///
    /// `cancel` abandons the receipt wait when it completes; pass
    /// [`futures::future::pending`] to wait for the full timeout budget.
    pub async fn execute(
        &self,
        to: Option<H160>,
        data: Vec<u8>,
        options: &SendOptions,
        cancel: impl Future<Output = ()> + Send,
    ) -> Result<TransactionReceipt> {
        let key = options.key.as_ref().unwrap_or(&self.key);
        let sender = SecretKeyRef::new(key).address();

        // A fresh nonce for every intent; reusing one risks a collision.
        let block = match self.network.nonce_mode() {
            NonceMode::Pending => BlockNumber::Pending,
            NonceMode::Latest => BlockNumber::Latest,
        };
        let nonce = self
            .rpc
            .transaction_count(sender, Some(block))
            .await
            .map_err(Error::Broadcast)?;

        let tx = self.transaction_parameters(to, data, nonce, options);
        let tx_hash = self
            .rpc
            .submit_signed(tx, key)
            .await
            .map_err(Error::Broadcast)?;
        tracing::info!(?tx_hash, %nonce, ?to, "transaction broadcast");

        let receipt = self.wait_for_receipt_cancellable(tx_hash, cancel).await?;
        if receipt.status == Some(U64::from(1)) {
            Ok(receipt)
        } else {
            Err(Error::Reverted { tx: tx_hash })
        }
    }

    /// Assembles the chain specific envelope input. The encoding family is a
    /// property of the network, not of the call site.
    fn transaction_parameters(
        &self,
        to: Option<H160>,
        data: Vec<u8>,
        nonce: U256,
        options: &SendOptions,
    ) -> TransactionParameters {
        let gas_price = options.gas_price.unwrap_or(self.settings.gas_price);
        let base = TransactionParameters {
            nonce: Some(nonce),
            to,
            gas: options.gas_limit.unwrap_or(self.settings.gas_limit),
            value: options.value,
            data: Bytes(data),
            chain_id: Some(self.network.chain_id()),
            ..Default::default()
        };
        match self.network.tx_encoding() {
            TxEncoding::Legacy => TransactionParameters {
                gas_price: Some(gas_price),
                ..base
            },
            TxEncoding::Eip1559 => TransactionParameters {
                transaction_type: Some(U64::from(2)),
                max_fee_per_gas: Some(gas_price),
                max_priority_fee_per_gas: Some(gas_price.min(U256::from(MAX_PRIORITY_FEE_WEI))),
                ..base
            },
        }
    }

    /// Polls for the receipt of `tx` every poll interval until one with a
    /// definitive status shows up or the confirmation timeout elapses.
    /// Transient fetch errors count as "not yet available" to tolerate RPC
    /// flakiness.
    pub async fn wait_for_receipt(&self, tx: H256) -> Result<TransactionReceipt> {
        let deadline = Instant::now() + self.settings.confirm_timeout;
        loop {
            match self.rpc.transaction_receipt(tx).await {
                Ok(Some(receipt)) if receipt.status.is_some() => return Ok(receipt),
                Ok(_) => tracing::debug!(?tx, "receipt not yet available"),
                Err(err) => tracing::warn!(?tx, ?err, "receipt fetch failed, treating as pending"),
            }
            if Instant::now() >= deadline {
                return Err(Error::ReceiptTimeout { tx });
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    /// Like [`Self::wait_for_receipt`] but stops as soon as `cancel`
    /// completes, so callers can abandon a wait without leaking the
    /// underlying timer.
    pub async fn wait_for_receipt_cancellable(
        &self,
        tx: H256,
        cancel: impl Future<Output = ()> + Send,
    ) -> Result<TransactionReceipt> {
        tokio::select! {
            receipt = self.wait_for_receipt(tx).fuse() => receipt,
            _ = cancel.fuse() => {
                tracing::info!(?tx, "receipt wait cancelled");
                Err(Error::Cancelled { tx })
            }
        }
    }
}
