//! JSON-RPC chain adapter
//!
//! Talks to an Ethereum JSON-RPC endpoint whose node manages the sender's
//! account. Predictions and catalog reads go through `eth_call`, submission
//! through `eth_sendTransaction`, and confirmation polls
//! `eth_getTransactionReceipt` until the receipt appears or the configured
//! timeout elapses.

use crate::abi::{self, ContractABI};
use crate::adapter::ChainAdapter;
use crate::errors::{ChainError, ChainResult};
use async_trait::async_trait;
use jsonrpsee::core::RpcResult;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::proc_macros::rpc;
use secretbox_fhe::EncryptedInput;
use secretbox_primitives::{decode_hex, encode_hex, Address, Handle, TxHash};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Subset of the `eth_` namespace used by the adapter
#[rpc(client, namespace = "eth")]
pub trait EthApi {
    #[method(name = "chainId")]
    async fn chain_id(&self) -> RpcResult<String>;

    #[method(name = "call")]
    async fn eth_call(&self, request: CallRequest, block: String) -> RpcResult<String>;

    #[method(name = "sendTransaction")]
    async fn send_transaction(&self, request: CallRequest) -> RpcResult<String>;

    #[method(name = "getTransactionReceipt")]
    async fn get_transaction_receipt(&self, hash: String) -> RpcResult<Option<TransactionReceipt>>;
}

/// Call or transaction object
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub to: String,
    pub data: String,
}

/// Fields of a receipt the adapter looks at
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    #[serde(default)]
    pub block_number: Option<String>,
    /// `0x1` success, `0x0` revert
    #[serde(default)]
    pub status: Option<String>,
}

impl TransactionReceipt {
    /// Whether the receipt reports a reverted execution
    pub fn reverted(&self) -> bool {
        matches!(self.status.as_deref(), Some("0x0") | Some("0x00"))
    }
}

/// Polling policy for confirmations
#[derive(Debug, Clone)]
pub struct RpcChainConfig {
    /// Delay between receipt polls
    pub poll_interval: Duration,
    /// Give up waiting after this long
    pub confirmation_timeout: Duration,
    /// Per-request timeout of the HTTP client
    pub request_timeout: Duration,
}

impl Default for RpcChainConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            confirmation_timeout: Duration::from_secs(180),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Chain adapter over an HTTP JSON-RPC endpoint
pub struct RpcChain {
    client: HttpClient,
    contract: Address,
    abi: ContractABI,
    config: RpcChainConfig,
}

impl RpcChain {
    /// Build a client for `url`; no request is made until first use
    pub fn connect(url: &str, contract: Address, config: RpcChainConfig) -> ChainResult<Self> {
        let client = HttpClientBuilder::default()
            .request_timeout(config.request_timeout)
            .build(url)
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        Ok(Self {
            client,
            contract,
            abi: ContractABI::secret_box(),
            config,
        })
    }

    /// Ask the node for its chain id
    pub async fn chain_id(&self) -> ChainResult<u64> {
        let raw = self
            .client
            .chain_id()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        parse_quantity(&raw)
    }

    async fn call(&self, from: Option<&Address>, data: Vec<u8>) -> ChainResult<Vec<u8>> {
        let request = CallRequest {
            from: from.map(|a| a.to_hex()),
            to: self.contract.to_hex(),
            data: encode_hex(&data),
        };
        let raw = self
            .client
            .eth_call(request, "latest".to_string())
            .await
            .map_err(|e| ChainError::CallFailed(e.to_string()))?;
        decode_hex(&raw).map_err(|e| ChainError::ABIDecodingError(e.to_string()))
    }
}

#[async_trait]
impl ChainAdapter for RpcChain {
    fn name(&self) -> &'static str {
        "rpc"
    }

    async fn number_of_boxes(&self) -> ChainResult<u8> {
        let data = abi::encode_number_of_boxes(&self.abi)?;
        let ret = self.call(None, data).await?;
        abi::decode_number_of_boxes(&self.abi, &ret)
    }

    async fn predict_open_box(&self, from: &Address, input: &EncryptedInput) -> ChainResult<Handle> {
        let data = abi::encode_open_box(&self.abi, input)?;
        let ret = self.call(Some(from), data).await?;
        abi::decode_open_box_return(&self.abi, &ret)
    }

    async fn submit_open_box(&self, from: &Address, input: &EncryptedInput) -> ChainResult<TxHash> {
        let data = abi::encode_open_box(&self.abi, input)?;
        let request = CallRequest {
            from: Some(from.to_hex()),
            to: self.contract.to_hex(),
            data: encode_hex(&data),
        };
        let raw = self
            .client
            .send_transaction(request)
            .await
            .map_err(|e| ChainError::SubmissionFailed(e.to_string()))?;
        let tx = raw
            .parse::<TxHash>()
            .map_err(|e| ChainError::SubmissionFailed(format!("bad transaction hash {raw}: {e}")))?;

        tracing::debug!(%from, %tx, "openBox sent");
        Ok(tx)
    }

    async fn await_confirmation(&self, tx: &TxHash) -> ChainResult<()> {
        let poll = async {
            loop {
                let receipt = self
                    .client
                    .get_transaction_receipt(tx.to_hex())
                    .await
                    .map_err(|e| ChainError::Rpc(e.to_string()))?;

                match receipt {
                    Some(receipt) if receipt.reverted() => {
                        return Err(ChainError::Reverted(tx.to_hex()));
                    }
                    Some(receipt) => {
                        tracing::debug!(%tx, block = ?receipt.block_number, "openBox confirmed");
                        return Ok(());
                    }
                    None => tokio::time::sleep(self.config.poll_interval).await,
                }
            }
        };

        tokio::time::timeout(self.config.confirmation_timeout, poll)
            .await
            .map_err(|_| ChainError::ConfirmationTimeout {
                tx: tx.to_hex(),
                secs: self.config.confirmation_timeout.as_secs(),
            })?
    }
}

/// Parse a `0x`-prefixed hex quantity
pub fn parse_quantity(raw: &str) -> ChainResult<u64> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(digits, 16).map_err(|e| ChainError::Rpc(format!("bad quantity {raw}: {e}")))
}
