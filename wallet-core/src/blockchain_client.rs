//! Blockchain metadata client
//!
//! Supplies the catalogue of supported blockchains (currencies, denominations,
//! fee estimates) and submits signed transactions. Requests are keyed by
//! blockchain identifiers such as `bitcoin-mainnet` or `ethereum-testnet`.
use crate::errors::{WalletError, WalletResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// One blockchain as described by the metadata service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockchainModel {
    pub id: String,
    pub name: String,
    pub is_mainnet: bool,
    /// Identifier of the entry in `currencies` that is the chain's native asset
    pub native_currency_id: String,
    pub block_height: u64,
    pub fee_estimates: Vec<FeeEstimateModel>,
    pub currencies: Vec<CurrencyModel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyModel {
    pub id: String,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub currency_type: String,
    pub address: Option<String>,
    pub denominations: Vec<DenominationModel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenominationModel {
    pub name: String,
    pub code: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Fee tier priced in base units of the chain's native currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeEstimateModel {
    /// Decimal string, base units per cost unit
    pub amount: String,
    pub tier: String,
    pub confirmation_time_ms: u64,
}

/// Request/response interface to the blockchain metadata service.
///
/// The runtime itself only calls [`BlockchainClient::get_blockchains`], from
/// `System::configure`. Fee estimates and transaction submission belong to the
/// same service and are exposed here for hosts and engines; no manager
/// operation in this crate issues them.
#[async_trait]
pub trait BlockchainClient: Send + Sync {
    /// All blockchains on mainnet or on testnet.
    async fn get_blockchains(&self, is_mainnet: bool) -> WalletResult<Vec<BlockchainModel>>;

    /// Current fee tiers for one blockchain.
    async fn get_fee_estimates(&self, blockchain_id: &str) -> WalletResult<Vec<FeeEstimateModel>>;

    /// Submit a signed transaction; returns its hash.
    async fn submit_transaction(&self, blockchain_id: &str, data: &[u8]) -> WalletResult<String>;
}

/// JSON-RPC request structure
#[derive(Debug, Serialize)]
struct JsonRpcRequest<T: Serialize> {
    jsonrpc: String,
    method: String,
    params: T,
    id: u64,
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
#[allow(dead_code)] // jsonrpc and id are populated via serde but never read
struct JsonRpcResponse<T> {
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcError>,
    id: u64,
}

/// JSON-RPC error structure
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

/// HTTP client for the metadata service
pub struct HttpBlockchainClient {
    client: Client,
    base_url: String,
}

impl HttpBlockchainClient {
    pub fn new(base_url: &str) -> WalletResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                WalletError::NetworkError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(HttpBlockchainClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a JSON-RPC call to the service
    async fn rpc_call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> WalletResult<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        let url = format!("{}/jsonrpc", self.base_url);
        log::debug!("Metadata request {} to {}", method, url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WalletError::NetworkError(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(WalletError::NetworkError(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let rpc_response: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| WalletError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = rpc_response.error {
            return Err(WalletError::NetworkError(format!(
                "RPC error {}: {}",
                error.code, error.message
            )));
        }

        rpc_response
            .result
            .ok_or_else(|| WalletError::InvalidResponse("No result in RPC response".to_string()))
    }
}

#[async_trait]
impl BlockchainClient for HttpBlockchainClient {
    async fn get_blockchains(&self, is_mainnet: bool) -> WalletResult<Vec<BlockchainModel>> {
        let params = serde_json::json!({ "testnet": !is_mainnet, "verified": true });
        self.rpc_call("blockchains_list", params).await
    }

    async fn get_fee_estimates(&self, blockchain_id: &str) -> WalletResult<Vec<FeeEstimateModel>> {
        let params = serde_json::json!({ "blockchain_id": blockchain_id });
        self.rpc_call("blockchains_fee_estimates", params).await
    }

    async fn submit_transaction(&self, blockchain_id: &str, data: &[u8]) -> WalletResult<String> {
        let params = serde_json::json!({
            "blockchain_id": blockchain_id,
            "data": hex::encode(data),
        });
        let response: serde_json::Value = self.rpc_call("transactions_submit", params).await?;
        let hash = response
            .get("hash")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                WalletError::InvalidResponse("Invalid transaction response".to_string())
            })?;

        Ok(hash.to_string())
    }
}

/// Fixed catalogue, for offline use and tests
#[derive(Debug, Clone, Default)]
pub struct StaticBlockchainClient {
    blockchains: Vec<BlockchainModel>,
}

impl StaticBlockchainClient {
    pub fn new(blockchains: Vec<BlockchainModel>) -> Self {
        StaticBlockchainClient { blockchains }
    }

    /// Bitcoin, bitcoin cash and ethereum on the requested network.
    pub fn builtin(is_mainnet: bool) -> Self {
        let suffix = if is_mainnet { "mainnet" } else { "testnet" };
        let btc_height = if is_mainnet { 600_000 } else { 1_700_000 };
        let bch_height = if is_mainnet { 630_000 } else { 1_380_000 };
        let eth_height = if is_mainnet { 9_000_000 } else { 7_000_000 };

        let bitcoin_units = || {
            vec![
                denomination("satoshi", "sat", "SAT", 0),
                denomination("bitcoin", "btc", "B", 8),
            ]
        };

        let bitcoin = BlockchainModel {
            id: format!("bitcoin-{}", suffix),
            name: "bitcoin".to_string(),
            is_mainnet,
            native_currency_id: format!("bitcoin-{}:__native__", suffix),
            block_height: btc_height,
            fee_estimates: vec![fee("1000", "30s", 30 * 1000)],
            currencies: vec![CurrencyModel {
                id: format!("bitcoin-{}:__native__", suffix),
                name: "bitcoin".to_string(),
                code: "btc".to_string(),
                currency_type: "native".to_string(),
                address: None,
                denominations: bitcoin_units(),
            }],
        };

        let bitcoin_cash = BlockchainModel {
            id: format!("bitcoin-cash-{}", suffix),
            name: "bitcoin cash".to_string(),
            is_mainnet,
            native_currency_id: format!("bitcoin-cash-{}:__native__", suffix),
            block_height: bch_height,
            fee_estimates: vec![fee("1000", "30s", 30 * 1000)],
            currencies: vec![CurrencyModel {
                id: format!("bitcoin-cash-{}:__native__", suffix),
                name: "bitcoin cash".to_string(),
                code: "bch".to_string(),
                currency_type: "native".to_string(),
                address: None,
                denominations: vec![
                    denomination("satoshi", "sat", "SAT", 0),
                    denomination("bitcoin cash", "bch", "BCH", 8),
                ],
            }],
        };

        let ethereum = BlockchainModel {
            id: format!("ethereum-{}", suffix),
            name: "ethereum".to_string(),
            is_mainnet,
            native_currency_id: format!("ethereum-{}:__native__", suffix),
            block_height: eth_height,
            // 2 gwei
            fee_estimates: vec![fee("2000000000", "1m", 1000)],
            currencies: vec![CurrencyModel {
                id: format!("ethereum-{}:__native__", suffix),
                name: "ethereum".to_string(),
                code: "eth".to_string(),
                currency_type: "native".to_string(),
                address: None,
                denominations: vec![
                    denomination("wei", "wei", "wei", 0),
                    denomination("gwei", "gwei", "gwei", 9),
                    denomination("ether", "eth", "E", 18),
                ],
            }],
        };

        Self::new(vec![bitcoin, bitcoin_cash, ethereum])
    }

    pub fn blockchains(&self) -> &[BlockchainModel] {
        &self.blockchains
    }
}

#[async_trait]
impl BlockchainClient for StaticBlockchainClient {
    async fn get_blockchains(&self, is_mainnet: bool) -> WalletResult<Vec<BlockchainModel>> {
        Ok(self
            .blockchains
            .iter()
            .filter(|model| model.is_mainnet == is_mainnet)
            .cloned()
            .collect())
    }

    async fn get_fee_estimates(&self, blockchain_id: &str) -> WalletResult<Vec<FeeEstimateModel>> {
        self.blockchains
            .iter()
            .find(|model| model.id == blockchain_id)
            .map(|model| model.fee_estimates.clone())
            .ok_or_else(|| WalletError::NotFound(format!("blockchain {}", blockchain_id)))
    }

    async fn submit_transaction(&self, blockchain_id: &str, data: &[u8]) -> WalletResult<String> {
        if !self.blockchains.iter().any(|model| model.id == blockchain_id) {
            return Err(WalletError::NotFound(format!("blockchain {}", blockchain_id)));
        }
        Ok(hex::encode(Sha256::digest(data)))
    }
}

fn denomination(name: &str, code: &str, symbol: &str, decimals: u8) -> DenominationModel {
    DenominationModel {
        name: name.to_string(),
        code: code.to_string(),
        symbol: symbol.to_string(),
        decimals,
    }
}

fn fee(amount: &str, tier: &str, confirmation_time_ms: u64) -> FeeEstimateModel {
    FeeEstimateModel {
        amount: amount.to_string(),
        tier: tier.to_string(),
        confirmation_time_ms,
    }
}
