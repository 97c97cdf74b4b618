//! Transaction source: the upstream that lists transactions and reports chain height.
//!
//! The production implementation talks to an Etherscan-compatible explorer
//! API. Explorer responses wrap everything in `{status, message, result}`
//! with numbers encoded as decimal strings; the height comes from the
//! `proxy` module as a JSON-RPC hex quantity.

use std::str::FromStr;

use alloy::primitives::U256;
use async_trait::async_trait;
use serde::Deserialize;

use burstwatch_common::address::normalize;
use burstwatch_common::error::AppError;
use burstwatch_common::types::Transaction;

/// Explorer message for an address without history; not an error.
const NO_TRANSACTIONS_MESSAGE: &str = "No transactions found";

/// Result ordering by block number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Upstream provider of transaction history and chain height.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// List one page of normal transactions touching `address`.
    async fn list_recent_transactions(
        &self,
        address: &str,
        page: u32,
        offset: u32,
        sort: SortOrder,
        api_key: &str,
    ) -> Result<Vec<Transaction>, AppError>;

    /// Current chain head block number.
    async fn current_height(&self, api_key: &str) -> Result<u64, AppError>;
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    message: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExplorerTx {
    hash: String,
    from: String,
    #[serde(default)]
    to: String,
    value: String,
    block_number: String,
    time_stamp: String,
    #[serde(default)]
    input: String,
}

impl TryFrom<ExplorerTx> for Transaction {
    type Error = AppError;

    fn try_from(tx: ExplorerTx) -> Result<Self, Self::Error> {
        let block_number = tx.block_number.parse().map_err(|_| {
            AppError::Upstream(format!("Invalid blockNumber {:?} in tx {}", tx.block_number, tx.hash))
        })?;
        let timestamp = tx.time_stamp.parse().map_err(|_| {
            AppError::Upstream(format!("Invalid timeStamp {:?} in tx {}", tx.time_stamp, tx.hash))
        })?;
        let value = U256::from_str(&tx.value).map_err(|_| {
            AppError::Upstream(format!("Invalid value {:?} in tx {}", tx.value, tx.hash))
        })?;

        Ok(Transaction {
            hash: tx.hash,
            from: normalize(&tx.from),
            to: (!tx.to.is_empty()).then(|| normalize(&tx.to)),
            value,
            block_number,
            timestamp,
            input: tx.input,
        })
    }
}

/// JSON-RPC style body of `module=proxy` calls. Rate-limit rejections come
/// back in the explorer envelope instead, with `result` holding the reason.
#[derive(Debug, Deserialize)]
struct ProxyResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Parse a `0x`-prefixed hex quantity.
fn parse_hex_quantity(raw: &str) -> Option<u64> {
    let digits = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
    u64::from_str_radix(digits, 16).ok()
}

/// Etherscan-compatible HTTP explorer client.
#[derive(Debug, Clone)]
pub struct ExplorerSource {
    client: reqwest::Client,
    base_url: String,
}

impl ExplorerSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build explorer client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Explorer request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "Explorer returned HTTP {}",
                status.as_u16()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Explorer response decode failed: {e}")))
    }
}

#[async_trait]
impl TransactionSource for ExplorerSource {
    async fn list_recent_transactions(
        &self,
        address: &str,
        page: u32,
        offset: u32,
        sort: SortOrder,
        api_key: &str,
    ) -> Result<Vec<Transaction>, AppError> {
        let page = page.to_string();
        let offset = offset.to_string();
        let body: ExplorerResponse = self
            .get(&[
                ("module", "account"),
                ("action", "txlist"),
                ("address", address),
                ("startblock", "0"),
                ("endblock", "99999999"),
                ("page", &page),
                ("offset", &offset),
                ("sort", sort.as_str()),
                ("apikey", api_key),
            ])
            .await?;

        if body.status != "1" {
            if body.message.starts_with(NO_TRANSACTIONS_MESSAGE) {
                return Ok(Vec::new());
            }
            let reason = body
                .result
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| body.result.to_string());
            return Err(AppError::Upstream(format!("{}: {}", body.message, reason)));
        }

        let txs: Vec<ExplorerTx> = serde_json::from_value(body.result)
            .map_err(|e| AppError::Upstream(format!("Unexpected txlist payload: {e}")))?;

        txs.into_iter().map(Transaction::try_from).collect()
    }

    async fn current_height(&self, api_key: &str) -> Result<u64, AppError> {
        let body: ProxyResponse = self
            .get(&[
                ("module", "proxy"),
                ("action", "eth_blockNumber"),
                ("apikey", api_key),
            ])
            .await?;

        if let Some(error) = body.error {
            return Err(AppError::Upstream(format!("eth_blockNumber failed: {error}")));
        }

        let raw = body
            .result
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Upstream("eth_blockNumber returned no result".to_string()))?;

        parse_hex_quantity(raw).ok_or_else(|| {
            AppError::Upstream(format!(
                "eth_blockNumber returned {:?}{}",
                raw,
                body.message
                    .map(|m| format!(" ({m})"))
                    .unwrap_or_default()
            ))
        })
    }
}
