//! Resilient fetcher.
//!
//! Wraps every upstream call with key rotation, a per-attempt timeout and a
//! bounded linear backoff (`attempt * base_delay`). Failures never escape:
//! exhausted retries degrade to an empty transaction list or to a fallback
//! height estimate.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use burstwatch_common::address::normalize;
use burstwatch_common::config::AppConfig;
use burstwatch_common::error::AppError;
use burstwatch_common::types::Transaction;
use burstwatch_engine::state::WalletStateStore;

use crate::rate_limiter::{Credential, KeyRotator};
use crate::source::{SortOrder, TransactionSource};

/// Default number of newest transactions requested per address.
const DEFAULT_FETCH_LIMIT: u32 = 50;

/// Default retries after the first failed attempt.
const DEFAULT_MAX_RETRIES: u32 = 3;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Retry/timeout policy shared by both fetch operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Page size requested from the source.
    pub limit: u32,
    pub max_retries: u32,
    /// Linear backoff step: the n-th retry waits `n * base_delay`.
    pub base_delay: Duration,
    /// Bound on a single attempt.
    pub timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            limit: DEFAULT_FETCH_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl FetchPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            limit: config.fetch_limit,
            max_retries: config.fetch_max_retries,
            base_delay: config.retry_base_delay(),
            timeout: config.fetch_timeout(),
        }
    }
}

/// Rate-limited, retrying front of a [`TransactionSource`].
pub struct ResilientFetcher {
    source: Arc<dyn TransactionSource>,
    keys: Arc<KeyRotator>,
    policy: FetchPolicy,
    /// Height used when nothing better is known.
    height_floor: Option<u64>,
}

impl ResilientFetcher {
    pub fn new(
        source: Arc<dyn TransactionSource>,
        keys: Arc<KeyRotator>,
        policy: FetchPolicy,
    ) -> Self {
        Self {
            source,
            keys,
            policy,
            height_floor: None,
        }
    }

    /// Set the hard floor used for the height fallback.
    pub fn with_height_floor(mut self, floor: Option<u64>) -> Self {
        self.height_floor = floor;
        self
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Newest incoming transactions of `address`, newest first.
    ///
    /// Sender-originated transactions are dropped: only transfers *to* the
    /// address are evidence of a burst. Returns an empty list when every
    /// attempt failed.
    pub async fn fetch_recent_transactions(&self, address: &str) -> Vec<Transaction> {
        let address = normalize(address);
        let target = address.as_str();
        let limit = self.policy.limit;

        let result = self
            .with_retry("txlist", target, move |credential: Credential| async move {
                self.source
                    .list_recent_transactions(target, 1, limit, SortOrder::Desc, credential.key())
                    .await
            })
            .await;

        match result {
            Ok(txs) => txs
                .into_iter()
                .filter(|tx| tx.is_incoming_to(target))
                .collect(),
            Err(e) => {
                tracing::warn!(
                    address = %target,
                    error = %e,
                    "Giving up on transaction fetch, treating as empty"
                );
                Vec::new()
            }
        }
    }

    /// Current chain height.
    ///
    /// When every attempt fails, falls back to the highest block seen across
    /// all wallet states, then to the configured floor. `None` means no
    /// estimate is available at all.
    pub async fn fetch_chain_height(&self, states: &WalletStateStore) -> Option<u64> {
        let result = self
            .with_retry("height", "-", move |credential: Credential| async move {
                self.source.current_height(credential.key()).await
            })
            .await;

        match result {
            Ok(height) => Some(height),
            Err(e) => {
                let fallback = states.max_last_tx_block().or(self.height_floor);
                tracing::warn!(
                    error = %e,
                    fallback = ?fallback,
                    "Giving up on chain height fetch, using fallback"
                );
                fallback
            }
        }
    }

    /// Run `call` until it succeeds or `max_retries` retries are exhausted.
    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        address: &str,
        mut call: F,
    ) -> Result<T, AppError>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let credential = self.keys.acquire().await;
            let key_index = credential.index();

            let result = match tokio::time::timeout(self.policy.timeout, call(credential)).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Timeout(self.policy.timeout.as_millis() as u64)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = self.policy.base_delay * attempt;
                    tracing::debug!(
                        operation,
                        address = %address,
                        key_index,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Upstream call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
