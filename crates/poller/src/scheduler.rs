//! Batch poll scheduler.
//!
//! One tick freezes the chain height, fetches every tracked address with
//! bounded fan-out, classifies each result against that height and hands
//! transitions to the notification sink. `run` repeats ticks until
//! cancelled and interleaves the periodic bursting summary.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use burstwatch_common::config::AppConfig;
use burstwatch_common::types::{BurstTransition, NotificationPayload, Transaction};
use burstwatch_engine::classifier::WINDOW_SIZE;
use burstwatch_engine::processor::{BurstingWallet, TransitionProcessor};
use burstwatch_engine::registry::AddressRegistry;
use burstwatch_engine::state::WalletStateStore;
use burstwatch_notifier::NotificationSink;

use crate::fetcher::ResilientFetcher;

/// Placeholder period for the summary timer when the sweep is disabled.
const DISABLED_SUMMARY_PERIOD: Duration = Duration::from_secs(3600);

/// Cadence settings for the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Delay between the end of one tick and the start of the next.
    pub poll_interval: Duration,
    /// Interval of the bursting-address summary sweep.
    pub summary_interval: Duration,
    /// Maximum concurrent address fetches. `None` fetches all at once.
    pub fan_out_limit: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            summary_interval: Duration::from_secs(300),
            fan_out_limit: None,
        }
    }
}

impl SchedulerConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            summary_interval: config.summary_interval(),
            fan_out_limit: config.fan_out_limit,
        }
    }
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Height snapshot used for the tick; `None` when the tick was skipped.
    pub height: Option<u64>,
    /// Addresses polled.
    pub addresses: usize,
    /// Addresses that returned at least one incoming transaction.
    pub fetched: usize,
    /// Transitions fired this tick.
    pub transitions: Vec<(String, BurstTransition)>,
    /// Notifications accepted by the sink.
    pub delivered: usize,
}

impl TickReport {
    pub fn skipped(&self) -> bool {
        self.height.is_none()
    }
}

/// Drives height fetch → parallel address fetch → classification → alert, once per tick.
pub struct BatchPollScheduler {
    fetcher: Arc<ResilientFetcher>,
    states: WalletStateStore,
    registry: AddressRegistry,
    sink: Arc<dyn NotificationSink>,
    config: SchedulerConfig,
    /// Height of the last completed tick, 0 before the first one.
    last_height: AtomicU64,
}

impl BatchPollScheduler {
    pub fn new(
        fetcher: Arc<ResilientFetcher>,
        states: WalletStateStore,
        registry: AddressRegistry,
        sink: Arc<dyn NotificationSink>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            fetcher,
            states,
            registry,
            sink,
            config,
            last_height: AtomicU64::new(0),
        }
    }

    /// Run one tick against the wall clock.
    pub async fn tick(&self) -> TickReport {
        self.tick_at(Utc::now()).await
    }

    /// Run one tick, classifying with `now` as the observation time.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let Some(height) = self.fetcher.fetch_chain_height(&self.states).await else {
            tracing::warn!("No chain height available, skipping tick");
            return TickReport::default();
        };
        self.last_height.store(height, Ordering::Relaxed);

        let addresses = self.registry.addresses();
        let mut report = TickReport {
            height: Some(height),
            addresses: addresses.len(),
            ..TickReport::default()
        };
        if addresses.is_empty() {
            return report;
        }

        let fan_out = self
            .config
            .fan_out_limit
            .unwrap_or(addresses.len())
            .max(1);

        // Height is frozen above; every classification below uses the same snapshot.
        let results: Vec<(String, Vec<Transaction>)> = stream::iter(addresses)
            .map(|address| async move {
                let txs = self.fetcher.fetch_recent_transactions(&address).await;
                (address, txs)
            })
            .buffer_unordered(fan_out)
            .collect()
            .await;

        let mut payloads = Vec::new();
        for (address, txs) in results {
            if txs.is_empty() {
                continue;
            }
            report.fetched += 1;

            let window = &txs[..txs.len().min(WINDOW_SIZE)];
            let transition = self
                .states
                .classify(&address, window, height, now.timestamp());
            if !transition.is_change() {
                continue;
            }

            let label = self.registry.display_name(&address);
            tracing::info!(
                address = %address,
                label = %label,
                transition = %transition,
                tx_hash = %window[0].hash,
                block = window[0].block_number,
                height,
                "Burst state changed"
            );

            if let Some(payload) =
                TransitionProcessor::translate(transition, &address, &label, &window[0], height, now)
            {
                payloads.push(payload);
            }
            report.transitions.push((address, transition));
        }

        for payload in &payloads {
            if self.deliver(payload).await {
                report.delivered += 1;
            }
        }

        tracing::debug!(
            height,
            addresses = report.addresses,
            fetched = report.fetched,
            transitions = report.transitions.len(),
            "Tick complete"
        );
        report
    }

    /// Report every bursting address with its block lag. Returns the reported wallets.
    pub async fn report_bursting(&self, now: DateTime<Utc>) -> Vec<BurstingWallet> {
        let height = match self.last_height.load(Ordering::Relaxed) {
            0 => self.states.max_last_tx_block().unwrap_or(0),
            h => h,
        };

        let wallets: Vec<BurstingWallet> = self
            .states
            .bursting()
            .into_iter()
            .map(|(address, state)| {
                let label = self.registry.display_name(&address);
                BurstingWallet::new(address, label, &state, height)
            })
            .collect();

        if wallets.is_empty() {
            tracing::info!(height, "Burst summary: no wallets bursting");
            return wallets;
        }

        for wallet in &wallets {
            tracing::info!(
                address = %wallet.address,
                label = %wallet.label,
                last_tx_block = wallet.last_tx_block,
                block_lag = wallet.block_lag,
                "Burst summary: wallet still bursting"
            );
        }

        if let Some(payload) = TransitionProcessor::summary(&wallets, height, now) {
            self.deliver(&payload).await;
        }
        wallets
    }

    /// Best-effort delivery; failures are logged and dropped.
    async fn deliver(&self, payload: &NotificationPayload) -> bool {
        match self.sink.post(payload).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(title = %payload.title, error = %e, "Notification delivery failed");
                false
            }
        }
    }

    /// Poll until `cancel` fires. A tick in progress always runs to completion.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            summary_interval_secs = self.config.summary_interval.as_secs(),
            fan_out_limit = ?self.config.fan_out_limit,
            addresses = self.registry.len(),
            "Batch poll scheduler started"
        );

        // A zero period would panic in `interval_at`; treat it as "no summary sweep".
        let summary_enabled = !self.config.summary_interval.is_zero();
        if !summary_enabled {
            tracing::warn!("Summary interval is zero, bursting summary disabled");
        }
        let summary_period = if summary_enabled {
            self.config.summary_interval
        } else {
            DISABLED_SUMMARY_PERIOD
        };
        let mut summary = tokio::time::interval_at(Instant::now() + summary_period, summary_period);
        summary.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut next_tick = Instant::now();
        let mut tick_count = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(ticks = tick_count, "Batch poll scheduler shutting down");
                    break;
                }
                _ = summary.tick(), if summary_enabled => {
                    self.report_bursting(Utc::now()).await;
                }
                _ = tokio::time::sleep_until(next_tick) => {
                    tick_count += 1;
                    let report = self.tick().await;
                    if report.skipped() {
                        tracing::debug!(tick = tick_count, "Tick skipped");
                    }
                    next_tick = Instant::now() + self.config.poll_interval;
                }
            }
        }
    }
}
