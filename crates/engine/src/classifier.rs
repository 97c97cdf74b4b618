//! Burst classifier - per-address `Idle`/`Bursting` state machine.
//!
//! A burst is three incoming transactions packed into consecutive blocks
//! (gaps of at most 3) that are still fresh relative to the chain head. A
//! burst ends once the address has been quiet for more than 20 blocks.
//!
//! The stop condition is measured in blocks, not wall-clock time. Two guards
//! suppress duplicate and flapping alerts at a 1s poll cadence:
//! - the top transaction hash is compared against the last alerting hash,
//! - no transition may follow another within 30 seconds.
//!
//! Once bursting, gap analysis is not reconsidered; only the quiet-period
//! stop condition can end the burst.

use burstwatch_common::types::{BurstTransition, Transaction, WalletState};

/// Number of newest transactions the classifier looks at.
pub const WINDOW_SIZE: usize = 3;

/// Maximum block gap between consecutive transactions of a burst.
const DEFAULT_MAX_GAP_BLOCKS: u64 = 3;

/// Maximum distance from the chain head for a burst to count as ongoing.
const DEFAULT_MAX_RECENCY_BLOCKS: u64 = 3;

/// Quiet blocks after which a burst is declared over (strictly greater).
const DEFAULT_QUIET_PERIOD_BLOCKS: u64 = 20;

/// Minimum dwell time between two transitions, in seconds.
const DEFAULT_HYSTERESIS_SECS: i64 = 30;

/// Thresholds for the burst state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstRules {
    pub max_gap_blocks: u64,
    pub max_recency_blocks: u64,
    pub quiet_period_blocks: u64,
    pub hysteresis_secs: i64,
}

impl Default for BurstRules {
    fn default() -> Self {
        Self {
            max_gap_blocks: DEFAULT_MAX_GAP_BLOCKS,
            max_recency_blocks: DEFAULT_MAX_RECENCY_BLOCKS,
            quiet_period_blocks: DEFAULT_QUIET_PERIOD_BLOCKS,
            hysteresis_secs: DEFAULT_HYSTERESIS_SECS,
        }
    }
}

/// Stateless classifier; all per-address state lives in [`WalletState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BurstClassifier {
    rules: BurstRules,
}

impl BurstClassifier {
    pub fn new(rules: BurstRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &BurstRules {
        &self.rules
    }

    /// Classify the newest transactions of one address against a chain height snapshot.
    ///
    /// - `transactions`: incoming transactions, newest first; only the first
    ///   [`WINDOW_SIZE`] are considered
    /// - `chain_height`: the tick's frozen height
    /// - `now`: unix seconds, used for hysteresis
    ///
    /// Every field update for a transition happens before returning, so the
    /// state is never observed half-applied.
    pub fn classify(
        &self,
        state: &mut WalletState,
        transactions: &[Transaction],
        chain_height: u64,
        now: i64,
    ) -> BurstTransition {
        let window = &transactions[..transactions.len().min(WINDOW_SIZE)];

        let Some(top) = window.first() else {
            return BurstTransition::NoChange;
        };

        // While idle, the last alert was a stop (or nothing): the same hash must
        // not raise anything again. While bursting, the starting hash may still
        // end the burst once the address goes quiet.
        if !state.is_bursting && state.last_notified_hash.as_deref() == Some(top.hash.as_str()) {
            return BurstTransition::NoChange;
        }

        if now - state.last_state_change_time < self.rules.hysteresis_secs {
            return BurstTransition::NoChange;
        }

        let blocks_since_last_tx = chain_height.saturating_sub(top.block_number);

        if state.is_bursting {
            if blocks_since_last_tx > self.rules.quiet_period_blocks {
                Self::apply(state, top, false, now);
                return BurstTransition::BurstStopped;
            }
        } else if self.is_burst(window) && blocks_since_last_tx <= self.rules.max_recency_blocks {
            Self::apply(state, top, true, now);
            return BurstTransition::BurstStarted;
        }

        state.last_tx_block = top.block_number;
        BurstTransition::NoChange
    }

    /// Both consecutive gaps of a full window are within `max_gap_blocks`.
    fn is_burst(&self, window: &[Transaction]) -> bool {
        let [first, second, third] = window else {
            return false;
        };
        let g1 = first.block_number.saturating_sub(second.block_number);
        let g2 = second.block_number.saturating_sub(third.block_number);
        g1 <= self.rules.max_gap_blocks && g2 <= self.rules.max_gap_blocks
    }

    fn apply(state: &mut WalletState, top: &Transaction, bursting: bool, now: i64) {
        state.is_bursting = bursting;
        state.last_notified_hash = Some(top.hash.clone());
        state.last_tx_block = top.block_number;
        state.last_state_change_time = state.last_state_change_time.max(now);
    }
}
