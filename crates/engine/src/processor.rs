//! Transition → notification translation.
//!
//! Turns a classifier transition (plus the transaction that triggered it)
//! into a human-readable [`NotificationPayload`], and builds the periodic
//! summary of addresses that are still bursting.

use alloy::primitives::utils::format_ether;
use chrono::{DateTime, Utc};
use serde::Serialize;

use burstwatch_common::types::{
    AlertColor, BurstTransition, NotificationField, NotificationPayload, Transaction, WalletState,
};

/// A bursting address as reported by the summary sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BurstingWallet {
    pub address: String,
    pub label: String,
    pub last_tx_block: u64,
    /// Blocks between the chain head and the address's latest transaction.
    pub block_lag: u64,
    /// Unix seconds at which the burst started.
    pub since: i64,
}

impl BurstingWallet {
    pub fn new(address: String, label: String, state: &WalletState, chain_height: u64) -> Self {
        Self {
            address,
            label,
            last_tx_block: state.last_tx_block,
            block_lag: chain_height.saturating_sub(state.last_tx_block),
            since: state.last_state_change_time,
        }
    }
}

/// Builds notification payloads for the sink.
pub struct TransitionProcessor;

impl TransitionProcessor {
    /// Translate a transition into a payload. `NoChange` yields `None`.
    pub fn translate(
        transition: BurstTransition,
        address: &str,
        label: &str,
        trigger: &Transaction,
        chain_height: u64,
        now: DateTime<Utc>,
    ) -> Option<NotificationPayload> {
        let (title, color) = match transition {
            BurstTransition::NoChange => return None,
            BurstTransition::BurstStarted => ("🚨 Burst Started", AlertColor::Alert),
            BurstTransition::BurstStopped => ("✅ Burst Stopped", AlertColor::Clear),
        };

        let fields = vec![
            NotificationField::new("Wallet", label, true),
            NotificationField::new("Address", address, false),
            NotificationField::new("Transaction", &trigger.hash, false),
            NotificationField::new("From", &trigger.from, false),
            NotificationField::new("Value", format!("{} ETH", format_ether(trigger.value)), true),
            NotificationField::new("Block", trigger.block_number.to_string(), true),
            NotificationField::new(
                "Blocks Since Last Tx",
                chain_height.saturating_sub(trigger.block_number).to_string(),
                true,
            ),
        ];

        Some(NotificationPayload {
            title: title.to_string(),
            fields,
            color,
            timestamp: now,
        })
    }

    /// Summary of every address still bursting. `None` when nothing is bursting.
    pub fn summary(
        wallets: &[BurstingWallet],
        chain_height: u64,
        now: DateTime<Utc>,
    ) -> Option<NotificationPayload> {
        if wallets.is_empty() {
            return None;
        }

        let mut fields: Vec<NotificationField> = wallets
            .iter()
            .map(|w| {
                NotificationField::new(
                    &w.label,
                    format!(
                        "{}\nlast tx block {} ({} blocks behind)",
                        w.address, w.last_tx_block, w.block_lag
                    ),
                    false,
                )
            })
            .collect();
        fields.push(NotificationField::new(
            "Chain Height",
            chain_height.to_string(),
            true,
        ));

        Some(NotificationPayload {
            title: format!("📊 {} Wallet(s) Bursting", wallets.len()),
            fields,
            color: AlertColor::Alert,
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    fn make_tx() -> Transaction {
        Transaction {
            hash: "0xabc123".to_string(),
            from: "0x00000000000000000000000000000000000000aa".to_string(),
            to: Some("0x00000000000000000000000000000000000000bb".to_string()),
            value: U256::from(1_500_000_000_000_000_000u128),
            block_number: 102,
            timestamp: 1_700_000_000,
            input: "0x".to_string(),
        }
    }

    #[test]
    fn test_translate_burst_started() {
        let payload = TransitionProcessor::translate(
            BurstTransition::BurstStarted,
            "0x00000000000000000000000000000000000000bb",
            "hot wallet",
            &make_tx(),
            103,
            Utc::now(),
        )
        .unwrap();

        assert!(payload.title.contains("Burst Started"));
        assert_eq!(payload.color, AlertColor::Alert);
        assert_eq!(payload.field("Wallet"), Some("hot wallet"));
        assert_eq!(payload.field("Transaction"), Some("0xabc123"));
        assert_eq!(payload.field("Block"), Some("102"));
        assert_eq!(payload.field("Blocks Since Last Tx"), Some("1"));
        assert!(payload.field("Value").unwrap().starts_with("1.5"));
    }

    #[test]
    fn test_translate_burst_stopped_is_clear() {
        let payload = TransitionProcessor::translate(
            BurstTransition::BurstStopped,
            "0xbb",
            "hot wallet",
            &make_tx(),
            125,
            Utc::now(),
        )
        .unwrap();

        assert!(payload.title.contains("Burst Stopped"));
        assert_eq!(payload.color, AlertColor::Clear);
        assert_eq!(payload.field("Blocks Since Last Tx"), Some("23"));
    }

    #[test]
    fn test_translate_no_change() {
        assert!(
            TransitionProcessor::translate(
                BurstTransition::NoChange,
                "0xbb",
                "x",
                &make_tx(),
                103,
                Utc::now()
            )
            .is_none()
        );
    }

    #[test]
    fn test_bursting_wallet_lag() {
        let state = WalletState {
            is_bursting: true,
            last_tx_block: 100,
            last_notified_hash: None,
            last_state_change_time: 42,
        };
        let wallet = BurstingWallet::new("0xbb".to_string(), "w".to_string(), &state, 130);
        assert_eq!(wallet.block_lag, 30);
        assert_eq!(wallet.since, 42);
    }

    #[test]
    fn test_summary() {
        let state = WalletState {
            is_bursting: true,
            last_tx_block: 100,
            ..WalletState::default()
        };
        let wallets = vec![
            BurstingWallet::new("0xbb".to_string(), "first".to_string(), &state, 110),
            BurstingWallet::new("0xcc".to_string(), "second".to_string(), &state, 110),
        ];

        let payload = TransitionProcessor::summary(&wallets, 110, Utc::now()).unwrap();
        assert!(payload.title.contains("2 Wallet(s)"));
        assert!(payload.field("first").unwrap().contains("10 blocks behind"));
        assert_eq!(payload.field("Chain Height"), Some("110"));
    }

    #[test]
    fn test_summary_empty() {
        assert!(TransitionProcessor::summary(&[], 110, Utc::now()).is_none());
    }
}
