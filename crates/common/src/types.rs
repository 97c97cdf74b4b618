use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A transaction observed on chain. Never mutated after it is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub hash: String,
    /// Sender, lowercase.
    pub from: String,
    /// Recipient, lowercase. `None` for contract creations.
    pub to: Option<String>,
    /// Value in the chain's smallest denomination.
    pub value: U256,
    pub block_number: u64,
    /// Unix seconds.
    pub timestamp: i64,
    /// Raw input payload (hex string).
    pub input: String,
}

impl Transaction {
    /// Whether `address` (lowercase) is the recipient of this transaction.
    pub fn is_incoming_to(&self, address: &str) -> bool {
        self.to.as_deref() == Some(address)
    }
}

/// Per-address burst tracking state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletState {
    /// Current classification.
    pub is_bursting: bool,
    /// Block number of the most recent transaction considered.
    pub last_tx_block: u64,
    /// Hash of the transaction that triggered the last alert.
    pub last_notified_hash: Option<String>,
    /// Unix seconds of the last transition; 0 before the first one.
    pub last_state_change_time: i64,
}

/// Outcome of one classification call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurstTransition {
    NoChange,
    BurstStarted,
    BurstStopped,
}

impl BurstTransition {
    pub fn is_change(&self) -> bool {
        !matches!(self, BurstTransition::NoChange)
    }
}

impl std::fmt::Display for BurstTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BurstTransition::NoChange => write!(f, "no_change"),
            BurstTransition::BurstStarted => write!(f, "burst_started"),
            BurstTransition::BurstStopped => write!(f, "burst_stopped"),
        }
    }
}

/// A tracked address and its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedAddress {
    pub address: String,
    pub label: String,
}

/// Alert color, mapped to an embed color by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertColor {
    Alert,
    Clear,
}

impl std::fmt::Display for AlertColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertColor::Alert => write!(f, "alert"),
            AlertColor::Clear => write!(f, "clear"),
        }
    }
}

/// One name/value row of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl NotificationField {
    pub fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

/// Human-readable notification payload ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Short title (e.g., "Burst Started")
    pub title: String,
    /// Structured body rows
    pub fields: Vec<NotificationField>,
    pub color: AlertColor,
    pub timestamp: DateTime<Utc>,
}

impl NotificationPayload {
    /// Look up a field value by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}
