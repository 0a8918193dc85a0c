use std::fmt;

use medchain_ledger::{LedgerSnapshot, Transaction};
use medchain_types::LedgerTime;
use serde::{Deserialize, Serialize};

use crate::status::AuditStatus;

/// Supply-chain meaning of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Create,
    Dispatch,
    Receive,
    Dispense,
    Other,
}

impl EventKind {
    /// Infer the kind from a chaincode function name such as
    /// `createDrugBatch`, `dispatchBatch`, `receiveBatch`, or `dispenseDrug`.
    pub fn from_function(function: &str) -> Self {
        let f = function.to_lowercase();
        if f.contains("dispense") {
            Self::Dispense
        } else if f.contains("receive") {
            Self::Receive
        } else if ["dispatch", "ship", "send", "transfer"]
            .iter()
            .any(|word| f.contains(word))
        {
            Self::Dispatch
        } else if f.contains("create") {
            Self::Create
        } else {
            Self::Other
        }
    }

    /// Parse an explicit `eventType` payload value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "create" | "created" => Some(Self::Create),
            "dispatch" | "dispatched" | "send" | "sent" => Some(Self::Dispatch),
            "receive" | "received" => Some(Self::Receive),
            "dispense" | "dispensed" => Some(Self::Dispense),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Dispatch or receive: the events the matching rule pairs up.
    pub fn is_transfer(self) -> bool {
        matches!(self, Self::Dispatch | Self::Receive)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Dispatch => "dispatch",
            Self::Receive => "receive",
            Self::Dispense => "dispense",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit row derived from a ledger transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub tx_id: String,
    pub block_index: u64,
    /// Position of the transaction within its block.
    pub position: usize,
    pub timestamp: LedgerTime,
    /// Chaincode function name.
    pub action: String,
    /// Submitting identity.
    pub actor: String,
    pub role: String,
    pub location: Option<String>,
    /// Correlation key (batch id).
    pub key: Option<String>,
    pub drug_name: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub quantity: Option<String>,
    pub details: Option<String>,
    pub kind: EventKind,
    /// `false` for transactions stored with a nonzero validation code.
    pub valid: bool,
    pub status: AuditStatus,
}

impl AuditEvent {
    /// Derive an unclassified event (status `Complete`) from a transaction.
    pub fn from_transaction(block_index: u64, position: usize, tx: &Transaction) -> Self {
        let kind = tx
            .field("eventType")
            .and_then(|v| EventKind::parse(&v))
            .unwrap_or_else(|| EventKind::from_function(&tx.function));

        Self {
            tx_id: tx.id.clone(),
            block_index,
            position,
            timestamp: tx.timestamp,
            action: tx.function.clone(),
            actor: tx.creator.clone(),
            role: tx.field("role").unwrap_or_else(|| derive_role(tx)),
            location: first_field(tx, &["location", "currentLocation"]),
            key: tx.business_key(),
            drug_name: first_field(tx, &["drugName", "drug_name"]),
            from: first_field(tx, &["from", "fromEntity"]),
            to: first_field(tx, &["to", "toEntity"]),
            quantity: tx.field("quantity"),
            details: tx.field("details"),
            kind,
            valid: tx.is_valid(),
            status: AuditStatus::Complete,
        }
    }

    /// Total order used by the classifier: `(timestamp, block_index, position)`.
    pub fn order_key(&self) -> (LedgerTime, u64, usize) {
        (self.timestamp, self.block_index, self.position)
    }

    /// Every field rendered as a string, for free-text filtering.
    pub fn field_strings(&self) -> Vec<String> {
        let mut fields = vec![
            self.tx_id.clone(),
            self.block_index.to_string(),
            self.timestamp.to_string(),
            self.action.clone(),
            self.actor.clone(),
            self.role.clone(),
            self.kind.to_string(),
            self.status.to_string(),
        ];
        fields.extend(
            [
                &self.location,
                &self.key,
                &self.drug_name,
                &self.from,
                &self.to,
                &self.quantity,
                &self.details,
            ]
            .into_iter()
            .flatten()
            .cloned(),
        );
        fields
    }

    /// Case-insensitive substring match against any field.
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.field_strings()
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

fn first_field(tx: &Transaction, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| tx.field(name))
        .filter(|v| !v.trim().is_empty())
}

/// Role from the endorsing peer's organization (`peer0.<org>.<domain>`), or
/// from the creator prefix (`<org>-admin`).
fn derive_role(tx: &Transaction) -> String {
    let org = tx
        .endorser
        .split('.')
        .nth(1)
        .filter(|org| !org.is_empty())
        .or_else(|| tx.creator.split('-').next())
        .unwrap_or_default();
    let mut chars = org.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Derive unclassified events for every transaction in ledger order.
pub fn extract_events(snapshot: &LedgerSnapshot) -> Vec<AuditEvent> {
    extract_events_after(snapshot, None)
}

/// Derive unclassified events for blocks with index greater than `after`.
pub fn extract_events_after(snapshot: &LedgerSnapshot, after: Option<u64>) -> Vec<AuditEvent> {
    let start = after.map_or(0, |h| h.saturating_add(1));
    snapshot
        .blocks()
        .iter()
        .filter(|block| block.index >= start)
        .flat_map(|block| {
            block
                .transactions
                .iter()
                .enumerate()
                .map(move |(position, tx)| AuditEvent::from_transaction(block.index, position, tx))
        })
        .collect()
}
