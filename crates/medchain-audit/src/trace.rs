//! Chain-of-custody trail for one batch.

use std::fmt;

use medchain_types::LedgerTime;
use serde::{Deserialize, Serialize};

use crate::event::{AuditEvent, EventKind};
use crate::status::{classify_step, AuditStatus};

/// Where a batch sits in its journey.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CustodyStage {
    Created,
    InTransit,
    Delivered,
    Dispensed,
}

impl fmt::Display for CustodyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::InTransit => "in-transit",
            Self::Delivered => "delivered",
            Self::Dispensed => "dispensed",
        })
    }
}

/// One hand-off or handling step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyHop {
    pub tx_id: String,
    pub timestamp: LedgerTime,
    pub location: Option<String>,
    pub handler: String,
    pub role: String,
    pub action: String,
    pub kind: EventKind,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Ordered custody history of a batch, from creation to its latest step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyTrail {
    pub key: String,
    pub drug_name: Option<String>,
    /// Handler of the first recorded step.
    pub origin: Option<String>,
    pub current_location: Option<String>,
    pub stage: CustodyStage,
    /// Status of the most recent dispatch/receive step.
    pub step_status: Option<AuditStatus>,
    pub hops: Vec<CustodyHop>,
}

impl CustodyTrail {
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }
}

/// Build the custody trail of `key` from its events. Invalid events are
/// left out. `None` when no valid event references the key.
pub fn trace(key: &str, events: &[&AuditEvent]) -> Option<CustodyTrail> {
    let mut valid: Vec<&AuditEvent> = events
        .iter()
        .copied()
        .filter(|e| e.valid && e.key.as_deref() == Some(key))
        .collect();
    if valid.is_empty() {
        return None;
    }
    valid.sort_by_key(|e| e.order_key());

    let step_status = classify_step(&valid);
    let mut current_location = None;
    let mut stage = CustodyStage::Created;
    let mut drug_name = None;

    for event in &valid {
        if let Some(name) = &event.drug_name {
            drug_name = Some(name.clone());
        }
        let place = match event.kind {
            EventKind::Receive => event.to.clone().or_else(|| event.location.clone()),
            EventKind::Dispatch => event.from.clone().or_else(|| event.location.clone()),
            _ => event.location.clone(),
        };
        if place.is_some() {
            current_location = place;
        }
        stage = match event.kind {
            EventKind::Dispatch => CustodyStage::InTransit,
            EventKind::Receive => CustodyStage::Delivered,
            EventKind::Dispense => CustodyStage::Dispensed,
            EventKind::Create | EventKind::Other => stage,
        };
    }

    let hops = valid
        .iter()
        .map(|e| CustodyHop {
            tx_id: e.tx_id.clone(),
            timestamp: e.timestamp,
            location: e.location.clone(),
            handler: e.actor.clone(),
            role: e.role.clone(),
            action: e.action.clone(),
            kind: e.kind,
            from: e.from.clone(),
            to: e.to.clone(),
        })
        .collect();

    Some(CustodyTrail {
        key: key.to_string(),
        drug_name,
        origin: valid.first().map(|e| e.actor.clone()),
        current_location,
        stage,
        step_status,
        hops,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(n: u64, kind: EventKind, actor: &str, from: Option<&str>, to: Option<&str>) -> AuditEvent {
        AuditEvent {
            tx_id: format!("tx_{n:016x}"),
            block_index: n,
            position: 0,
            timestamp: LedgerTime::new(n * 10, 0),
            action: kind.to_string(),
            actor: actor.into(),
            role: "Role".into(),
            location: None,
            key: Some("batch001".into()),
            drug_name: Some("Paracetamol 500mg".into()),
            from: from.map(Into::into),
            to: to.map(Into::into),
            quantity: None,
            details: None,
            kind,
            valid: true,
            status: AuditStatus::Complete,
        }
    }

    #[test]
    fn unknown_key_has_no_trail() {
        assert!(trace("batch001", &[]).is_none());
        let e = event(1, EventKind::Create, "maker", None, None);
        assert!(trace("other", &[&e]).is_none());
    }

    #[test]
    fn trail_follows_custody() {
        let mut create = event(1, EventKind::Create, "maker", None, None);
        create.location = Some("Mumbai".into());
        let events = vec![
            create,
            event(2, EventKind::Dispatch, "logistics", Some("Maker"), Some("DC")),
            event(3, EventKind::Receive, "dc-staff", Some("Maker"), Some("DC")),
        ];
        let refs: Vec<&AuditEvent> = events.iter().collect();
        let trail = trace("batch001", &refs).unwrap();

        assert_eq!(trail.len(), 3);
        assert_eq!(trail.origin.as_deref(), Some("maker"));
        assert_eq!(trail.current_location.as_deref(), Some("DC"));
        assert_eq!(trail.stage, CustodyStage::Delivered);
        assert_eq!(trail.step_status, Some(AuditStatus::Complete));
        assert_eq!(trail.drug_name.as_deref(), Some("Paracetamol 500mg"));
        assert_eq!(trail.hops[1].handler, "logistics");
    }

    #[test]
    fn in_transit_while_waiting() {
        let events = vec![
            event(1, EventKind::Create, "maker", None, None),
            event(2, EventKind::Dispatch, "logistics", Some("Maker"), Some("DC")),
        ];
        let refs: Vec<&AuditEvent> = events.iter().collect();
        let trail = trace("batch001", &refs).unwrap();
        assert_eq!(trail.stage, CustodyStage::InTransit);
        assert_eq!(trail.step_status, Some(AuditStatus::Waiting));
        assert_eq!(trail.current_location.as_deref(), Some("Maker"));
    }

    #[test]
    fn invalid_events_are_skipped() {
        let mut bad = event(2, EventKind::Dispense, "pharmacist", None, None);
        bad.valid = false;
        let events = vec![event(1, EventKind::Create, "maker", None, None), bad];
        let refs: Vec<&AuditEvent> = events.iter().collect();
        let trail = trace("batch001", &refs).unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail.stage, CustodyStage::Created);
        assert_eq!(trail.step_status, None);
    }
}
