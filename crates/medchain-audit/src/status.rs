//! Dispatch/receive matching and tri-state status classification.
//!
//! A receive corresponds to a dispatch of the same correlation key when the
//! receive's `from` equals the dispatch's `to`, or when the receive echoes
//! the dispatch's whole route. If either side lacks route fields the receive
//! pairs with the nearest earlier unmatched dispatch. Several candidates
//! resolve to the most recent one.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use medchain_ledger::LedgerSnapshot;
use medchain_types::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::error::AuditError;
use crate::event::{extract_events_after, AuditEvent, EventKind};

/// Status of a supply-chain step or audit row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Both halves of the hand-off are recorded.
    Complete,
    /// Received, not yet moved onward.
    Pending,
    /// Dispatched, not yet received.
    Waiting,
}

impl AuditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Pending => "pending",
            Self::Waiting => "waiting",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditStatus {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "complete" | "success" => Ok(Self::Complete),
            "pending" => Ok(Self::Pending),
            "waiting" => Ok(Self::Waiting),
            other => Err(AuditError::UnknownStatusFilter(other.to_string())),
        }
    }
}

fn same_entity(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn corresponds(dispatch: &AuditEvent, receive: &AuditEvent) -> bool {
    match (receive.from.as_deref(), dispatch.to.as_deref()) {
        (Some(received_from), Some(sent_to)) => {
            same_entity(received_from, sent_to)
                || (dispatch
                    .from
                    .as_deref()
                    .is_some_and(|sent_from| same_entity(sent_from, received_from))
                    && receive
                        .to
                        .as_deref()
                        .is_some_and(|received_to| same_entity(received_to, sent_to)))
        }
        _ => true,
    }
}

/// Pair receives with dispatches. `events` must belong to one key and be
/// sorted by [`AuditEvent::order_key`]. Entry `i` of the result holds the
/// index of the event paired with event `i`, in both directions.
/// Invalid events never participate.
pub fn match_transfers(events: &[&AuditEvent]) -> Vec<Option<usize>> {
    let mut pairs = vec![None; events.len()];
    let mut open: Vec<usize> = Vec::new();

    for (i, event) in events.iter().enumerate() {
        if !event.valid {
            continue;
        }
        match event.kind {
            EventKind::Dispatch => open.push(i),
            EventKind::Receive => {
                if let Some(slot) = open.iter().rposition(|&d| corresponds(events[d], event)) {
                    let d = open.remove(slot);
                    pairs[i] = Some(d);
                    pairs[d] = Some(i);
                }
            }
            _ => {}
        }
    }
    pairs
}

/// Classify the most recent supply-chain step of one key.
///
/// `None` when the key has no valid dispatch or receive events.
pub fn classify_step(events: &[&AuditEvent]) -> Option<AuditStatus> {
    let ordered = sorted(events);
    let pairs = match_transfers(&ordered);
    let (i, latest) = ordered
        .iter()
        .enumerate()
        .rev()
        .find(|(_, e)| e.valid && e.kind.is_transfer())?;

    Some(match (latest.kind, pairs[i]) {
        (EventKind::Dispatch, None) => AuditStatus::Waiting,
        (EventKind::Receive, None) => AuditStatus::Pending,
        _ => AuditStatus::Complete,
    })
}

/// Per-row statuses for one key's events, returned in the input order.
///
/// - dispatch: `Complete` once matched, else `Waiting`;
/// - receive: `Pending` until the receiving entity moves the goods onward
///   (a later dispatch or dispense from the receive's `to`), then `Complete`;
/// - everything else, and invalid rows: `Complete`.
pub fn row_statuses(events: &[&AuditEvent]) -> Vec<AuditStatus> {
    let mut order: Vec<usize> = (0..events.len()).collect();
    order.sort_by_key(|&i| events[i].order_key());
    let ordered: Vec<&AuditEvent> = order.iter().map(|&i| events[i]).collect();
    let pairs = match_transfers(&ordered);

    let mut statuses = vec![AuditStatus::Complete; events.len()];
    for (pos, event) in ordered.iter().enumerate() {
        if !event.valid {
            continue;
        }
        let status = match event.kind {
            EventKind::Dispatch if pairs[pos].is_none() => AuditStatus::Waiting,
            EventKind::Receive if !moved_onward(event, &ordered[pos + 1..]) => AuditStatus::Pending,
            _ => AuditStatus::Complete,
        };
        statuses[order[pos]] = status;
    }
    statuses
}

fn moved_onward(receive: &AuditEvent, later: &[&AuditEvent]) -> bool {
    later.iter().any(|e| {
        e.valid
            && matches!(e.kind, EventKind::Dispatch | EventKind::Dispense)
            && match (receive.to.as_deref(), e.from.as_deref()) {
                (Some(holder), Some(sender)) => same_entity(holder, sender),
                _ => true,
            }
    })
}

fn sorted<'a>(events: &[&'a AuditEvent]) -> Vec<&'a AuditEvent> {
    let mut ordered = events.to_vec();
    ordered.sort_by_key(|e| e.order_key());
    ordered
}

/// Classify every event of a ledger-ordered list in place.
///
/// Events are grouped by correlation key; an event without a key is
/// classified on its own.
pub fn classify_all(events: &mut [AuditEvent]) {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut loners = Vec::new();
    for (i, event) in events.iter().enumerate() {
        match &event.key {
            Some(key) => groups.entry(key.clone()).or_default().push(i),
            None => loners.push(vec![i]),
        }
    }

    for indices in groups.into_values().chain(loners) {
        let group: Vec<&AuditEvent> = indices.iter().map(|&i| &events[i]).collect();
        let statuses = row_statuses(&group);
        for (i, status) in indices.into_iter().zip(statuses) {
            events[i].status = status;
        }
    }
}

/// Cached, classified audit events with per-key lookup.
///
/// [`catch_up`](Self::catch_up) derives events only for newly appended
/// blocks and reclassifies the keys they touch. A ledger reset below the
/// indexed height triggers a full rebuild.
#[derive(Clone, Debug, Default)]
pub struct StatusIndex {
    events: Vec<AuditEvent>,
    by_key: BTreeMap<String, Vec<usize>>,
    applied: Option<(u64, Fingerprint)>,
}

impl StatusIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index built from scratch over `snapshot`.
    pub fn build(snapshot: &LedgerSnapshot) -> Self {
        let mut index = Self::new();
        index.catch_up(snapshot);
        index
    }

    /// All events in ledger order.
    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.by_key.keys().map(String::as_str)
    }

    /// Events for `key`, ordered by `(timestamp, block_index, position)`.
    pub fn events_for(&self, key: &str) -> Vec<&AuditEvent> {
        let mut events: Vec<&AuditEvent> = self
            .by_key
            .get(key)
            .map(|indices| indices.iter().map(|&i| &self.events[i]).collect())
            .unwrap_or_default();
        events.sort_by_key(|e| e.order_key());
        events
    }

    /// Status of the most recent step for `key`.
    pub fn step_status(&self, key: &str) -> Option<AuditStatus> {
        classify_step(&self.events_for(key))
    }

    pub fn applied_height(&self) -> Option<u64> {
        self.applied.map(|(index, _)| index)
    }

    /// Index blocks appended since the last call. Returns the number of new events.
    pub fn catch_up(&mut self, snapshot: &LedgerSnapshot) -> usize {
        if let Some((index, fingerprint)) = self.applied {
            let still_there = snapshot
                .block(index)
                .is_some_and(|block| block.fingerprint == fingerprint);
            if !still_there {
                tracing::debug!(applied = index, "ledger diverged below status index, rebuilding");
                return self.rebuild(snapshot);
            }
        }

        let fresh = extract_events_after(snapshot, self.applied_height());
        if let Some(latest) = snapshot.latest() {
            self.applied = Some((latest.index, latest.fingerprint));
        }
        if fresh.is_empty() {
            return 0;
        }

        let added = fresh.len();
        let mut touched = BTreeSet::new();
        let mut loners = Vec::new();
        for event in fresh {
            let i = self.events.len();
            match &event.key {
                Some(key) => {
                    self.by_key.entry(key.clone()).or_default().push(i);
                    touched.insert(key.clone());
                }
                None => loners.push(i),
            }
            self.events.push(event);
        }

        for key in &touched {
            let indices = self.by_key[key].clone();
            self.reclassify(&indices);
        }
        for i in loners {
            self.reclassify(&[i]);
        }
        tracing::debug!(events = added, keys = touched.len(), "status index caught up");
        added
    }

    /// Discard cached events and re-derive them from the whole snapshot.
    pub fn rebuild(&mut self, snapshot: &LedgerSnapshot) -> usize {
        *self = Self::default();
        self.catch_up(snapshot)
    }

    fn reclassify(&mut self, indices: &[usize]) {
        let group: Vec<&AuditEvent> = indices.iter().map(|&i| &self.events[i]).collect();
        let statuses = row_statuses(&group);
        for (&i, status) in indices.iter().zip(statuses) {
            self.events[i].status = status;
        }
    }
}
