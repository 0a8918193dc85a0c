use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::status::AuditStatus;

/// Which statuses an audit query keeps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Complete,
    Pending,
    Waiting,
}

impl StatusFilter {
    pub fn accepts(self, status: AuditStatus) -> bool {
        match self {
            Self::All => true,
            Self::Complete => status == AuditStatus::Complete,
            Self::Pending => status == AuditStatus::Pending,
            Self::Waiting => status == AuditStatus::Waiting,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        Ok(match s.parse::<AuditStatus>()? {
            AuditStatus::Complete => Self::Complete,
            AuditStatus::Pending => Self::Pending,
            AuditStatus::Waiting => Self::Waiting,
        })
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::All => "all",
            Self::Complete => "complete",
            Self::Pending => "pending",
            Self::Waiting => "waiting",
        })
    }
}

/// Ordering applied after filtering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Newest first.
    #[default]
    Timestamp,
    /// Action name, case-insensitive ascending.
    Action,
    /// Status name ascending: complete, pending, waiting.
    Status,
}

impl FromStr for SortKey {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "timestamp" | "time" => Ok(Self::Timestamp),
            "action" => Ok(Self::Action),
            "status" => Ok(Self::Status),
            other => Err(AuditError::UnknownSortKey(other.to_string())),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Timestamp => "timestamp",
            Self::Action => "action",
            Self::Status => "status",
        })
    }
}

/// Status filter, free-text filter, and sort key for audit rows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQuery {
    pub status: StatusFilter,
    /// Case-insensitive substring matched against every field. Blank
    /// means no text filter.
    pub text: Option<String>,
    pub sort: SortKey,
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn sorted_by(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    /// Whether `event` passes both filters.
    pub fn accepts(&self, event: &AuditEvent) -> bool {
        if !self.status.accepts(event.status) {
            return false;
        }
        match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => event.matches_text(text),
            _ => true,
        }
    }
}

/// Filter then stably sort a materialized event list.
pub fn filter_and_sort<'a, I>(events: I, query: &AuditQuery) -> Vec<AuditEvent>
where
    I: IntoIterator<Item = &'a AuditEvent>,
{
    let mut rows: Vec<AuditEvent> = events
        .into_iter()
        .filter(|event| query.accepts(event))
        .cloned()
        .collect();

    match query.sort {
        SortKey::Timestamp => rows.sort_by(|a, b| b.order_key().cmp(&a.order_key())),
        SortKey::Action => rows.sort_by_cached_key(|e| e.action.to_lowercase()),
        SortKey::Status => rows.sort_by_key(|e| e.status.as_str()),
    }
    rows
}
