//! Skeleton graph records: the derived, validity-interval-tagged mirror of
//! real topology used for time-aware traversal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `[valid_since, valid_until)` range during which a skeleton entry is live.
/// An open interval (`valid_until == None`) means the entry is live now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityInterval {
    pub valid_since: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl ValidityInterval {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.valid_since && self.valid_until.map_or(true, |until| t < until)
    }

    pub fn is_open(&self) -> bool {
        self.valid_until.is_none()
    }
}

/// Whether a skeleton vertex mirrors a synced entity or is a forward-reference
/// placeholder for an edge endpoint whose own create event has not been
/// processed yet. Ghosts are reconciled to `Real` when that event arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkeletonKind {
    Real,
    Ghost,
}

impl SkeletonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkeletonKind::Real => "real",
            SkeletonKind::Ghost => "ghost",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "real" => Some(SkeletonKind::Real),
            "ghost" => Some(SkeletonKind::Ghost),
            _ => None,
        }
    }
}

/// Which end of the real edge a spoke attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalEnd {
    #[serde(rename = "_from")]
    From,
    #[serde(rename = "_to")]
    To,
}

impl LogicalEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalEnd::From => "_from",
            LogicalEnd::To => "_to",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "_from" => Some(LogicalEnd::From),
            "_to" => Some(LogicalEnd::To),
            _ => None,
        }
    }
}
