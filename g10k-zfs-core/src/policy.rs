// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Label format of the timestamp policy, e.g. `Date-05-Mar-2024_Time-09.07.03`
pub const TIMESTAMP_FORMAT: &str = "Date-%d-%b-%Y_Time-%H.%M.%S";

/// How snapshot labels are chosen and which snapshots become stale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationPolicy {
    /// A fresh timestamp label per run; every older timestamp snapshot is destroyed
    #[default]
    Timestamp,
    /// Alternate between the `A` and `B` labels, keeping at most two snapshots
    TwoSlot,
}

impl fmt::Display for RotationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationPolicy::Timestamp => write!(f, "timestamp"),
            RotationPolicy::TwoSlot => write!(f, "two-slot"),
        }
    }
}

impl RotationPolicy {
    /// Whether a snapshot label is managed by this policy
    pub fn owns_label(&self, label: &str) -> bool {
        match self {
            RotationPolicy::Timestamp => parse_timestamp_label(label).is_some(),
            RotationPolicy::TwoSlot => Slot::from_label(label).is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::A, Slot::B];

    pub fn label(&self) -> &'static str {
        match self {
            Slot::A => "A",
            Slot::B => "B",
        }
    }

    pub fn other(&self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    pub fn from_label(label: &str) -> Option<Slot> {
        match label {
            "A" => Some(Slot::A),
            "B" => Some(Slot::B),
            _ => None,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn timestamp_label(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp_label(label: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(label, TIMESTAMP_FORMAT).ok()
}
