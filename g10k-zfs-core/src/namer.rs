// SPDX-License-Identifier: GPL-3.0-only

use chrono::{Local, NaiveDateTime};
use tracing::debug;

use crate::inventory::Inventory;
use crate::policy::{RotationPolicy, Slot, timestamp_label};

/// Source of wall-clock time for timestamp labels
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local time of the host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Label chosen for the next snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    pub label: String,
    /// Both slots exist; they must be cleared before the label is used
    pub anomaly: bool,
}

pub struct SnapshotNamer<'a> {
    clock: &'a dyn Clock,
}

impl<'a> SnapshotNamer<'a> {
    pub fn new(clock: &'a dyn Clock) -> Self {
        Self { clock }
    }

    /// Pick the next label for `inventory`'s policy.
    ///
    /// Timestamp labels have second resolution, so two runs within the same
    /// second produce the same label; the storage layer then refuses to create
    /// it and the run fails instead of overwriting.
    pub fn next(&self, inventory: &Inventory) -> Naming {
        let naming = match inventory.policy() {
            RotationPolicy::Timestamp => Naming {
                label: timestamp_label(self.clock.now()),
                anomaly: false,
            },
            RotationPolicy::TwoSlot => {
                let a = inventory.slot(Slot::A).is_some();
                let b = inventory.slot(Slot::B).is_some();
                let (slot, anomaly) = match (a, b) {
                    (false, _) => (Slot::A, false),
                    (true, false) => (Slot::B, false),
                    (true, true) => (Slot::A, true),
                };
                Naming {
                    label: slot.label().to_string(),
                    anomaly,
                }
            }
        };

        debug!("next snapshot label {}", naming.label);
        naming
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::NaiveDate;

    use super::*;
    use crate::inventory::SnapshotEntry;

    struct FixedClock(NaiveDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    fn entry(label: &str) -> Option<SnapshotEntry> {
        Some(SnapshotEntry {
            label: label.to_string(),
            name: format!("tank/g10k@{label}"),
            created_at: None,
            mount_points: Vec::<PathBuf>::new(),
        })
    }

    fn slots(a: bool, b: bool) -> Inventory {
        Inventory::TwoSlot {
            a: if a { entry("A") } else { None },
            b: if b { entry("B") } else { None },
        }
    }

    #[test]
    fn two_slot_decision_table() {
        let clock = SystemClock;
        let namer = SnapshotNamer::new(&clock);

        let cases = [
            (false, false, "A", false),
            (false, true, "A", false),
            (true, false, "B", false),
            (true, true, "A", true),
        ];
        for (a, b, label, anomaly) in cases {
            let naming = namer.next(&slots(a, b));
            assert_eq!(naming.label, label, "A={a} B={b}");
            assert_eq!(naming.anomaly, anomaly, "A={a} B={b}");
        }
    }

    #[test]
    fn timestamp_label_follows_the_clock() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 2)
            .and_then(|date| date.and_hms_opt(10, 0, 0))
            .expect("valid date");
        let inventory = Inventory::empty(RotationPolicy::Timestamp);

        let clock = FixedClock(start);
        let first = SnapshotNamer::new(&clock).next(&inventory);
        assert_eq!(first.label, "Date-02-Jan-2025_Time-10.00.00");
        assert!(!first.anomaly);

        let later = FixedClock(start + chrono::Duration::seconds(1));
        assert_ne!(SnapshotNamer::new(&later).next(&inventory).label, first.label);
    }
}
