//! Temporal index over the slotted status records.
//!
//! Resolves a [`ViewDate`] into concrete slots, gathers each lot's
//! normalized status history over those slots, and keeps the bookkeeping
//! about the observed range that navigation needs.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use parking_map_lots_models::LotId;
use parking_map_records_models::ViewDate;
use parking_map_status_models::LotStatus;

use crate::{RawStatusRecords, SLOT_MINUTES, SLOTS_PER_DAY};

/// Direction of a half-hour navigation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Thirty minutes back.
    Earlier,
    /// Thirty minutes forward.
    Later,
}

impl Direction {
    fn delta(self) -> TimeDelta {
        let step = TimeDelta::minutes(SLOT_MINUTES);
        match self {
            Self::Earlier => -step,
            Self::Later => step,
        }
    }
}

/// Concrete slots covered by `view`.
///
/// An instant resolves to itself. An aggregate resolves to every day of
/// `observed_days` whose weekday belongs to the group, at the aggregate's
/// time of day, in the order of `observed_days`.
#[must_use]
pub fn resolve_timestamps(view: &ViewDate, observed_days: &[NaiveDate]) -> Vec<NaiveDateTime> {
    match view {
        ViewDate::Instant { timestamp } => vec![*timestamp],
        ViewDate::Aggregate { group, time } => observed_days
            .iter()
            .filter(|day| group.contains(day.weekday()))
            .map(|day| day.and_time(*time))
            .collect(),
    }
}

/// Read-only index over [`RawStatusRecords`].
#[derive(Debug, Clone)]
pub struct TemporalIndex {
    records: RawStatusRecords,
    range: Option<(NaiveDateTime, NaiveDateTime)>,
    observed_days: Vec<NaiveDate>,
}

impl TemporalIndex {
    /// Builds the index and derives the observed range.
    #[must_use]
    pub fn new(records: RawStatusRecords) -> Self {
        let range = records
            .slots()
            .next()
            .zip(records.slots().next_back());

        let observed_days = range.map_or_else(Vec::new, |(earliest, latest)| {
            earliest
                .date()
                .iter_days()
                .take_while(|day| *day <= latest.date())
                .collect()
        });

        Self {
            records,
            range,
            observed_days,
        }
    }

    /// The underlying records.
    #[must_use]
    pub const fn records(&self) -> &RawStatusRecords {
        &self.records
    }

    /// Earliest recorded slot.
    #[must_use]
    pub fn earliest(&self) -> Option<NaiveDateTime> {
        self.range.map(|(earliest, _)| earliest)
    }

    /// Latest recorded slot.
    #[must_use]
    pub fn latest(&self) -> Option<NaiveDateTime> {
        self.range.map(|(_, latest)| latest)
    }

    /// Every calendar day from the earliest slot's date through the latest
    /// slot's date, including days without any record.
    #[must_use]
    pub fn observed_days(&self) -> &[NaiveDate] {
        &self.observed_days
    }

    /// Whether `day` has a record for every half-hour slot.
    #[must_use]
    pub fn is_day_complete(&self, day: NaiveDate) -> bool {
        (0..SLOTS_PER_DAY).all(|slot| {
            let time = NaiveTime::from_hms_opt(slot / 2, (slot % 2) * 30, 0);
            time.is_some_and(|time| self.records.contains(&day.and_time(time)))
        })
    }

    /// Observed days missing at least one slot.
    #[must_use]
    pub fn incomplete_days(&self) -> Vec<NaiveDate> {
        self.observed_days
            .iter()
            .copied()
            .filter(|day| !self.is_day_complete(*day))
            .collect()
    }

    /// Slots covered by `view` over this index's observed days.
    #[must_use]
    pub fn resolve_timestamps(&self, view: &ViewDate) -> Vec<NaiveDateTime> {
        resolve_timestamps(view, &self.observed_days)
    }

    /// Raw codes recorded at `slot`.
    ///
    /// `slot` must lie on the half-hour grid; off-grid times never match.
    #[must_use]
    pub fn lookup(&self, slot: &NaiveDateTime) -> Option<&BTreeMap<LotId, String>> {
        self.records.get(slot)
    }

    /// Normalized status history of every lot over the slots of `view`.
    ///
    /// A lot that is absent from a slot's record contributes no entry for
    /// that slot; lots absent from every slot do not appear at all.
    #[must_use]
    pub fn statuses_for_view_date(&self, view: &ViewDate) -> BTreeMap<LotId, Vec<LotStatus>> {
        let mut histories: BTreeMap<LotId, Vec<LotStatus>> = BTreeMap::new();

        for slot in self.resolve_timestamps(view) {
            let Some(lots) = self.lookup(&slot) else {
                continue;
            };
            for (lot_id, code) in lots {
                histories
                    .entry(*lot_id)
                    .or_default()
                    .push(LotStatus::classify(Some(code)));
            }
        }

        histories
    }

    /// Moves `view` one slot earlier or later.
    ///
    /// Returns `None` when an instant would leave the recorded range, or
    /// when an aggregate's time of day would cross midnight.
    #[must_use]
    pub fn step(&self, view: &ViewDate, direction: Direction) -> Option<ViewDate> {
        match view {
            ViewDate::Instant { timestamp } => {
                let (earliest, latest) = self.range?;
                let next = timestamp.checked_add_signed(direction.delta())?;
                (earliest..=latest)
                    .contains(&next)
                    .then_some(ViewDate::instant(next))
            }
            ViewDate::Aggregate { group, time } => {
                let (next, wrapped) = time.overflowing_add_signed(direction.delta());
                (wrapped == 0).then_some(ViewDate::aggregate(*group, next))
            }
        }
    }

    /// Re-targets an instant to `day`, keeping its time of day and clamping
    /// the result into the recorded range. Aggregates are returned as-is.
    #[must_use]
    pub fn with_day(&self, view: &ViewDate, day: NaiveDate) -> ViewDate {
        match view {
            ViewDate::Instant { timestamp } => {
                let moved = day.and_time(timestamp.time());
                let clamped = self
                    .range
                    .map_or(moved, |(earliest, latest)| moved.clamp(earliest, latest));
                ViewDate::instant(clamped)
            }
            ViewDate::Aggregate { .. } => *view,
        }
    }
}
