//! Loading raw status records and snapping them onto half-hour slots.
//!
//! Two on-disk shapes are understood:
//!
//! * the fetcher's raw output, keyed by epoch seconds (as a decimal string),
//! * the parsed form, keyed by the canonical `"yyyy-MM-dd HH:mm"` slot key.
//!
//! Both map each key to a `lot id -> raw status code` object.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone};
use parking_map_lots_models::LotId;

use crate::{RecordsError, SLOT_MINUTES};

/// `chrono` format string of the canonical slot key.
pub const SLOT_KEY_FORMAT: &str = "%Y-%m-%d %H:%M";

type JsonRecords = BTreeMap<String, BTreeMap<String, String>>;

/// Formats a slot as its canonical `"yyyy-MM-dd HH:mm"` key.
#[must_use]
pub fn slot_key(slot: NaiveDateTime) -> String {
    slot.format(SLOT_KEY_FORMAT).to_string()
}

/// Immutable table of raw status codes per slot and lot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawStatusRecords {
    slots: BTreeMap<NaiveDateTime, BTreeMap<LotId, String>>,
}

impl RawStatusRecords {
    /// Builds records from already-slotted observations.
    #[must_use]
    pub const fn new(slots: BTreeMap<NaiveDateTime, BTreeMap<LotId, String>>) -> Self {
        Self { slots }
    }

    /// Parses the fetcher's raw output.
    ///
    /// Each epoch-seconds key is rounded to the nearest half hour and
    /// converted to wall-clock time in `tz`. When two samples land on the
    /// same slot the later key overwrites the earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError::Json`] if `json` is not a records object, or
    /// [`RecordsError::InvalidTimestamp`] if a key is not a finite number of
    /// seconds.
    pub fn from_epoch_json<Tz: TimeZone>(json: &str, tz: &Tz) -> Result<Self, RecordsError> {
        let raw: JsonRecords = serde_json::from_str(json)?;
        Self::from_epoch_records(raw, tz)
    }

    /// Parses records keyed by canonical slot keys.
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError::Json`] if `json` is not a records object, or
    /// [`RecordsError::InvalidTimestamp`] if a key is not a slot key.
    pub fn from_slot_json(json: &str) -> Result<Self, RecordsError> {
        let raw: JsonRecords = serde_json::from_str(json)?;
        Self::from_slot_records(raw)
    }

    /// Reads a records file in either shape.
    ///
    /// The shape is picked from the first key: a decimal number means raw
    /// fetcher output, anything else is treated as a slot key.
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError`] if the file cannot be read or parsed.
    pub fn load<Tz: TimeZone>(path: &Path, tz: &Tz) -> Result<Self, RecordsError> {
        let json = std::fs::read_to_string(path)?;
        let raw: JsonRecords = serde_json::from_str(&json)?;

        let is_epoch = raw
            .keys()
            .next()
            .is_some_and(|key| key.trim().parse::<f64>().is_ok());

        let records = if is_epoch {
            Self::from_epoch_records(raw, tz)?
        } else {
            Self::from_slot_records(raw)?
        };

        log::info!(
            "Loaded {} status slots from {}",
            records.len(),
            path.display()
        );
        Ok(records)
    }

    /// Serializes the records keyed by canonical slot keys.
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError::Json`] if serialization fails.
    pub fn to_slot_json(&self) -> Result<String, RecordsError> {
        let out: JsonRecords = self
            .slots
            .iter()
            .map(|(slot, lots)| {
                let lots = lots
                    .iter()
                    .map(|(id, code)| (id.to_string(), code.clone()))
                    .collect();
                (slot_key(*slot), lots)
            })
            .collect();
        Ok(serde_json::to_string(&out)?)
    }

    /// Raw codes recorded at `slot`.
    #[must_use]
    pub fn get(&self, slot: &NaiveDateTime) -> Option<&BTreeMap<LotId, String>> {
        self.slots.get(slot)
    }

    /// Whether anything was recorded at `slot`.
    #[must_use]
    pub fn contains(&self, slot: &NaiveDateTime) -> bool {
        self.slots.contains_key(slot)
    }

    /// All recorded slots in ascending order.
    pub fn slots(&self) -> impl DoubleEndedIterator<Item = NaiveDateTime> + '_ {
        self.slots.keys().copied()
    }

    /// Number of recorded slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn from_epoch_records<Tz: TimeZone>(raw: JsonRecords, tz: &Tz) -> Result<Self, RecordsError> {
        let mut slots = BTreeMap::new();
        for (key, lots) in raw {
            let slot = round_epoch_key(&key, tz)?;
            if slots.insert(slot, parse_lots(&key, lots)).is_some() {
                log::debug!("Record {key} overwrites earlier sample in slot {}", slot_key(slot));
            }
        }
        Ok(Self { slots })
    }

    fn from_slot_records(raw: JsonRecords) -> Result<Self, RecordsError> {
        let mut slots = BTreeMap::new();
        for (key, lots) in raw {
            let slot = NaiveDateTime::parse_from_str(&key, SLOT_KEY_FORMAT)
                .map_err(|_| RecordsError::InvalidTimestamp { key: key.clone() })?;
            slots.insert(slot, parse_lots(&key, lots));
        }
        Ok(Self { slots })
    }
}

/// Rounds an epoch-seconds key to the nearest slot boundary (half rounds
/// up) and converts it to wall-clock time in `tz`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn round_epoch_key<Tz: TimeZone>(key: &str, tz: &Tz) -> Result<NaiveDateTime, RecordsError> {
    let invalid = || RecordsError::InvalidTimestamp {
        key: key.to_string(),
    };

    let seconds: f64 = key.trim().parse().map_err(|_| invalid())?;
    if !seconds.is_finite() {
        return Err(invalid());
    }

    let slot_seconds = (SLOT_MINUTES * 60) as f64;
    let rounded = ((seconds / slot_seconds).round() * slot_seconds) as i64;

    DateTime::from_timestamp(rounded, 0)
        .map(|utc| utc.with_timezone(tz).naive_local())
        .ok_or_else(invalid)
}

fn parse_lots(key: &str, lots: BTreeMap<String, String>) -> BTreeMap<LotId, String> {
    lots.into_iter()
        .filter_map(|(id, code)| match id.trim().parse::<LotId>() {
            Ok(id) => Some((id, code)),
            Err(_) => {
                log::warn!("Skipping lot with non-numeric id '{id}' in record {key}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveDate, Utc};

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    // 2023-01-01 00:00:00 UTC
    const NEW_YEAR: i64 = 1_672_531_200;

    #[test]
    fn rounds_to_nearest_half_hour() {
        let json = format!(
            r#"{{
                "{}": {{"1": "full"}},
                "{}.25": {{"2": "few"}},
                "{}": {{"3": "na"}}
            }}"#,
            NEW_YEAR + 899,
            NEW_YEAR + 3600 + 900,
            NEW_YEAR + 7200 + 60,
        );

        let records = RawStatusRecords::from_epoch_json(&json, &Utc).unwrap();
        let slots: Vec<_> = records.slots().collect();
        assert_eq!(
            slots,
            vec![at(2023, 1, 1, 0, 0), at(2023, 1, 1, 1, 30), at(2023, 1, 1, 2, 0)]
        );
        assert_eq!(
            records.get(&at(2023, 1, 1, 1, 30)).unwrap().get(&2).map(String::as_str),
            Some("few")
        );
    }

    #[test]
    fn converts_to_local_wall_clock() {
        let json = format!(r#"{{"{NEW_YEAR}": {{"19": "available"}}}}"#);
        let israel = FixedOffset::east_opt(2 * 3600).unwrap();

        let records = RawStatusRecords::from_epoch_json(&json, &israel).unwrap();
        assert!(records.contains(&at(2023, 1, 1, 2, 0)));
    }

    #[test]
    fn duplicate_slots_overwrite() {
        let json = format!(
            r#"{{"{}": {{"1": "full"}}, "{}": {{"1": "available"}}}}"#,
            NEW_YEAR - 60,
            NEW_YEAR + 60,
        );

        let records = RawStatusRecords::from_epoch_json(&json, &Utc).unwrap();
        assert_eq!(records.len(), 1);
        let lots = records.get(&at(2023, 1, 1, 0, 0)).unwrap();
        assert_eq!(lots.get(&1).map(String::as_str), Some("available"));
    }

    #[test]
    fn skips_non_numeric_lot_ids() {
        let json = format!(r#"{{"{NEW_YEAR}": {{"abc": "full", "4": "closed"}}}}"#);
        let records = RawStatusRecords::from_epoch_json(&json, &Utc).unwrap();
        let lots = records.get(&at(2023, 1, 1, 0, 0)).unwrap();
        assert_eq!(lots.len(), 1);
        assert!(lots.contains_key(&4));
    }

    #[test]
    fn rejects_bad_timestamps() {
        let result = RawStatusRecords::from_epoch_json(r#"{"soon": {}}"#, &Utc);
        assert!(matches!(result, Err(RecordsError::InvalidTimestamp { .. })));

        let result = RawStatusRecords::from_slot_json(r#"{"2023-01-01T00:00": {}}"#);
        assert!(matches!(result, Err(RecordsError::InvalidTimestamp { .. })));
    }

    #[test]
    fn slot_json_round_trip() {
        let json = r#"{"2023-01-06 19:00": {"20": "full", "25": "few"}}"#;
        let records = RawStatusRecords::from_slot_json(json).unwrap();
        assert_eq!(slot_key(at(2023, 1, 6, 19, 0)), "2023-01-06 19:00");

        let reparsed = RawStatusRecords::from_slot_json(&records.to_slot_json().unwrap()).unwrap();
        assert_eq!(reparsed, records);
    }
}
