//! Fixed-size weekday set.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Seven-bit set of weekdays, bit 0 = Sunday ... bit 6 = Saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const ALL: WeekdaySet = WeekdaySet(0b111_1111);
    pub const EMPTY: WeekdaySet = WeekdaySet(0);
    pub const WEEKDAYS: WeekdaySet = WeekdaySet(0b011_1110);
    pub const WEEKENDS: WeekdaySet = WeekdaySet(0b100_0001);

    /// Build from a raw mask; bits above 6 are dropped.
    pub fn from_bits(bits: u8) -> Self {
        WeekdaySet(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Set containing a single day index (0 = Sunday). Out-of-range is empty.
    pub fn only(day: u8) -> Self {
        if day < 7 {
            WeekdaySet(1 << day)
        } else {
            Self::EMPTY
        }
    }

    pub fn only_weekday(day: Weekday) -> Self {
        Self::only(day.num_days_from_sunday() as u8)
    }

    pub fn with(self, day: u8) -> Self {
        WeekdaySet(self.0 | Self::only(day).0)
    }

    pub fn contains(self, day: u8) -> bool {
        day < 7 && self.0 & (1 << day) != 0
    }

    pub fn contains_weekday(self, day: Weekday) -> bool {
        self.contains(day.num_days_from_sunday() as u8)
    }

    pub fn contains_date(self, date: NaiveDate) -> bool {
        self.contains_weekday(date.weekday())
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Day indices in the set, Sunday first.
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..7u8).filter(move |d| self.contains(*d))
    }
}

impl Default for WeekdaySet {
    fn default() -> Self {
        Self::ALL
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ALL => f.write_str("daily"),
            Self::WEEKDAYS => f.write_str("weekdays"),
            Self::WEEKENDS => f.write_str("weekends"),
            set => {
                let names: Vec<&str> = set.iter().map(|d| NAMES[d as usize]).collect();
                f.write_str(&names.join(","))
            }
        }
    }
}

/// Parses `daily`, `weekdays`, `weekends` or a comma list like `mon,wed,fri`.
impl FromStr for WeekdaySet {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "all" => return Ok(Self::ALL),
            "weekdays" => return Ok(Self::WEEKDAYS),
            "weekends" => return Ok(Self::WEEKENDS),
            _ => {}
        }

        let mut set = Self::EMPTY;
        for part in s.split(',') {
            let part = part.trim().to_ascii_lowercase();
            let day = part
                .parse::<Weekday>()
                .map_err(|_| ValidationError::InvalidValue {
                    field: "days".into(),
                    message: format!("unknown weekday '{part}'"),
                })?;
            set = set.with(day.num_days_from_sunday() as u8);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sunday_is_bit_zero() {
        let set = WeekdaySet::only_weekday(Weekday::Sun);
        assert_eq!(set.bits(), 1);
        assert!(set.contains(0));
        assert!(!set.contains(1));
    }

    #[test]
    fn parse_named_sets() {
        assert_eq!("daily".parse::<WeekdaySet>().unwrap(), WeekdaySet::ALL);
        assert_eq!("Weekdays".parse::<WeekdaySet>().unwrap(), WeekdaySet::WEEKDAYS);

        let set: WeekdaySet = "mon, wed,friday".parse().unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert_eq!(set.to_string(), "mon,wed,fri");

        assert!("someday".parse::<WeekdaySet>().is_err());
    }

    #[test]
    fn out_of_range_day_is_ignored() {
        assert!(WeekdaySet::only(7).is_empty());
        assert!(!WeekdaySet::ALL.contains(9));
        assert_eq!(WeekdaySet::from_bits(0xff), WeekdaySet::ALL);
    }
}
