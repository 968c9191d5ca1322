//! Domain model for shift rostering.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::error::{Result, RosterError};

/// Date format used for calendar-resolvable day keys.
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// One roster cell value.
///
/// Declaration order is the canonical alphabet order used everywhere
/// (model columns, stats, tie-breaks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShiftCode {
    A,
    B,
    C,
    /// Weekly rest.
    #[serde(rename = "WO")]
    Wo,
    /// Approved leave.
    L,
}

impl ShiftCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ShiftCode::A => "A",
            ShiftCode::B => "B",
            ShiftCode::C => "C",
            ShiftCode::Wo => "WO",
            ShiftCode::L => "L",
        }
    }

    /// Returns true for A, B and C.
    pub fn is_work(self) -> bool {
        matches!(self, ShiftCode::A | ShiftCode::B | ShiftCode::C)
    }

    /// Parses the textual code used in column names and configs.
    ///
    /// ```
    /// use shift_roster::domain::ShiftCode;
    ///
    /// assert_eq!(ShiftCode::parse("WO"), Some(ShiftCode::Wo));
    /// assert_eq!(ShiftCode::parse("c"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A" => Some(ShiftCode::A),
            "B" => Some(ShiftCode::B),
            "C" => Some(ShiftCode::C),
            "WO" => Some(ShiftCode::Wo),
            "L" => Some(ShiftCode::L),
            _ => None,
        }
    }
}

impl fmt::Display for ShiftCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of working shifts in the alphabet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ShiftMode {
    TwoShifts,
    #[default]
    ThreeShifts,
}

impl ShiftMode {
    pub fn work_shifts(self) -> &'static [ShiftCode] {
        match self {
            ShiftMode::TwoShifts => &[ShiftCode::A, ShiftCode::B],
            ShiftMode::ThreeShifts => &[ShiftCode::A, ShiftCode::B, ShiftCode::C],
        }
    }

    /// Work shifts followed by WO and L.
    pub fn alphabet(self) -> &'static [ShiftCode] {
        match self {
            ShiftMode::TwoShifts => &[ShiftCode::A, ShiftCode::B, ShiftCode::Wo, ShiftCode::L],
            ShiftMode::ThreeShifts => &[
                ShiftCode::A,
                ShiftCode::B,
                ShiftCode::C,
                ShiftCode::Wo,
                ShiftCode::L,
            ],
        }
    }
}

impl TryFrom<u8> for ShiftMode {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            2 => Ok(ShiftMode::TwoShifts),
            3 => Ok(ShiftMode::ThreeShifts),
            other => Err(format!("shift mode must be 2 or 3, got {}", other)),
        }
    }
}

impl From<ShiftMode> for u8 {
    fn from(mode: ShiftMode) -> u8 {
        match mode {
            ShiftMode::TwoShifts => 2,
            ShiftMode::ThreeShifts => 3,
        }
    }
}

/// Days on which an employee is on leave, as horizon day indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LeaveCalendar {
    days: BTreeSet<usize>,
}

impl LeaveCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps only indices inside a horizon of `horizon_len` days.
    pub fn from_indices(indices: impl IntoIterator<Item = usize>, horizon_len: usize) -> Self {
        Self {
            days: indices.into_iter().filter(|&d| d < horizon_len).collect(),
        }
    }

    pub fn contains(&self, day: usize) -> bool {
        self.days.contains(&day)
    }

    pub fn insert(&mut self, day: usize) {
        self.days.insert(day);
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.days.iter().copied()
    }
}

/// Preferred weekly rest day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RestPreference {
    /// A named weekday, matched against the calendar when day keys are dates.
    Weekday(Weekday),
    /// A plain offset (0 = Sunday .. 6 = Saturday), always positional.
    Offset(u8),
}

impl RestPreference {
    /// Parses weekday names and abbreviations, case-insensitively.
    ///
    /// ```
    /// use chrono::Weekday;
    /// use shift_roster::domain::RestPreference;
    ///
    /// assert_eq!(RestPreference::parse(" Thurs "), Some(RestPreference::Weekday(Weekday::Thu)));
    /// assert_eq!(RestPreference::parse("someday"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        let weekday = match s.trim().to_lowercase().as_str() {
            "sun" | "sunday" => Weekday::Sun,
            "mon" | "monday" => Weekday::Mon,
            "tue" | "tues" | "tuesday" => Weekday::Tue,
            "wed" | "wednesday" => Weekday::Wed,
            "thu" | "thur" | "thurs" | "thursday" => Weekday::Thu,
            "fri" | "friday" => Weekday::Fri,
            "sat" | "saturday" => Weekday::Sat,
            _ => return None,
        };
        Some(RestPreference::Weekday(weekday))
    }

    /// Offset from a raw number, wrapped into 0..7.
    pub fn from_number(n: i64) -> Self {
        RestPreference::Offset(n.rem_euclid(7) as u8)
    }

    /// Position inside a 7-day window (0 = Sunday).
    pub fn index(self) -> usize {
        match self {
            RestPreference::Weekday(w) => w.num_days_from_sunday() as usize,
            RestPreference::Offset(n) => n as usize % 7,
        }
    }
}

/// An employee as seen by the engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    pub role: String,
    /// Seed for continuity: the last shift worked before the horizon.
    pub last_shift: Option<ShiftCode>,
    /// Length of the run that `last_shift` belongs to.
    pub streak: Option<u32>,
    pub leave: LeaveCalendar,
    pub rest_preference: Option<RestPreference>,
}

impl Employee {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            last_shift: None,
            streak: None,
            leave: LeaveCalendar::new(),
            rest_preference: None,
        }
    }

    pub fn with_leave(mut self, days: impl IntoIterator<Item = usize>) -> Self {
        for day in days {
            self.leave.insert(day);
        }
        self
    }

    pub fn with_rest_preference(mut self, preference: RestPreference) -> Self {
        self.rest_preference = Some(preference);
        self
    }

    pub fn with_seed(mut self, last_shift: ShiftCode, streak: u32) -> Self {
        self.last_shift = Some(last_shift);
        self.streak = Some(streak);
        self
    }
}

/// The scheduling window as an ordered list of day keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Horizon {
    days: Vec<String>,
}

impl Horizon {
    /// Builds a horizon, rejecting empty or duplicated day keys.
    pub fn new(days: Vec<String>) -> Result<Self> {
        if days.is_empty() {
            return Err(RosterError::InvalidHorizon {
                reason: "horizon has no days".to_string(),
            });
        }
        let mut seen = HashSet::with_capacity(days.len());
        for key in &days {
            if !seen.insert(key.as_str()) {
                return Err(RosterError::InvalidHorizon {
                    reason: format!("duplicate day key '{}'", key),
                });
            }
        }
        Ok(Self { days })
    }

    /// Consecutive calendar days starting at `start`.
    pub fn from_start(start: NaiveDate, len: usize) -> Result<Self> {
        let days = (0..len)
            .map(|i| {
                (start + Duration::days(i as i64))
                    .format(DAY_KEY_FORMAT)
                    .to_string()
            })
            .collect();
        Self::new(days)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn day_key(&self, day: usize) -> Option<&str> {
        self.days.get(day).map(String::as_str)
    }

    pub fn days(&self) -> &[String] {
        &self.days
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.days.iter().position(|d| d == key)
    }

    /// Weekday of a day, when its key is an ISO date.
    pub fn weekday(&self, day: usize) -> Option<Weekday> {
        let key = self.days.get(day)?;
        NaiveDate::parse_from_str(key, DAY_KEY_FORMAT)
            .ok()
            .map(|date| date.weekday())
    }

    /// True when every day key is an ISO date.
    pub fn is_calendar_resolvable(&self) -> bool {
        (0..self.days.len()).all(|d| self.weekday(d).is_some())
    }
}

/// One employee's assignments over the horizon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRow {
    pub employee_id: String,
    pub role: String,
    pub cells: Vec<ShiftCode>,
}

/// A fully populated roster, one row per employee in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Roster {
    pub rows: Vec<EmployeeRow>,
}

impl Roster {
    pub fn new(rows: Vec<EmployeeRow>) -> Self {
        Self { rows }
    }

    /// Number of employees of `role` coded `shift` on `day`.
    pub fn headcount(&self, day: usize, role: &str, shift: ShiftCode) -> u32 {
        self.rows
            .iter()
            .filter(|r| r.role == role && r.cells.get(day) == Some(&shift))
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizon_rejects_empty_and_duplicates() {
        assert!(Horizon::new(vec![]).is_err());
        assert!(Horizon::new(vec!["d1".into(), "d1".into()]).is_err());
        assert_eq!(Horizon::new(vec!["d1".into(), "d2".into()]).unwrap().len(), 2);
    }

    #[test]
    fn test_horizon_weekday_resolution() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(); // Monday
        let horizon = Horizon::from_start(start, 7).unwrap();
        assert!(horizon.is_calendar_resolvable());
        assert_eq!(horizon.weekday(0), Some(Weekday::Mon));
        assert_eq!(horizon.weekday(6), Some(Weekday::Sun));
        assert_eq!(horizon.day_key(2), Some("2024-01-03"));

        let opaque = Horizon::new(vec!["w1-d1".into(), "w1-d2".into()]).unwrap();
        assert!(!opaque.is_calendar_resolvable());
        assert_eq!(opaque.weekday(0), None);
    }

    #[test]
    fn test_leave_calendar_drops_out_of_range() {
        let leave = LeaveCalendar::from_indices([0, 3, 9, 3], 7);
        assert_eq!(leave.iter().collect::<Vec<_>>(), vec![0, 3]);
        assert!(leave.contains(3));
        assert!(!leave.contains(9));
    }

    #[test]
    fn test_rest_preference_index() {
        assert_eq!(RestPreference::Weekday(Weekday::Sun).index(), 0);
        assert_eq!(RestPreference::Weekday(Weekday::Sat).index(), 6);
        assert_eq!(RestPreference::from_number(-1), RestPreference::Offset(6));
        assert_eq!(RestPreference::from_number(9).index(), 2);
    }

    #[test]
    fn test_shift_mode_alphabet() {
        assert_eq!(ShiftMode::TwoShifts.work_shifts(), &[ShiftCode::A, ShiftCode::B]);
        assert_eq!(ShiftMode::ThreeShifts.alphabet().len(), 5);
        assert!(ShiftMode::try_from(4).is_err());
        assert!(!ShiftCode::Wo.is_work());
        assert!(ShiftCode::C.is_work());
    }
}
