//! Independent rule checking for finished rosters.
//!
//! Re-derives every violation from the roster alone, so drafts from the
//! optimizer and from the heuristic are judged the same way. Violations
//! are reported as found and never deduplicated.

use serde::Serialize;

use crate::config::Config;
use crate::domain::{EmployeeRow, Horizon, Roster, ShiftCode};
use crate::heuristic::is_forbidden_transition;
use crate::model::REST_WINDOW;
use crate::relaxation::Attempt;

/// Categories of per-employee rule breaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HardViolationKind {
    /// C followed by A or B.
    CReset,
    /// B followed by A while not permitted.
    BToA,
    /// A 7-day window without exactly one rest day.
    WoCadence,
    /// A run of one shift shorter than the minimum.
    MinContinuity,
    /// A run of one shift longer than the maximum.
    MaxContinuity,
}

/// A breach of a rule that a feasible roster never shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HardViolation {
    pub employee_id: String,
    /// Day the breach is anchored at: the first day of the pair, window
    /// or run.
    pub day: Option<usize>,
    pub kind: HardViolationKind,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaffingViolationKind {
    BelowMin,
    AboveMax,
}

/// A headcount outside the configured bound for one day, role and shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffingViolation {
    pub day: usize,
    pub role: String,
    pub shift: ShiftCode,
    pub kind: StaffingViolationKind,
    pub count: u32,
    pub limit: u32,
}

/// Everything found wrong with one roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub hard_violations: Vec<HardViolation>,
    pub staffing_violations: Vec<StaffingViolation>,
}

impl ValidationReport {
    pub fn hard_count(&self) -> usize {
        self.hard_violations.len()
    }

    pub fn staffing_count(&self) -> usize {
        self.staffing_violations.len()
    }

    pub fn is_clean(&self) -> bool {
        self.hard_violations.is_empty() && self.staffing_violations.is_empty()
    }

    /// First hard violation anchored at this employee and day.
    pub fn hard_at(&self, employee_id: &str, day: usize) -> Option<&HardViolation> {
        self.hard_violations
            .iter()
            .find(|v| v.employee_id == employee_id && v.day == Some(day))
    }
}

/// The rules a roster is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSet {
    pub min_days: u32,
    pub max_days: u32,
    pub allow_b_to_a: bool,
    pub leave_counts_as_rest: bool,
    /// Accept 0..=2 rest days per window instead of exactly one.
    pub rest_tolerance: bool,
    /// Skip the minimum check for runs touching the first or last day.
    pub boundary_exempt: bool,
}

impl RuleSet {
    /// The configured rules without any relaxation.
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_days: config.continuity.min_days,
            max_days: config.continuity.max_days,
            allow_b_to_a: config.allow_b_to_a,
            leave_counts_as_rest: config.leave_counts_as_rest(),
            rest_tolerance: false,
            boundary_exempt: false,
        }
    }

    /// The rules as loosened by one attempt.
    pub fn for_attempt(config: &Config, attempt: &Attempt) -> Self {
        Self {
            min_days: attempt.min_days,
            max_days: attempt.max_days,
            allow_b_to_a: config.allow_b_to_a || attempt.allow_last_resort_transitions,
            leave_counts_as_rest: config.leave_counts_as_rest(),
            rest_tolerance: attempt.rest_tolerance,
            boundary_exempt: attempt.allow_end_of_horizon_exception,
        }
    }

    fn rest_count_ok(&self, count: usize) -> bool {
        if self.rest_tolerance {
            count <= 2
        } else {
            count == 1
        }
    }
}

/// Checks a roster against the configured rules.
pub fn validate(roster: &Roster, horizon: &Horizon, config: &Config) -> ValidationReport {
    validate_with(roster, horizon, config, &RuleSet::from_config(config))
}

/// Checks a roster against an explicit rule set.
///
/// Staffing bounds always come from `config`; only roles listed in the
/// staffing matrix are checked.
pub fn validate_with(
    roster: &Roster,
    horizon: &Horizon,
    config: &Config,
    rules: &RuleSet,
) -> ValidationReport {
    let days = horizon.len();
    let mut report = ValidationReport::default();

    for row in &roster.rows {
        let cells = &row.cells[..row.cells.len().min(days)];
        check_transitions(row, cells, rules, &mut report.hard_violations);
        check_rest_cadence(row, cells, rules, &mut report.hard_violations);
        for &shift in config.work_shifts() {
            check_runs(row, cells, shift, rules, &mut report.hard_violations);
        }
    }

    check_staffing(roster, days, config, &mut report.staffing_violations);
    report
}

fn check_transitions(row: &EmployeeRow, cells: &[ShiftCode], rules: &RuleSet, out: &mut Vec<HardViolation>) {
    for (d, pair) in cells.windows(2).enumerate() {
        let (today, next) = (pair[0], pair[1]);
        let kind = match (today, next) {
            (ShiftCode::C, ShiftCode::A | ShiftCode::B) => HardViolationKind::CReset,
            (ShiftCode::B, ShiftCode::A) if is_forbidden_transition(today, next, rules.allow_b_to_a) => {
                HardViolationKind::BToA
            }
            _ => continue,
        };
        out.push(HardViolation {
            employee_id: row.employee_id.clone(),
            day: Some(d),
            kind,
            explanation: format!("{} on day {} followed by {}", today, d, next),
        });
    }
}

fn check_rest_cadence(row: &EmployeeRow, cells: &[ShiftCode], rules: &RuleSet, out: &mut Vec<HardViolation>) {
    if cells.len() < REST_WINDOW {
        return;
    }
    for (t, window) in cells.windows(REST_WINDOW).enumerate() {
        let rest = window
            .iter()
            .filter(|&&c| c == ShiftCode::Wo || (rules.leave_counts_as_rest && c == ShiftCode::L))
            .count();
        if !rules.rest_count_ok(rest) {
            out.push(HardViolation {
                employee_id: row.employee_id.clone(),
                day: Some(t),
                kind: HardViolationKind::WoCadence,
                explanation: format!("{} rest days in the week starting day {}", rest, t),
            });
        }
    }
}

fn check_runs(
    row: &EmployeeRow,
    cells: &[ShiftCode],
    shift: ShiftCode,
    rules: &RuleSet,
    out: &mut Vec<HardViolation>,
) {
    let last = cells.len().saturating_sub(1);
    let mut start = 0;
    while start < cells.len() {
        if cells[start] != shift {
            start += 1;
            continue;
        }
        let len = cells[start..].iter().take_while(|&&c| c == shift).count();
        let end = start + len - 1;
        let touches_boundary = start == 0 || end == last;

        if (len as u32) < rules.min_days && !(rules.boundary_exempt && touches_boundary) {
            out.push(HardViolation {
                employee_id: row.employee_id.clone(),
                day: Some(start),
                kind: HardViolationKind::MinContinuity,
                explanation: format!("{}-day run of {} from day {}, minimum {}", len, shift, start, rules.min_days),
            });
        }
        if len as u32 > rules.max_days {
            out.push(HardViolation {
                employee_id: row.employee_id.clone(),
                day: Some(start),
                kind: HardViolationKind::MaxContinuity,
                explanation: format!("{}-day run of {} from day {}, maximum {}", len, shift, start, rules.max_days),
            });
        }
        start = end + 1;
    }
}

fn check_staffing(roster: &Roster, days: usize, config: &Config, out: &mut Vec<StaffingViolation>) {
    let matrix = &config.staffing_matrix;
    for day in 0..days {
        for &shift in config.work_shifts() {
            for role in matrix.roles() {
                let Some(bound) = matrix.bound(role, shift) else {
                    continue;
                };
                let count = roster.headcount(day, role, shift);
                let min = bound.min_or_zero();
                if count < min {
                    out.push(StaffingViolation {
                        day,
                        role: role.to_string(),
                        shift,
                        kind: StaffingViolationKind::BelowMin,
                        count,
                        limit: min,
                    });
                }
                if let Some(max) = bound.max.filter(|&max| count > max) {
                    out.push(StaffingViolation {
                        day,
                        role: role.to_string(),
                        shift,
                        kind: StaffingViolationKind::AboveMax,
                        count,
                        limit: max,
                    });
                }
            }
        }
    }
}
