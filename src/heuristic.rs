//! Deterministic roster construction without an external optimizer.
//!
//! Four phases:
//! 1. place weekly rest days and lock leave days
//! 2. fill each day greedily: staffing minimums first, then balance
//! 3. one pass of pairwise swaps to repair runs shorter than `min_days`
//! 4. any cell still empty becomes WO
//!
//! Repair is best effort; residual violations are left for the validator.

use std::collections::HashMap;
use tracing::debug;

use crate::config::Config;
use crate::domain::{Employee, EmployeeRow, Horizon, RestPreference, Roster, ShiftCode};
use crate::error::{Result, RosterError};
use crate::model::REST_WINDOW;
use crate::relaxation::Attempt;

const PENALTY_EARLY_SWITCH: u32 = 50;
const PENALTY_OVERLONG_RUN: u32 = 40;
const PENALTY_SHIFT_CHANGE: u32 = 5;
const PENALTY_SEED_DEVIATION: u32 = 2;

/// True when `next` may not follow `prev` on consecutive days.
pub fn is_forbidden_transition(prev: ShiftCode, next: ShiftCode, allow_b_to_a: bool) -> bool {
    match (prev, next) {
        (ShiftCode::C, ShiftCode::A | ShiftCode::B) => true,
        (ShiftCode::B, ShiftCode::A) => !allow_b_to_a,
        _ => false,
    }
}

/// Working grid; `None` marks a cell not yet decided.
struct Grid {
    cells: Vec<Vec<Option<ShiftCode>>>,
    allow_b_to_a: bool,
}

impl Grid {
    fn new(employees: usize, days: usize, allow_b_to_a: bool) -> Self {
        Self {
            cells: vec![vec![None; days]; employees],
            allow_b_to_a,
        }
    }

    fn get(&self, e: usize, d: usize) -> Option<ShiftCode> {
        self.cells[e].get(d).copied().flatten()
    }

    fn work_at(&self, e: usize, d: usize) -> Option<ShiftCode> {
        self.get(e, d).filter(|c| c.is_work())
    }

    /// Whether `shift` may go in (e, d) against its fixed neighbors.
    ///
    /// Rest and leave cells never take a shift.
    fn admissible(&self, e: usize, d: usize, shift: ShiftCode) -> bool {
        if matches!(self.get(e, d), Some(ShiftCode::Wo | ShiftCode::L)) {
            return false;
        }
        if d > 0 {
            if let Some(prev) = self.work_at(e, d - 1) {
                if is_forbidden_transition(prev, shift, self.allow_b_to_a) {
                    return false;
                }
            }
        }
        if let Some(next) = self.work_at(e, d + 1) {
            if is_forbidden_transition(shift, next, self.allow_b_to_a) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy)]
struct RunState {
    current: ShiftCode,
    streak: u32,
}

struct Heuristic<'a> {
    employees: &'a [Employee],
    config: &'a Config,
    attempt: &'a Attempt,
    work_shifts: &'static [ShiftCode],
    grid: Grid,
    state: Vec<RunState>,
}

/// Builds a roster for one attempt.
///
/// Fails only on unusable input: an empty horizon or continuity bounds
/// that no run can satisfy.
pub fn solve_heuristic(
    employees: &[Employee],
    horizon: &Horizon,
    config: &Config,
    attempt: &Attempt,
) -> Result<Roster> {
    if horizon.is_empty() {
        return Err(RosterError::InvalidHorizon {
            reason: "horizon has no days".to_string(),
        });
    }
    config.check()?;
    if attempt.min_days == 0 || attempt.max_days < attempt.min_days {
        return Err(RosterError::InvalidContinuity {
            min_days: attempt.min_days,
            max_days: attempt.max_days,
        });
    }

    let work_shifts = config.work_shifts();
    let allow_b_to_a = config.allow_b_to_a || attempt.allow_last_resort_transitions;
    let state = employees
        .iter()
        .enumerate()
        .map(|(e, emp)| RunState {
            current: emp
                .last_shift
                .filter(|s| work_shifts.contains(s))
                .unwrap_or(work_shifts[e % work_shifts.len()]),
            streak: emp.streak.unwrap_or(0),
        })
        .collect();

    let mut heuristic = Heuristic {
        employees,
        config,
        attempt,
        work_shifts,
        grid: Grid::new(employees.len(), horizon.len(), allow_b_to_a),
        state,
    };

    heuristic.place_rest_and_leave(horizon);
    for d in 0..horizon.len() {
        heuristic.fill_day(d);
    }
    let swaps = heuristic.repair_short_runs();
    let defaulted = heuristic.default_fill();

    debug!(
        attempt = attempt.id.as_str(),
        employees = employees.len(),
        days = horizon.len(),
        swaps,
        defaulted,
        "heuristic roster built"
    );

    Ok(heuristic.into_roster())
}

/// Rest days for one employee: one per consecutive 7-day block.
///
/// With `use_calendar`, a weekday preference picks the matching date in
/// each block. Otherwise the block offset is the preference index, or the
/// employee's ordinal mod 7; an offset past a short final block falls back
/// to the block's first day.
pub fn rest_days(
    horizon: &Horizon,
    ordinal: usize,
    preference: Option<RestPreference>,
    use_calendar: bool,
) -> Vec<usize> {
    let len = horizon.len();
    let calendar_weekday = match preference {
        Some(RestPreference::Weekday(w)) if use_calendar && horizon.is_calendar_resolvable() => Some(w),
        _ => None,
    };
    let offset = preference.map(RestPreference::index).unwrap_or(ordinal % REST_WINDOW);

    (0..len)
        .step_by(REST_WINDOW)
        .map(|start| {
            let end = (start + REST_WINDOW).min(len);
            let by_calendar = calendar_weekday
                .and_then(|w| (start..end).find(|&d| horizon.weekday(d) == Some(w)));
            by_calendar.unwrap_or_else(|| {
                let day = start + offset;
                if day < end {
                    day
                } else {
                    start
                }
            })
        })
        .collect()
}

impl<'a> Heuristic<'a> {
    fn place_rest_and_leave(&mut self, horizon: &Horizon) {
        let use_calendar = self.attempt.uses_calendar_rest_preference();
        for (e, emp) in self.employees.iter().enumerate() {
            for day in rest_days(horizon, e, emp.rest_preference, use_calendar) {
                self.grid.cells[e][day] = Some(ShiftCode::Wo);
            }
            // Leave wins over a rest day placed on the same date.
            for day in emp.leave.iter().filter(|&d| d < horizon.len()) {
                self.grid.cells[e][day] = Some(ShiftCode::L);
            }
        }
    }

    /// Matrix roles in sorted order, then unlisted roles by first appearance.
    fn roles(&self) -> Vec<&'a str> {
        let config: &'a Config = self.config;
        let employees: &'a [Employee] = self.employees;
        let mut roles: Vec<&'a str> = config.staffing_matrix.roles().collect();
        for emp in employees {
            if !roles.contains(&emp.role.as_str()) {
                roles.push(&emp.role);
            }
        }
        roles
    }

    fn penalty(&self, e: usize, d: usize, shift: ShiftCode) -> u32 {
        let RunState { current, streak } = self.state[e];
        let mut penalty = 0;
        if shift != current && streak < self.attempt.min_days {
            penalty += PENALTY_EARLY_SWITCH;
        }
        if shift == current && streak >= self.attempt.max_days {
            penalty += PENALTY_OVERLONG_RUN;
        }
        if shift != current {
            penalty += PENALTY_SHIFT_CHANGE;
        }
        if d == 0 && self.employees[e].last_shift.is_some_and(|last| last != shift) {
            penalty += PENALTY_SEED_DEVIATION;
        }
        penalty
    }

    fn fill_day(&mut self, d: usize) {
        let employees: &'a [Employee] = self.employees;
        let mut counts: HashMap<(&'a str, ShiftCode), u32> = HashMap::new();
        for (e, emp) in employees.iter().enumerate() {
            if let Some(shift) = self.grid.work_at(e, d) {
                *counts.entry((emp.role.as_str(), shift)).or_default() += 1;
            }
        }

        for role in self.roles() {
            let members: Vec<usize> = employees
                .iter()
                .enumerate()
                .filter(|(_, emp)| emp.role == role)
                .map(|(e, _)| e)
                .collect();

            for &shift in self.work_shifts {
                let have = counts.get(&(role, shift)).copied().unwrap_or(0);
                let need = self.config.staffing_matrix.min(role, shift).saturating_sub(have);
                if need == 0 {
                    continue;
                }
                let mut candidates: Vec<(usize, u32)> = members
                    .iter()
                    .copied()
                    .filter(|&e| self.grid.get(e, d).is_none() && self.grid.admissible(e, d, shift))
                    .map(|e| (e, self.penalty(e, d, shift)))
                    .collect();
                candidates.sort_by_key(|&(_, penalty)| penalty);
                for (e, _) in candidates.into_iter().take(need as usize) {
                    self.grid.cells[e][d] = Some(shift);
                    *counts.entry((role, shift)).or_default() += 1;
                }
            }

            for &e in &members {
                if self.grid.get(e, d).is_some() {
                    continue;
                }
                let choice = self
                    .work_shifts
                    .iter()
                    .copied()
                    .filter(|&s| self.grid.admissible(e, d, s))
                    .min_by_key(|&s| {
                        (
                            counts.get(&(role, s)).copied().unwrap_or(0),
                            self.penalty(e, d, s),
                        )
                    });
                match choice {
                    Some(shift) => {
                        self.grid.cells[e][d] = Some(shift);
                        *counts.entry((role, shift)).or_default() += 1;
                    }
                    None => debug!(employee = %self.employees[e].id, day = d, "no admissible shift"),
                }
            }
        }

        for e in 0..self.employees.len() {
            if let Some(today) = self.grid.work_at(e, d) {
                let state = &mut self.state[e];
                if today == state.current {
                    state.streak += 1;
                } else {
                    state.current = today;
                    state.streak = 1;
                }
            }
        }
    }

    /// One scan per employee; at most one swap attempt per short run found.
    fn repair_short_runs(&mut self) -> usize {
        let min_days = self.attempt.min_days as usize;
        let days = self.grid.cells.first().map_or(0, Vec::len);
        let mut swaps = 0;

        for e in 0..self.employees.len() {
            for d in 1..days {
                let (Some(prev), Some(cur)) = (self.grid.work_at(e, d - 1), self.grid.work_at(e, d)) else {
                    continue;
                };
                if prev == cur {
                    continue;
                }
                let run = (0..d)
                    .rev()
                    .take_while(|&k| self.grid.get(e, k) == Some(prev))
                    .count();
                if run < min_days && self.try_swap(e, d, prev) {
                    swaps += 1;
                }
            }
        }
        swaps
    }

    /// Trades (e, d) with the first same-role employee working `target` on `d`.
    fn try_swap(&mut self, e: usize, d: usize, target: ShiftCode) -> bool {
        let role = &self.employees[e].role;
        let Some(partner) = (0..self.employees.len())
            .find(|&p| p != e && self.employees[p].role == *role && self.grid.get(p, d) == Some(target))
        else {
            return false;
        };
        let Some(own) = self.grid.work_at(e, d) else {
            return false;
        };
        if !self.grid.admissible(e, d, target) || !self.grid.admissible(partner, d, own) {
            return false;
        }
        self.grid.cells[e][d] = Some(target);
        self.grid.cells[partner][d] = Some(own);
        true
    }

    fn default_fill(&mut self) -> usize {
        let mut filled = 0;
        for cell in self.grid.cells.iter_mut().flatten() {
            if cell.is_none() {
                *cell = Some(ShiftCode::Wo);
                filled += 1;
            }
        }
        filled
    }

    fn into_roster(self) -> Roster {
        let rows = self
            .employees
            .iter()
            .zip(self.grid.cells)
            .map(|(emp, cells)| EmployeeRow {
                employee_id: emp.id.clone(),
                role: emp.role.clone(),
                cells: cells.into_iter().map(|c| c.unwrap_or(ShiftCode::Wo)).collect(),
            })
            .collect();
        Roster::new(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Continuity, LeavePolicy, StaffingBound, StaffingMatrix};
    use crate::domain::ShiftMode;
    use crate::relaxation::build_attempts;
    use crate::validation::{validate, validate_with, HardViolationKind, RuleSet};
    use chrono::{NaiveDate, Weekday};

    fn horizon(len: usize) -> Horizon {
        Horizon::new((0..len).map(|d| format!("d{}", d)).collect()).unwrap()
    }

    fn two_operator_config() -> Config {
        Config::new(ShiftMode::ThreeShifts, Continuity::new(2, 4)).with_staffing(
            StaffingMatrix::new()
                .with_bound("Op", ShiftCode::A, StaffingBound::at_least(1))
                .with_bound("Op", ShiftCode::B, StaffingBound::at_least(1))
                .with_bound("Op", ShiftCode::C, StaffingBound::at_least(0)),
        )
    }

    #[test]
    fn test_two_employees_three_shifts_rest_and_transitions() {
        let config = two_operator_config();
        let employees = vec![Employee::new("e1", "Op"), Employee::new("e2", "Op")];
        let h = horizon(14);

        for attempt in build_attempts(&config) {
            let roster = solve_heuristic(&employees, &h, &config, &attempt).unwrap();
            for row in &roster.rows {
                assert_eq!(row.cells.len(), 14);
                for t in 0..=14 - 7 {
                    let rest = row.cells[t..t + 7].iter().filter(|&&c| c == ShiftCode::Wo).count();
                    assert_eq!(rest, 1, "{} window {}: {:?}", row.employee_id, t, row.cells);
                }
                for pair in row.cells.windows(2) {
                    assert!(
                        !(pair[0] == ShiftCode::C && matches!(pair[1], ShiftCode::A | ShiftCode::B)),
                        "C followed by {:?} for {}",
                        pair[1],
                        row.employee_id
                    );
                }
            }
            let report = validate(&roster, &h, &config);
            assert!(report
                .hard_violations
                .iter()
                .all(|v| !matches!(v.kind, HardViolationKind::CReset | HardViolationKind::WoCadence)));
        }
    }

    #[test]
    fn test_single_employee_full_run() {
        let config = Config::new(ShiftMode::TwoShifts, Continuity::new(7, 7)).with_staffing(
            StaffingMatrix::new().with_bound("Op", ShiftCode::A, StaffingBound::at_least(1)),
        );
        let employees = vec![Employee::new("solo", "Op")];
        let h = horizon(7);
        let attempts = build_attempts(&config);

        for attempt in &attempts {
            let roster = solve_heuristic(&employees, &h, &config, attempt).unwrap();
            let cells = &roster.rows[0].cells;
            // ordinal 0 rests on day 0, every other day is A
            assert_eq!(cells[0], ShiftCode::Wo);
            assert!(cells[1..].iter().all(|&c| c == ShiftCode::A), "{:?}", cells);
        }

        // A weekly rest day caps the run at 6, so the buffered bounds (6..=8)
        // are the ones with zero continuity findings.
        let buffered = &attempts[2];
        let roster = solve_heuristic(&employees, &h, &config, buffered).unwrap();
        let report = validate_with(&roster, &h, &config, &RuleSet::for_attempt(&config, buffered));
        assert!(report.hard_violations.iter().all(|v| !matches!(
            v.kind,
            HardViolationKind::MinContinuity | HardViolationKind::MaxContinuity
        )));

        let strict = validate(&roster, &h, &config);
        let short_runs = strict
            .hard_violations
            .iter()
            .filter(|v| v.kind == HardViolationKind::MinContinuity)
            .count();
        assert_eq!(short_runs, 1);
    }

    #[test]
    fn test_leave_overrides_rest_day() {
        let config = two_operator_config();
        // ordinal 3 places its positional rest day on day 3
        let employees: Vec<Employee> = (0..4)
            .map(|i| {
                let emp = Employee::new(format!("e{}", i), "Op");
                if i == 3 {
                    emp.with_leave([3])
                } else {
                    emp
                }
            })
            .collect();
        let h = horizon(7);
        let attempt = &build_attempts(&config)[0];
        let roster = solve_heuristic(&employees, &h, &config, attempt).unwrap();
        assert_eq!(roster.rows[3].cells[3], ShiftCode::L);
        assert!(!roster.rows[3].cells.contains(&ShiftCode::Wo));

        // Separate policy: the window has no WO, one cadence finding.
        let separate = validate(&roster, &h, &config);
        let cadence = |r: &crate::validation::ValidationReport| {
            r.hard_violations
                .iter()
                .filter(|v| v.employee_id == "e3" && v.kind == HardViolationKind::WoCadence)
                .count()
        };
        assert_eq!(cadence(&separate), 1);

        let counting = config.clone().with_leave_policy(LeavePolicy::CountsAsRest);
        assert_eq!(cadence(&validate(&roster, &h, &counting)), 0);
    }

    #[test]
    fn test_heuristic_is_deterministic() {
        let config = two_operator_config();
        let employees: Vec<Employee> = (0..6)
            .map(|i| Employee::new(format!("e{}", i), "Op").with_leave([i * 2]))
            .collect();
        let h = horizon(21);
        for attempt in build_attempts(&config) {
            let a = solve_heuristic(&employees, &h, &config, &attempt).unwrap();
            let b = solve_heuristic(&employees, &h, &config, &attempt).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_calendar_preference_only_on_strict() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(); // Monday
        let h = Horizon::from_start(start, 14).unwrap();
        let pref = Some(RestPreference::Weekday(Weekday::Wed));

        assert_eq!(rest_days(&h, 0, pref, true), vec![2, 9]);
        // positional: Wednesday is index 3 counted from Sunday
        assert_eq!(rest_days(&h, 0, pref, false), vec![3, 10]);
        assert_eq!(rest_days(&h, 9, None, false), vec![2, 9]);

        let opaque = horizon(14);
        assert_eq!(rest_days(&opaque, 0, pref, true), vec![3, 10]);
    }

    #[test]
    fn test_short_final_block_falls_back_to_first_day() {
        let h = horizon(10);
        assert_eq!(rest_days(&h, 5, None, false), vec![5, 7]);
        assert_eq!(rest_days(&h, 1, None, false), vec![1, 8]);
    }

    #[test]
    fn test_seed_shift_is_kept_on_day_zero() {
        let config = Config::new(ShiftMode::ThreeShifts, Continuity::new(3, 5));
        let employees = vec![Employee::new("e1", "Op")
            .with_seed(ShiftCode::B, 1)
            .with_rest_preference(RestPreference::Offset(6))];
        let h = horizon(7);
        let roster = solve_heuristic(&employees, &h, &config, &build_attempts(&config)[0]).unwrap();
        assert_eq!(roster.rows[0].cells[0], ShiftCode::B);
        assert_eq!(roster.rows[0].cells[6], ShiftCode::Wo);
    }

    #[test]
    fn test_unlisted_roles_are_still_assigned() {
        let config = two_operator_config();
        let employees = vec![Employee::new("e1", "Op"), Employee::new("x1", "Cleaner")];
        let h = horizon(7);
        let roster = solve_heuristic(&employees, &h, &config, &build_attempts(&config)[0]).unwrap();
        let worked = roster.rows[1].cells.iter().filter(|c| c.is_work()).count();
        assert_eq!(worked, 6);
    }

    #[test]
    fn test_swap_repairs_short_run() {
        let config = Config::new(ShiftMode::ThreeShifts, Continuity::new(2, 4));
        let employees = vec![Employee::new("e0", "Op"), Employee::new("e1", "Op")];
        let attempt = build_attempts(&config).remove(0);
        let mut heuristic = Heuristic {
            employees: &employees,
            config: &config,
            attempt: &attempt,
            work_shifts: config.work_shifts(),
            grid: Grid::new(2, 3, false),
            state: vec![RunState { current: ShiftCode::A, streak: 0 }; 2],
        };
        use crate::domain::ShiftCode::{A, B};
        heuristic.grid.cells = vec![vec![Some(A), Some(B), Some(B)], vec![Some(B), Some(A), Some(B)]];
        assert_eq!(heuristic.repair_short_runs(), 1);
        assert_eq!(heuristic.grid.cells[0], vec![Some(A), Some(A), Some(B)]);
        assert_eq!(heuristic.grid.cells[1], vec![Some(B), Some(B), Some(B)]);
    }

    #[test]
    fn test_swap_rejected_when_partner_would_break_transition() {
        let config = Config::new(ShiftMode::ThreeShifts, Continuity::new(2, 4));
        let employees = vec![Employee::new("e0", "Op"), Employee::new("e1", "Op")];
        let attempt = build_attempts(&config).remove(0);
        let mut heuristic = Heuristic {
            employees: &employees,
            config: &config,
            attempt: &attempt,
            work_shifts: config.work_shifts(),
            grid: Grid::new(2, 3, false),
            state: vec![RunState { current: ShiftCode::A, streak: 0 }; 2],
        };
        use crate::domain::ShiftCode::{A, B};
        // e1 taking B on day 1 would be followed by A: B→A is forbidden.
        heuristic.grid.cells = vec![vec![Some(A), Some(B), Some(B)], vec![Some(B), Some(A), Some(A)]];
        let before = heuristic.grid.cells.clone();
        heuristic.repair_short_runs();
        assert_eq!(heuristic.grid.cells, before);
    }
}
