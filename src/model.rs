//! Encodes a roster attempt as a binary linear program in LP text format.
//!
//! Columns:
//! - `x_<key>_<day>_<code>`: employee works `code` on `day`
//! - `start_<key>_<day>_<shift>`: a run of `shift` starts on `day`
//! - `pen_BA_<key>_<day>` / `pen_short_<key>_<day>_<shift>`: penalties,
//!   present only on attempts that soften a rule
//!
//! Output is deterministic: employees in input order, days in horizon
//! order, codes in alphabet order, roles in sorted order.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::config::Config;
use crate::domain::{Employee, EmployeeRow, Horizon, Roster, ShiftCode};
use crate::relaxation::Attempt;
use crate::solver::Solution;

/// Objective weight of a permitted B→A transition.
pub const TRANSITION_PENALTY_WEIGHT: u32 = 100;

/// Objective weight of a run cut short by the horizon end.
pub const SHORTFALL_PENALTY_WEIGHT: u32 = 50;

/// Length of a weekly rest window in days.
pub const REST_WINDOW: usize = 7;

/// Most working days allowed in one rest window.
const MAX_WORK_DAYS_PER_WINDOW: usize = 6;

/// Replaces every character outside `[A-Za-z0-9_]` with `_`.
///
/// ```
/// use shift_roster::model::sanitize_id;
///
/// assert_eq!(sanitize_id("emp-7.b"), "emp_7_b");
/// assert_eq!(sanitize_id("E_01"), "E_01");
/// ```
pub fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Column keys for employees, unique per model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnIndex {
    keys: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl ColumnIndex {
    /// Sanitizes every id. A later collision gets `_<n>` appended, with `n`
    /// counting up from its ordinal until the key is free.
    pub fn new(employees: &[Employee]) -> Self {
        let mut keys = Vec::with_capacity(employees.len());
        let mut lookup = HashMap::with_capacity(employees.len());
        for (ordinal, employee) in employees.iter().enumerate() {
            let base = sanitize_id(&employee.id);
            let mut key = base.clone();
            let mut suffix = ordinal;
            while lookup.contains_key(&key) {
                key = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            lookup.insert(key.clone(), ordinal);
            keys.push(key);
        }
        Self { keys, lookup }
    }

    pub fn key(&self, employee: usize) -> &str {
        &self.keys[employee]
    }

    pub fn employee(&self, key: &str) -> Option<usize> {
        self.lookup.get(key).copied()
    }
}

/// An encoded optimization model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    /// LP text: `Minimize`, `Subject To`, `Binary`, `End` sections.
    pub text: String,
    pub work_shifts: Vec<ShiftCode>,
    pub columns: ColumnIndex,
    pub horizon_len: usize,
    pub constraint_count: usize,
    pub binary_count: usize,
    pub penalty_count: usize,
}

fn x(key: &str, day: usize, code: ShiftCode) -> String {
    format!("x_{}_{}_{}", key, day, code)
}

fn start(key: &str, day: usize, shift: ShiftCode) -> String {
    format!("start_{}_{}_{}", key, day, shift)
}

#[derive(Default)]
struct LpBuilder {
    objective: Vec<String>,
    constraints: Vec<String>,
    binaries: Vec<String>,
    penalties: usize,
}

impl LpBuilder {
    fn constrain(&mut self, constraint: String) {
        self.constraints.push(constraint);
    }

    fn binary(&mut self, name: String) {
        self.binaries.push(name);
    }

    /// Registers a non-negative penalty column with its objective weight.
    fn penalty(&mut self, name: &str, weight: u32) {
        self.objective.push(format!("{} {}", weight, name));
        self.constraints.push(format!("{} >= 0", name));
        self.penalties += 1;
    }

    fn finish(self) -> (String, usize, usize, usize) {
        let mut text = String::new();
        text.push_str("Minimize\n");
        if self.objective.is_empty() {
            text.push_str(" obj: 0\n");
        } else {
            let _ = writeln!(text, " obj: {}", self.objective.join(" + "));
        }
        text.push_str("Subject To\n");
        for (i, c) in self.constraints.iter().enumerate() {
            let _ = writeln!(text, " c{}: {}", i + 1, c);
        }
        text.push_str("Binary\n");
        for b in &self.binaries {
            let _ = writeln!(text, " {}", b);
        }
        text.push_str("End");
        (text, self.constraints.len(), self.binaries.len(), self.penalties)
    }
}

/// Builds the model for one attempt.
pub fn build_model(
    employees: &[Employee],
    horizon: &Horizon,
    config: &Config,
    attempt: &Attempt,
) -> Model {
    let work_shifts = config.work_shifts();
    let alphabet = config.shift_mode.alphabet();
    let columns = ColumnIndex::new(employees);
    let horizon_len = horizon.len();
    let mut lp = LpBuilder::default();

    for (e, _) in employees.iter().enumerate() {
        let key = columns.key(e);
        for d in 0..horizon_len {
            for &code in alphabet {
                lp.binary(x(key, d, code));
            }
        }
    }

    // One code per cell.
    for (e, _) in employees.iter().enumerate() {
        let key = columns.key(e);
        for d in 0..horizon_len {
            let terms: Vec<String> = alphabet.iter().map(|&c| x(key, d, c)).collect();
            lp.constrain(format!("{} = 1", terms.join(" + ")));
        }
    }

    // Staffing bounds per day, shift and role.
    for d in 0..horizon_len {
        for &shift in work_shifts {
            for role in config.staffing_matrix.roles() {
                let members: Vec<usize> = employees
                    .iter()
                    .enumerate()
                    .filter(|(_, emp)| emp.role == role)
                    .map(|(e, _)| e)
                    .collect();
                if members.is_empty() {
                    continue;
                }
                let Some(bound) = config.staffing_matrix.bound(role, shift) else {
                    continue;
                };
                let expr = members
                    .iter()
                    .map(|&e| x(columns.key(e), d, shift))
                    .collect::<Vec<_>>()
                    .join(" + ");
                if let Some(min) = bound.min {
                    lp.constrain(format!("{} >= {}", expr, min));
                }
                if let Some(max) = bound.max {
                    lp.constrain(format!("{} <= {}", expr, max));
                }
            }
        }
    }

    // Leave lock.
    for (e, emp) in employees.iter().enumerate() {
        let key = columns.key(e);
        for d in emp.leave.iter().filter(|&d| d < horizon_len) {
            for &code in alphabet {
                let value = if code == ShiftCode::L { 1 } else { 0 };
                lp.constrain(format!("{} = {}", x(key, d, code), value));
            }
        }
    }

    // Weekly rest cadence over every 7-day sliding window.
    if horizon_len >= REST_WINDOW {
        for (e, _) in employees.iter().enumerate() {
            let key = columns.key(e);
            for t in 0..=horizon_len - REST_WINDOW {
                let window = t..t + REST_WINDOW;
                let mut rest: Vec<String> = window.clone().map(|d| x(key, d, ShiftCode::Wo)).collect();
                if config.leave_counts_as_rest() {
                    rest.extend(window.clone().map(|d| x(key, d, ShiftCode::L)));
                }
                if attempt.rest_tolerance {
                    lp.constrain(format!("{} <= 2", rest.join(" + ")));
                } else {
                    lp.constrain(format!("{} = 1", rest.join(" + ")));
                }
                let work: Vec<String> = window
                    .flat_map(|d| work_shifts.iter().map(move |&s| x(key, d, s)))
                    .collect();
                lp.constrain(format!("{} <= {}", work.join(" + "), MAX_WORK_DAYS_PER_WINDOW));
            }
        }
    }

    // Transition legality.
    let has_c = work_shifts.contains(&ShiftCode::C);
    for (e, _) in employees.iter().enumerate() {
        let key = columns.key(e);
        for d in 0..horizon_len.saturating_sub(1) {
            if has_c {
                let c = x(key, d, ShiftCode::C);
                lp.constrain(format!("{} + {} <= 1", c, x(key, d + 1, ShiftCode::A)));
                lp.constrain(format!("{} + {} <= 1", c, x(key, d + 1, ShiftCode::B)));
            }
            let b = x(key, d, ShiftCode::B);
            let a = x(key, d + 1, ShiftCode::A);
            if attempt.allow_last_resort_transitions || config.allow_b_to_a {
                if attempt.allow_last_resort_transitions && !config.allow_b_to_a {
                    let pen = format!("pen_BA_{}_{}", key, d);
                    lp.penalty(&pen, TRANSITION_PENALTY_WEIGHT);
                    lp.constrain(format!("{} - {} - {} >= -1", pen, b, a));
                }
            } else {
                lp.constrain(format!("{} + {} <= 1", b, a));
            }
        }
    }

    // Continuity: minimum run via run-start columns, maximum via sliding caps.
    let min_days = attempt.min_days as usize;
    let max_days = attempt.max_days as usize;
    for (e, _) in employees.iter().enumerate() {
        let key = columns.key(e);
        for &shift in work_shifts {
            for d in 0..horizon_len {
                let s = start(key, d, shift);
                lp.binary(s.clone());
                if d == 0 {
                    lp.constrain(format!("{} - {} = 0", s, x(key, d, shift)));
                } else {
                    lp.constrain(format!(
                        "{} - {} + {} >= 0",
                        s,
                        x(key, d, shift),
                        x(key, d - 1, shift)
                    ));
                }

                if min_days <= 1 {
                    continue;
                }
                if d + min_days <= horizon_len {
                    let run: Vec<String> = (d..d + min_days).map(|k| x(key, k, shift)).collect();
                    lp.constrain(format!("{} - {} {} >= 0", run.join(" + "), min_days, s));
                } else {
                    let remaining = horizon_len - d;
                    let run: Vec<String> = (d..horizon_len).map(|k| x(key, k, shift)).collect();
                    if attempt.allow_end_of_horizon_exception {
                        let pen = format!("pen_short_{}_{}_{}", key, d, shift);
                        lp.penalty(&pen, SHORTFALL_PENALTY_WEIGHT);
                        lp.constrain(format!(
                            "{} - {} {} + {} >= 0",
                            run.join(" + "),
                            remaining,
                            s,
                            pen
                        ));
                    } else {
                        // Fewer than min_days remain: a run may not start here.
                        lp.constrain(format!("{} - {} {} >= 0", run.join(" + "), min_days, s));
                    }
                }
            }

            if horizon_len > max_days {
                for t in 0..=horizon_len - (max_days + 1) {
                    let window: Vec<String> =
                        (t..=t + max_days).map(|k| x(key, k, shift)).collect();
                    lp.constrain(format!("{} <= {}", window.join(" + "), max_days));
                }
            }
        }
    }

    let (text, constraint_count, binary_count, penalty_count) = lp.finish();
    Model {
        text,
        work_shifts: work_shifts.to_vec(),
        columns,
        horizon_len,
        constraint_count,
        binary_count,
        penalty_count,
    }
}

/// Parses an assignment column name into (key, day, code).
///
/// Splits from the right, so keys may contain `_`.
///
/// ```
/// use shift_roster::domain::ShiftCode;
/// use shift_roster::model::parse_assignment_column;
///
/// assert_eq!(
///     parse_assignment_column("x_emp_7_12_WO"),
///     Some(("emp_7", 12, ShiftCode::Wo))
/// );
/// assert_eq!(parse_assignment_column("start_e1_0_A"), None);
/// ```
pub fn parse_assignment_column(name: &str) -> Option<(&str, usize, ShiftCode)> {
    let rest = name.strip_prefix("x_")?;
    let mut parts = rest.rsplitn(3, '_');
    let code = ShiftCode::parse(parts.next()?)?;
    let day = parts.next()?.parse().ok()?;
    let key = parts.next()?;
    Some((key, day, code))
}

/// Rebuilds a roster from selected assignment columns.
///
/// A column is selected when its value is at least 0.5. Cells with no
/// selected column become WO.
pub fn decode_solution(model: &Model, employees: &[Employee], solution: &Solution) -> Roster {
    let mut cells = vec![vec![None; model.horizon_len]; employees.len()];

    for (name, value) in solution.col_name.iter().zip(&solution.col_value) {
        if *value < 0.5 {
            continue;
        }
        let Some((key, day, code)) = parse_assignment_column(name) else {
            continue;
        };
        let Some(e) = model.columns.employee(key) else {
            continue;
        };
        if day < model.horizon_len {
            cells[e][day] = Some(code);
        }
    }

    let rows = employees
        .iter()
        .zip(cells)
        .map(|(emp, row)| EmployeeRow {
            employee_id: emp.id.clone(),
            role: emp.role.clone(),
            cells: row.into_iter().map(|c| c.unwrap_or(ShiftCode::Wo)).collect(),
        })
        .collect();
    Roster::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Continuity, LeavePolicy, StaffingBound, StaffingMatrix};
    use crate::domain::ShiftMode;
    use crate::relaxation::build_attempts;

    fn horizon(len: usize) -> Horizon {
        Horizon::new((0..len).map(|d| format!("d{}", d)).collect()).unwrap()
    }

    fn config() -> Config {
        Config::new(ShiftMode::ThreeShifts, Continuity::new(2, 4)).with_staffing(
            StaffingMatrix::new()
                .with_bound("Op", ShiftCode::A, StaffingBound::at_least(1))
                .with_bound("Op", ShiftCode::B, StaffingBound::new(1, Some(2)))
                .with_bound("Op", ShiftCode::C, StaffingBound::at_least(0)),
        )
    }

    fn employees() -> Vec<Employee> {
        vec![Employee::new("e-1", "Op").with_leave([3]), Employee::new("e 2", "Op")]
    }

    fn constraints(model: &Model) -> Vec<&str> {
        model
            .text
            .lines()
            .filter_map(|l| l.trim().split_once(": ").map(|(_, c)| c))
            .filter(|l| !l.is_empty())
            .collect()
    }

    #[test]
    fn test_model_is_deterministic() {
        let attempts = build_attempts(&config());
        for attempt in &attempts {
            let a = build_model(&employees(), &horizon(14), &config(), attempt);
            let b = build_model(&employees(), &horizon(14), &config(), attempt);
            assert_eq!(a.text, b.text);
        }
    }

    #[test]
    fn test_sections_and_numbering() {
        let attempts = build_attempts(&config());
        let model = build_model(&employees(), &horizon(7), &config(), &attempts[0]);
        let lines: Vec<&str> = model.text.lines().collect();
        assert_eq!(lines[0], "Minimize");
        assert_eq!(lines[1], " obj: 0");
        assert_eq!(lines[2], "Subject To");
        assert!(lines[3].starts_with(" c1: "));
        assert_eq!(*lines.last().unwrap(), "End");
        assert!(model.text.contains(&format!(" c{}: ", model.constraint_count)));
        assert!(!model.text.contains(&format!(" c{}: ", model.constraint_count + 1)));
        // 2 employees x 7 days x 5 codes + 2 x 3 shifts x 7 run starts
        assert_eq!(model.binary_count, 70 + 42);
        assert_eq!(model.penalty_count, 0);
    }

    #[test]
    fn test_assignment_staffing_and_leave_rows() {
        let attempts = build_attempts(&config());
        let model = build_model(&employees(), &horizon(7), &config(), &attempts[0]);
        let rows = constraints(&model);
        assert!(rows.contains(&"x_e_1_0_A + x_e_1_0_B + x_e_1_0_C + x_e_1_0_WO + x_e_1_0_L = 1"));
        assert!(rows.contains(&"x_e_1_2_A + x_e_2_2_A >= 1"));
        assert!(rows.contains(&"x_e_1_2_B + x_e_2_2_B <= 2"));
        assert!(rows.contains(&"x_e_1_3_L = 1"));
        assert!(rows.contains(&"x_e_1_3_A = 0"));
        assert!(!rows.contains(&"x_e_2_3_L = 1"));
    }

    #[test]
    fn test_rest_windows_follow_policy_and_tolerance() {
        let attempts = build_attempts(&config());
        let h = horizon(8);
        let strict = build_model(&employees(), &h, &config(), &attempts[0]);
        let rows = constraints(&strict);
        let wo: Vec<String> = (1..8).map(|d| format!("x_e_2_{}_WO", d)).collect();
        assert!(rows.contains(&format!("{} = 1", wo.join(" + ")).as_str()));

        let tolerant = build_model(&employees(), &h, &config(), &attempts[1]);
        assert!(constraints(&tolerant).contains(&format!("{} <= 2", wo.join(" + ")).as_str()));

        let leave_cfg = config().with_leave_policy(LeavePolicy::CountsAsRest);
        let with_leave = build_model(&employees(), &h, &leave_cfg, &attempts[0]);
        let l: Vec<String> = (0..7).map(|d| format!("x_e_2_{}_L", d)).collect();
        let wo0: Vec<String> = (0..7).map(|d| format!("x_e_2_{}_WO", d)).collect();
        let expected = format!("{} + {} = 1", wo0.join(" + "), l.join(" + "));
        assert!(constraints(&with_leave).contains(&expected.as_str()));
    }

    #[test]
    fn test_transitions_hard_then_penalized() {
        let attempts = build_attempts(&config());
        let h = horizon(7);
        let strict = build_model(&employees(), &h, &config(), &attempts[0]);
        let rows = constraints(&strict);
        assert!(rows.contains(&"x_e_1_0_C + x_e_1_1_A <= 1"));
        assert!(rows.contains(&"x_e_1_0_C + x_e_1_1_B <= 1"));
        assert!(rows.contains(&"x_e_1_0_B + x_e_1_1_A <= 1"));

        let last = build_model(&employees(), &h, &config(), &attempts[3]);
        let rows = constraints(&last);
        assert!(!rows.contains(&"x_e_1_0_B + x_e_1_1_A <= 1"));
        assert!(rows.contains(&"x_e_1_0_C + x_e_1_1_A <= 1"));
        assert!(rows.contains(&"pen_BA_e_1_0 - x_e_1_0_B - x_e_1_1_A >= -1"));
        assert!(last.text.contains("100 pen_BA_e_1_0"));
    }

    #[test]
    fn test_continuity_rows() {
        let attempts = build_attempts(&config());
        let h = horizon(7);
        let strict = build_model(&employees(), &h, &config(), &attempts[0]);
        let rows = constraints(&strict);
        assert!(rows.contains(&"start_e_1_0_A - x_e_1_0_A = 0"));
        assert!(rows.contains(&"start_e_1_1_A - x_e_1_1_A + x_e_1_0_A >= 0"));
        assert!(rows.contains(&"x_e_1_1_A + x_e_1_2_A - 2 start_e_1_1_A >= 0"));
        // last day cannot open a run on the strict attempt
        assert!(rows.contains(&"x_e_1_6_A - 2 start_e_1_6_A >= 0"));
        assert!(rows.contains(&"x_e_1_0_A + x_e_1_1_A + x_e_1_2_A + x_e_1_3_A + x_e_1_4_A <= 4"));

        let buffered = build_model(&employees(), &h, &config(), &attempts[2]);
        let rows = constraints(&buffered);
        assert!(rows.contains(&"x_e_1_6_A - 1 start_e_1_6_A + pen_short_e_1_6_A >= 0"));
        assert!(buffered.text.contains("50 pen_short_e_1_6_A"));
        assert!(buffered.penalty_count > 0);
    }

    #[test]
    fn test_column_index_disambiguates_collisions() {
        let employees = vec![Employee::new("a-b", "Op"), Employee::new("a.b", "Op")];
        let columns = ColumnIndex::new(&employees);
        assert_eq!(columns.key(0), "a_b");
        assert_eq!(columns.key(1), "a_b_1");
        assert_eq!(columns.employee("a_b_1"), Some(1));
    }

    #[test]
    fn test_column_index_skips_keys_already_taken() {
        let employees = vec![
            Employee::new("a_b", "Op"),
            Employee::new("a_b_2", "Op"),
            Employee::new("a-b", "Op"),
        ];
        let columns = ColumnIndex::new(&employees);
        assert_eq!(columns.key(0), "a_b");
        assert_eq!(columns.key(1), "a_b_2");
        assert_eq!(columns.key(2), "a_b_3");
        assert_eq!(columns.employee("a_b_2"), Some(1));
        assert_eq!(columns.employee("a_b_3"), Some(2));

        let attempts = build_attempts(&config());
        let model = build_model(&employees, &horizon(1), &config(), &attempts[0]);
        let solution = Solution {
            col_name: vec!["x_a_b_0_B".into(), "x_a_b_2_0_A".into(), "x_a_b_3_0_C".into()],
            col_value: vec![1.0, 1.0, 1.0],
        };
        let roster = decode_solution(&model, &employees, &solution);
        assert_eq!(roster.rows[0].cells, vec![ShiftCode::B]);
        assert_eq!(roster.rows[1].cells, vec![ShiftCode::A]);
        assert_eq!(roster.rows[2].cells, vec![ShiftCode::C]);
    }

    #[test]
    fn test_decode_solution() {
        let employees = employees();
        let attempts = build_attempts(&config());
        let model = build_model(&employees, &horizon(3), &config(), &attempts[0]);
        let solution = Solution {
            col_name: vec![
                "x_e_1_0_A".into(),
                "x_e_1_1_B".into(),
                "x_e_1_2_C".into(),
                "x_e_2_0_B".into(),
                "x_e_2_1_A".into(),
                "start_e_2_0_B".into(),
                "x_unknown_0_A".into(),
            ],
            col_value: vec![1.0, 0.99, 0.2, 1.0, 0.5, 1.0, 1.0],
        };
        let roster = decode_solution(&model, &employees, &solution);
        assert_eq!(roster.rows[0].cells, vec![ShiftCode::A, ShiftCode::B, ShiftCode::Wo]);
        assert_eq!(roster.rows[1].cells, vec![ShiftCode::B, ShiftCode::A, ShiftCode::Wo]);
        assert_eq!(roster.rows[1].employee_id, "e 2");
    }
}
