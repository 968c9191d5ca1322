//! Demo workforces for trying the engine and the API.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{Config, Continuity, LeavePolicy, StaffingBound, StaffingMatrix};
use crate::domain::{Employee, Horizon, RestPreference, ShiftCode, ShiftMode};
use crate::error::{Result, RosterError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoData {
    Small,
    Large,
}

impl std::str::FromStr for DemoData {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SMALL" => Ok(DemoData::Small),
            "LARGE" => Ok(DemoData::Large),
            _ => Err(()),
        }
    }
}

/// Role name, headcount, and per-shift `(shift, min, max)` bounds.
type RoleStaffing = (&'static str, usize, &'static [(ShiftCode, u32, Option<u32>)]);

const SMALL_ROLES: &[RoleStaffing] = &[
    (
        "Operator",
        6,
        &[
            (ShiftCode::A, 2, Some(3)),
            (ShiftCode::B, 1, Some(2)),
            (ShiftCode::C, 1, Some(2)),
        ],
    ),
    (
        "Supervisor",
        2,
        &[
            (ShiftCode::A, 1, None),
            (ShiftCode::B, 0, Some(1)),
            (ShiftCode::C, 0, Some(1)),
        ],
    ),
];

const LARGE_ROLES: &[RoleStaffing] = &[
    (
        "Operator",
        18,
        &[
            (ShiftCode::A, 5, Some(7)),
            (ShiftCode::B, 4, Some(6)),
            (ShiftCode::C, 3, Some(5)),
        ],
    ),
    (
        "Supervisor",
        6,
        &[
            (ShiftCode::A, 1, Some(3)),
            (ShiftCode::B, 1, Some(2)),
            (ShiftCode::C, 1, Some(2)),
        ],
    ),
];

impl DemoData {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoData::Small => "SMALL",
            DemoData::Large => "LARGE",
        }
    }

    fn parameters(&self) -> DemoDataParameters {
        match self {
            DemoData::Small => DemoDataParameters {
                days_in_schedule: 14,
                roles: SMALL_ROLES,
                continuity: Continuity::new(2, 5),
                leave_policy: LeavePolicy::Separate,
                leave_count_distribution: vec![(0, 5.0), (1, 3.0), (2, 2.0)],
                rest_preference_probability: 0.3,
                seed_probability: 0.5,
            },
            DemoData::Large => DemoDataParameters {
                days_in_schedule: 28,
                roles: LARGE_ROLES,
                continuity: Continuity::new(3, 6),
                leave_policy: LeavePolicy::CountsAsRest,
                leave_count_distribution: vec![(0, 4.0), (2, 3.0), (4, 2.0), (6, 1.0)],
                rest_preference_probability: 0.4,
                seed_probability: 0.6,
            },
        }
    }
}

struct DemoDataParameters {
    days_in_schedule: usize,
    roles: &'static [RoleStaffing],
    continuity: Continuity,
    leave_policy: LeavePolicy,
    leave_count_distribution: Vec<(usize, f64)>,
    rest_preference_probability: f64,
    seed_probability: f64,
}

/// A ready-to-solve roster problem.
#[derive(Debug, Clone)]
pub struct DemoRoster {
    pub employees: Vec<Employee>,
    pub horizon: Horizon,
    pub config: Config,
}

/// List of available demo data sets.
pub fn list_demo_data() -> Vec<&'static str> {
    vec!["SMALL", "LARGE"]
}

/// Generates a demo roster problem for the given size.
pub fn generate(demo: DemoData) -> Result<DemoRoster> {
    let params = demo.parameters();
    let mut rng = StdRng::seed_from_u64(0);

    let reference = NaiveDate::from_ymd_opt(2024, 1, 1).ok_or_else(|| RosterError::InvalidHorizon {
        reason: "demo start date out of range".to_string(),
    })?;
    let horizon = Horizon::from_start(find_next_monday(reference), params.days_in_schedule)?;

    let mut matrix = StaffingMatrix::new();
    for (role, _, bounds) in params.roles {
        for &(shift, min, max) in *bounds {
            matrix.set(*role, shift, StaffingBound::new(min, max));
        }
    }
    let config = Config::new(ShiftMode::ThreeShifts, params.continuity)
        .with_staffing(matrix)
        .with_leave_policy(params.leave_policy);

    let name_permutations = generate_name_permutations(&mut rng);
    let work_shifts = config.work_shifts();
    let all_days: Vec<usize> = (0..params.days_in_schedule).collect();

    let mut employees = Vec::new();
    for (role, count, _) in params.roles {
        for _ in 0..*count {
            let name = name_permutations[employees.len() % name_permutations.len()].clone();
            let mut employee = Employee::new(name, *role);

            let leave_count = pick_count(&mut rng, &params.leave_count_distribution);
            let leave_days: Vec<usize> = all_days
                .choose_multiple(&mut rng, leave_count.min(all_days.len()))
                .copied()
                .collect();
            employee = employee.with_leave(leave_days);

            if rng.gen_bool(params.rest_preference_probability) {
                let weekday = WEEKDAYS[rng.gen_range(0..WEEKDAYS.len())];
                employee = employee.with_rest_preference(RestPreference::Weekday(weekday));
            }

            if rng.gen_bool(params.seed_probability) {
                if let Some(&shift) = work_shifts.choose(&mut rng) {
                    employee = employee.with_seed(shift, rng.gen_range(1..=3));
                }
            }

            employees.push(employee);
        }
    }

    Ok(DemoRoster {
        employees,
        horizon,
        config,
    })
}

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn find_next_monday(date: NaiveDate) -> NaiveDate {
    let days_until_monday = (7 - date.weekday().num_days_from_monday() as i64) % 7;
    date + Duration::days(days_until_monday)
}

/// Pick a count based on weighted distribution.
fn pick_count(rng: &mut StdRng, distribution: &[(usize, f64)]) -> usize {
    let total_weight: f64 = distribution.iter().map(|(_, w)| w).sum();
    let mut choice = rng.gen::<f64>() * total_weight;

    for (count, weight) in distribution {
        if choice < *weight {
            return *count;
        }
        choice -= weight;
    }
    distribution.last().map(|(c, _)| *c).unwrap_or(0)
}

const FIRST_NAMES: &[&str] = &[
    "Asha", "Bram", "Chen", "Dara", "Emil", "Farah", "Goran", "Hana", "Ines", "Jonas",
];
const LAST_NAMES: &[&str] = &[
    "Abbott", "Brandt", "Costa", "Dufour", "Eriksen", "Fischer", "Gupta", "Haas", "Ito", "Jovic",
];

fn generate_name_permutations(rng: &mut StdRng) -> Vec<String> {
    let mut names = Vec::with_capacity(FIRST_NAMES.len() * LAST_NAMES.len());
    for first in FIRST_NAMES {
        for last in LAST_NAMES {
            names.push(format!("{} {}", first, last));
        }
    }
    names.shuffle(rng);
    names
}
