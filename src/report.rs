//! Draft scoring and per-cell explanations.
//!
//! Scorers and explainers are replaceable. Either may decline by returning
//! `None`, in which case the engine substitutes [`fallback_scores`] or
//! [`fallback_explanation`].

use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::Config;
use crate::domain::{Employee, Horizon, Roster, ShiftCode};
use crate::validation::{StaffingViolationKind, ValidationReport};

/// Everything a report generator may look at.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub roster: &'a Roster,
    pub employees: &'a [Employee],
    pub horizon: &'a Horizon,
    pub config: &'a Config,
    pub validation: &'a ValidationReport,
}

/// Percent-style quality scores, each in 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub rules_compliance: f64,
    pub config_compliance: f64,
    pub satisfaction_score: f64,
    pub fairness_score: f64,
}

/// Why one cell holds its code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayReason {
    pub day_key: String,
    pub shift: ShiftCode,
    pub tags: Vec<String>,
}

/// Per-employee, per-day reasons plus the violations they refer to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub reasons: BTreeMap<String, Vec<DayReason>>,
    #[serde(flatten)]
    pub violations: ValidationReport,
}

pub trait Scorer: Send + Sync {
    fn score(&self, ctx: &ReportContext<'_>) -> Option<ScoreReport>;
}

pub trait Explainer: Send + Sync {
    fn explain(&self, ctx: &ReportContext<'_>) -> Option<Explanation>;
}

/// Code counts across a roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStats {
    pub per_employee: BTreeMap<String, BTreeMap<ShiftCode, u32>>,
    pub per_day: Vec<BTreeMap<ShiftCode, u32>>,
    pub per_role: BTreeMap<String, BTreeMap<ShiftCode, u32>>,
}

impl RosterStats {
    pub fn collect(roster: &Roster, horizon: &Horizon) -> Self {
        let mut stats = Self {
            per_day: vec![BTreeMap::new(); horizon.len()],
            ..Self::default()
        };
        for row in &roster.rows {
            let by_employee = stats.per_employee.entry(row.employee_id.clone()).or_default();
            for &code in &row.cells {
                *by_employee.entry(code).or_default() += 1;
            }
            let by_role = stats.per_role.entry(row.role.clone()).or_default();
            for &code in &row.cells {
                *by_role.entry(code).or_default() += 1;
            }
            for (day, &code) in row.cells.iter().enumerate().take(horizon.len()) {
                *stats.per_day[day].entry(code).or_default() += 1;
            }
        }
        stats
    }

    pub fn employee_count(&self, employee_id: &str, code: ShiftCode) -> u32 {
        self.per_employee
            .get(employee_id)
            .and_then(|counts| counts.get(&code))
            .copied()
            .unwrap_or(0)
    }
}

fn one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Linear penalties on violation counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedScorer;

impl Scorer for RuleBasedScorer {
    fn score(&self, ctx: &ReportContext<'_>) -> Option<ScoreReport> {
        let hard = ctx.validation.hard_count() as f64;
        let staffing = ctx.validation.staffing_count() as f64;

        let rules = (100.0 - 2.0 * hard).max(0.0);
        let config = (100.0 - 1.5 * staffing).max(0.0);
        let satisfaction = (100.0 - 5.0 * hard).max(0.0);
        let fairness = (100.0 - (rules - config).abs()).max(0.0);

        Some(ScoreReport {
            rules_compliance: one_decimal(rules),
            config_compliance: one_decimal(config),
            satisfaction_score: one_decimal(satisfaction),
            fairness_score: one_decimal(fairness),
        })
    }
}

/// Tags every cell from its code and the violations touching it.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedExplainer;

impl Explainer for RuleBasedExplainer {
    fn explain(&self, ctx: &ReportContext<'_>) -> Option<Explanation> {
        let validation = ctx.validation;
        let mut reasons = BTreeMap::new();

        for row in &ctx.roster.rows {
            let days = row
                .cells
                .iter()
                .enumerate()
                .map(|(day, &shift)| {
                    let mut tags = Vec::new();
                    match shift {
                        ShiftCode::Wo => tags.push("WO cadence enforcement".to_string()),
                        ShiftCode::L => tags.push("Leave lock".to_string()),
                        _ => {}
                    }
                    let short_staffed = validation.staffing_violations.iter().any(|v| {
                        v.day == day
                            && v.role == row.role
                            && v.shift == shift
                            && v.kind == StaffingViolationKind::BelowMin
                    });
                    if short_staffed {
                        tags.push(format!("Staffing requirement for role {} shift {}", row.role, shift));
                    }
                    if let Some(violation) = validation.hard_at(&row.employee_id, day) {
                        tags.push(violation.explanation.clone());
                    }
                    if tags.is_empty() {
                        tags.push("Fair distribution adjustment".to_string());
                    }
                    DayReason {
                        day_key: ctx.horizon.day_key(day).unwrap_or_default().to_string(),
                        shift,
                        tags,
                    }
                })
                .collect();
            reasons.insert(row.employee_id.clone(), days);
        }

        Some(Explanation {
            reasons,
            violations: validation.clone(),
        })
    }
}

/// Scores derived from violation counts alone.
///
/// ```
/// use shift_roster::report::fallback_scores;
/// use shift_roster::validation::ValidationReport;
///
/// let scores = fallback_scores(&ValidationReport::default());
/// assert_eq!(scores.rules_compliance, 100.0);
/// ```
pub fn fallback_scores(validation: &ValidationReport) -> ScoreReport {
    let penalty = 5.0 * validation.hard_count() as f64 + validation.staffing_count() as f64;
    let value = (100.0 - penalty).max(0.0);
    ScoreReport {
        rules_compliance: value,
        config_compliance: value,
        satisfaction_score: value,
        fairness_score: value,
    }
}

/// No reasons, only the violations.
pub fn fallback_explanation(validation: &ValidationReport) -> Explanation {
    Explanation {
        reasons: BTreeMap::new(),
        violations: validation.clone(),
    }
}
