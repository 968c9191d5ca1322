//! Runs the relaxation ladder and picks the best draft.

use serde::Serialize;
use std::cmp::Ordering;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::Config;
use crate::domain::{Employee, Horizon, Roster};
use crate::error::Result;
use crate::heuristic::solve_heuristic;
use crate::model::{build_model, decode_solution};
use crate::relaxation::{build_attempts, Attempt};
use crate::report::{
    fallback_explanation, fallback_scores, Explainer, Explanation, ReportContext, RosterStats,
    RuleBasedExplainer, RuleBasedScorer, ScoreReport, Scorer,
};
use crate::solver::{SolveOptions, SolveResult, SolverClient, SolverEvent};
use crate::validation::{validate, validate_with, RuleSet, ValidationReport};

/// Which path produced a draft's roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftOrigin {
    Optimized,
    Heuristic,
}

/// Counts attached to a draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftStats {
    #[serde(flatten)]
    pub counts: RosterStats,
    /// Hard violations under the attempt's own relaxed rules.
    pub attempt_hard_violations: usize,
    pub attempt_staffing_violations: usize,
    /// Why the optimizer was not used, when it was not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver_message: Option<String>,
    pub elapsed_ms: u64,
}

/// One roster per attempt, with everything known about it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub attempt: Attempt,
    pub roster: Roster,
    pub origin: DraftOrigin,
    /// Violations against the configured, unrelaxed rules.
    pub violations: ValidationReport,
    pub scores: ScoreReport,
    pub stats: DraftStats,
    pub explanation: Explanation,
}

impl Draft {
    pub fn hard_count(&self) -> usize {
        self.violations.hard_count()
    }

    pub fn staffing_count(&self) -> usize {
        self.violations.staffing_count()
    }
}

/// Every draft in ladder order plus the index of the selected one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterOutcome {
    pub drafts: Vec<Draft>,
    pub best: usize,
}

impl RosterOutcome {
    pub fn best(&self) -> &Draft {
        &self.drafts[self.best]
    }
}

/// Progress notifications emitted while a roster is generated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Progress {
    AttemptStarted {
        index: usize,
        label: String,
    },
    Solver(SolverEvent),
    #[serde(rename_all = "camelCase")]
    AttemptFinished {
        index: usize,
        origin: DraftOrigin,
        hard: usize,
        staffing: usize,
    },
}

fn compare_drafts(a: &Draft, b: &Draft) -> Ordering {
    a.hard_count()
        .cmp(&b.hard_count())
        .then_with(|| a.staffing_count().cmp(&b.staffing_count()))
        .then_with(|| b.scores.satisfaction_score.total_cmp(&a.scores.satisfaction_score))
}

/// Index of the best draft.
///
/// Fewest hard violations, then fewest staffing violations, then highest
/// satisfaction; remaining ties go to the earliest attempt.
pub fn select_best(drafts: &[Draft]) -> Option<usize> {
    drafts
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| compare_drafts(a, b))
        .map(|(i, _)| i)
}

/// Roster generator: optional optimizer plus report generators.
pub struct RosterEngine {
    solver: Option<SolverClient>,
    scorer: Option<Box<dyn Scorer>>,
    explainer: Option<Box<dyn Explainer>>,
}

impl Default for RosterEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RosterEngine {
    /// Heuristic-only engine with the rule-based report generators.
    pub fn new() -> Self {
        Self {
            solver: None,
            scorer: Some(Box::new(RuleBasedScorer)),
            explainer: Some(Box::new(RuleBasedExplainer)),
        }
    }

    pub fn with_solver(mut self, client: SolverClient) -> Self {
        self.solver = Some(client);
        self
    }

    pub fn with_scorer(mut self, scorer: Option<Box<dyn Scorer>>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_explainer(mut self, explainer: Option<Box<dyn Explainer>>) -> Self {
        self.explainer = explainer;
        self
    }

    pub fn solver_name(&self) -> Option<&str> {
        self.solver.as_ref().map(SolverClient::backend_name)
    }

    /// [`generate_roster`](Self::generate_roster) without progress reporting.
    pub async fn generate(
        &self,
        employees: &[Employee],
        horizon: &Horizon,
        config: &Config,
    ) -> Result<RosterOutcome> {
        self.generate_roster(employees, horizon, config, |_| {}).await
    }

    /// Produces one draft per attempt and selects the best.
    ///
    /// Solver failures and missing report generators never fail the run;
    /// only invalid input does.
    pub async fn generate_roster<F>(
        &self,
        employees: &[Employee],
        horizon: &Horizon,
        config: &Config,
        mut on_progress: F,
    ) -> Result<RosterOutcome>
    where
        F: FnMut(Progress),
    {
        config.check()?;
        let attempts = build_attempts(config);
        let mut drafts = Vec::with_capacity(attempts.len());

        info!(
            employees = employees.len(),
            days = horizon.len(),
            solver = self.solver_name().unwrap_or("none"),
            "generating roster"
        );

        for attempt in attempts {
            on_progress(Progress::AttemptStarted {
                index: attempt.index,
                label: attempt.label.clone(),
            });

            let draft = self
                .run_attempt(employees, horizon, config, attempt, &mut on_progress)
                .await?;

            on_progress(Progress::AttemptFinished {
                index: draft.attempt.index,
                origin: draft.origin,
                hard: draft.hard_count(),
                staffing: draft.staffing_count(),
            });
            drafts.push(draft);
        }

        let best = select_best(&drafts).unwrap_or_default();
        if let Some(draft) = drafts.get(best) {
            info!(
                attempt = draft.attempt.id.as_str(),
                hard = draft.hard_count(),
                staffing = draft.staffing_count(),
                "selected best draft"
            );
        }
        Ok(RosterOutcome { drafts, best })
    }

    async fn run_attempt<F>(
        &self,
        employees: &[Employee],
        horizon: &Horizon,
        config: &Config,
        attempt: Attempt,
        on_progress: &mut F,
    ) -> Result<Draft>
    where
        F: FnMut(Progress),
    {
        let started = Instant::now();
        let model = build_model(employees, horizon, config, &attempt);
        debug!(
            attempt = attempt.id.as_str(),
            constraints = model.constraint_count,
            binaries = model.binary_count,
            penalties = model.penalty_count,
            "model built"
        );

        let result = self.call_solver(model.text.clone(), config, on_progress).await;

        let (roster, origin, solver_message) = match &result.solution {
            Some(solution) if result.is_success() => (
                decode_solution(&model, employees, solution),
                DraftOrigin::Optimized,
                None,
            ),
            _ => {
                let message = result
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("solver status {:?}", result.status));
                info!(
                    attempt = attempt.id.as_str(),
                    status = ?result.status,
                    reason = %message,
                    "falling back to heuristic"
                );
                let roster = solve_heuristic(employees, horizon, config, &attempt)?;
                (roster, DraftOrigin::Heuristic, Some(message))
            }
        };

        let violations = validate(&roster, horizon, config);
        let relaxed = validate_with(&roster, horizon, config, &RuleSet::for_attempt(config, &attempt));

        let ctx = ReportContext {
            roster: &roster,
            employees,
            horizon,
            config,
            validation: &violations,
        };
        let scores = self
            .scorer
            .as_ref()
            .and_then(|scorer| scorer.score(&ctx))
            .unwrap_or_else(|| {
                debug!(attempt = attempt.id.as_str(), "scorer gave no result, using fallback");
                fallback_scores(&violations)
            });
        let explanation = self
            .explainer
            .as_ref()
            .and_then(|explainer| explainer.explain(&ctx))
            .unwrap_or_else(|| {
                debug!(attempt = attempt.id.as_str(), "explainer gave no result, using fallback");
                fallback_explanation(&violations)
            });

        let stats = DraftStats {
            counts: RosterStats::collect(&roster, horizon),
            attempt_hard_violations: relaxed.hard_count(),
            attempt_staffing_violations: relaxed.staffing_count(),
            solver_message,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            attempt = attempt.id.as_str(),
            origin = ?origin,
            hard = violations.hard_count(),
            staffing = violations.staffing_count(),
            elapsed_ms = stats.elapsed_ms,
            "attempt finished"
        );

        Ok(Draft {
            attempt,
            roster,
            origin,
            violations,
            scores,
            stats,
            explanation,
        })
    }

    /// Submits a model, forwarding solver events while waiting.
    async fn call_solver<F>(&self, model: String, config: &Config, on_progress: &mut F) -> SolveResult
    where
        F: FnMut(Progress),
    {
        let Some(client) = &self.solver else {
            return SolveResult::no_solver("no solver configured");
        };
        let options = SolveOptions {
            time_limit_sec: config.solver.time_limit_sec,
        };
        let timeout = config.solver.worker_timeout();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let call = client.solve(model, options, timeout, Some(tx));
        tokio::pin!(call);

        let result = loop {
            tokio::select! {
                result = &mut call => break result,
                Some(event) = rx.recv() => on_progress(Progress::Solver(event)),
            }
        };
        while let Ok(event) = rx.try_recv() {
            on_progress(Progress::Solver(event));
        }
        result
    }
}
