//! The fixed four-step relaxation ladder.

use serde::Serialize;

use crate::config::Config;

/// Identifies a rung of the ladder, least relaxed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptId {
    Strict,
    #[serde(rename = "wo-plus-minus")]
    RestPlusMinus,
    ContinuityBuffer,
    LastResort,
}

impl AttemptId {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptId::Strict => "strict",
            AttemptId::RestPlusMinus => "wo-plus-minus",
            AttemptId::ContinuityBuffer => "continuity-buffer",
            AttemptId::LastResort => "last-resort",
        }
    }
}

/// One constraint profile derived from a [`Config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: AttemptId,
    /// Position in the ladder (0..4).
    pub index: usize,
    pub label: String,
    /// B→A permitted: penalized in the model, allowed by the heuristic.
    pub allow_last_resort_transitions: bool,
    /// Runs touching the horizon end may fall short of `min_days` at a penalty.
    pub allow_end_of_horizon_exception: bool,
    /// Weekly rest windows may hold between 0 and 2 rest days.
    pub rest_tolerance: bool,
    pub min_days: u32,
    pub max_days: u32,
}

impl Attempt {
    /// Only the strict attempt places rest days by calendar weekday.
    pub fn uses_calendar_rest_preference(&self) -> bool {
        self.id == AttemptId::Strict
    }
}

/// Builds the four attempts in ladder order.
///
/// The continuity buffer is `floor(0.2 * minDays)`.
///
/// ```
/// use shift_roster::config::{Config, Continuity};
/// use shift_roster::domain::ShiftMode;
/// use shift_roster::relaxation::build_attempts;
///
/// let config = Config::new(ShiftMode::ThreeShifts, Continuity::new(5, 7));
/// let attempts = build_attempts(&config);
/// assert_eq!(attempts.len(), 4);
/// assert_eq!((attempts[2].min_days, attempts[2].max_days), (4, 8));
/// ```
pub fn build_attempts(config: &Config) -> Vec<Attempt> {
    let min_days = config.continuity.min_days;
    let max_days = config.continuity.max_days;
    let buffer = min_days / 5;
    let buffered_min = min_days.saturating_sub(buffer).max(1);
    let buffered_max = max_days + buffer;

    vec![
        Attempt {
            id: AttemptId::Strict,
            index: 0,
            label: "Attempt 1/4 strict".to_string(),
            allow_last_resort_transitions: false,
            allow_end_of_horizon_exception: false,
            rest_tolerance: false,
            min_days,
            max_days,
        },
        Attempt {
            id: AttemptId::RestPlusMinus,
            index: 1,
            label: "Attempt 2/4 WO ±1".to_string(),
            allow_last_resort_transitions: false,
            allow_end_of_horizon_exception: false,
            rest_tolerance: true,
            min_days,
            max_days,
        },
        Attempt {
            id: AttemptId::ContinuityBuffer,
            index: 2,
            label: "Attempt 3/4 continuity buffer".to_string(),
            allow_last_resort_transitions: false,
            allow_end_of_horizon_exception: true,
            rest_tolerance: false,
            min_days: buffered_min,
            max_days: buffered_max,
        },
        Attempt {
            id: AttemptId::LastResort,
            index: 3,
            label: "Attempt 4/4 last resort transitions".to_string(),
            allow_last_resort_transitions: true,
            allow_end_of_horizon_exception: true,
            rest_tolerance: false,
            min_days: buffered_min,
            max_days: buffered_max,
        },
    ]
}
