//! Roster configuration and JSON loading.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::domain::{ShiftCode, ShiftMode};
use crate::error::{ConfigError, Result, RosterError};

/// Default optimizer time budget handed to the solver backend.
const DEFAULT_TIME_LIMIT_SECS: u64 = 5;

/// Default client-side wall-clock budget for one solver call.
const DEFAULT_WORKER_TIMEOUT_MS: u64 = 30_000;

/// Minimum and maximum consecutive days on the same working shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Continuity {
    pub min_days: u32,
    pub max_days: u32,
}

impl Continuity {
    pub fn new(min_days: u32, max_days: u32) -> Self {
        Self { min_days, max_days }
    }
}

/// Whether leave days count toward the weekly rest quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeavePolicy {
    #[serde(rename = "L_COUNTS_AS_WO")]
    CountsAsRest,
    #[default]
    #[serde(rename = "L_SEPARATE")]
    Separate,
}

/// Headcount bound for one role and shift. `max: None` is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffingBound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

impl StaffingBound {
    /// Stand-in for a shift the matrix lists no entry for.
    pub const ZERO: StaffingBound = StaffingBound {
        min: Some(0),
        max: Some(0),
    };

    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min: Some(min), max }
    }

    pub fn at_least(min: u32) -> Self {
        Self::new(min, None)
    }

    pub fn min_or_zero(&self) -> u32 {
        self.min.unwrap_or(0)
    }
}

/// Role → shift → headcount bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaffingMatrix {
    roles: BTreeMap<String, BTreeMap<ShiftCode, StaffingBound>>,
}

impl StaffingMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bound(mut self, role: impl Into<String>, shift: ShiftCode, bound: StaffingBound) -> Self {
        self.set(role, shift, bound);
        self
    }

    pub fn set(&mut self, role: impl Into<String>, shift: ShiftCode, bound: StaffingBound) {
        self.roles.entry(role.into()).or_default().insert(shift, bound);
    }

    /// Configured roles in sorted order.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    /// Bound for a role and shift.
    ///
    /// `None` when the role is not in the matrix. A listed role without an
    /// entry for `shift` reads as [`StaffingBound::ZERO`].
    pub fn bound(&self, role: &str, shift: ShiftCode) -> Option<StaffingBound> {
        self.roles
            .get(role)
            .map(|shifts| shifts.get(&shift).copied().unwrap_or(StaffingBound::ZERO))
    }

    /// Minimum headcount, 0 when unknown.
    pub fn min(&self, role: &str, shift: ShiftCode) -> u32 {
        self.roles
            .get(role)
            .and_then(|shifts| shifts.get(&shift))
            .map(StaffingBound::min_or_zero)
            .unwrap_or(0)
    }
}

/// Solver call budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverSettings {
    #[serde(default = "default_time_limit_sec")]
    pub time_limit_sec: u64,
    #[serde(default = "default_worker_timeout_ms")]
    pub worker_timeout_ms: u64,
}

fn default_time_limit_sec() -> u64 {
    DEFAULT_TIME_LIMIT_SECS
}

fn default_worker_timeout_ms() -> u64 {
    DEFAULT_WORKER_TIMEOUT_MS
}

impl SolverSettings {
    /// Client-side limit for one call; `workerTimeoutMs: 0` means no limit.
    pub fn worker_timeout(&self) -> Option<Duration> {
        (self.worker_timeout_ms > 0).then(|| Duration::from_millis(self.worker_timeout_ms))
    }
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_limit_sec: DEFAULT_TIME_LIMIT_SECS,
            worker_timeout_ms: DEFAULT_WORKER_TIMEOUT_MS,
        }
    }
}

/// Operational rules for one roster run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub shift_mode: ShiftMode,
    pub continuity: Continuity,
    /// Globally permits B followed by A on the next day.
    #[serde(default, rename = "allowBToA")]
    pub allow_b_to_a: bool,
    #[serde(default)]
    pub leave_policy: LeavePolicy,
    #[serde(default)]
    pub staffing_matrix: StaffingMatrix,
    #[serde(default)]
    pub solver: SolverSettings,
}

impl Config {
    pub fn new(shift_mode: ShiftMode, continuity: Continuity) -> Self {
        Self {
            shift_mode,
            continuity,
            allow_b_to_a: false,
            leave_policy: LeavePolicy::default(),
            staffing_matrix: StaffingMatrix::new(),
            solver: SolverSettings::default(),
        }
    }

    pub fn with_staffing(mut self, matrix: StaffingMatrix) -> Self {
        self.staffing_matrix = matrix;
        self
    }

    pub fn with_leave_policy(mut self, policy: LeavePolicy) -> Self {
        self.leave_policy = policy;
        self
    }

    pub fn work_shifts(&self) -> &'static [ShiftCode] {
        self.shift_mode.work_shifts()
    }

    pub fn leave_counts_as_rest(&self) -> bool {
        self.leave_policy == LeavePolicy::CountsAsRest
    }

    /// Rejects continuity bounds no roster could satisfy.
    pub fn check(&self) -> Result<()> {
        let Continuity { min_days, max_days } = self.continuity;
        if min_days == 0 || max_days < min_days {
            return Err(RosterError::InvalidContinuity { min_days, max_days });
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> std::result::Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}
