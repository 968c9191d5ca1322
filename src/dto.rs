//! DTOs for REST API requests/responses.
//!
//! Leave and rest preferences arrive in loose shapes and are normalized
//! here, once, into [`LeaveCalendar`] and [`RestPreference`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::demo_data::DemoRoster;
use crate::domain::{Employee, EmployeeRow, Horizon, LeaveCalendar, RestPreference, Roster, ShiftCode};
use crate::engine::{Progress, RosterOutcome};
use crate::error::Result;
use crate::report::ScoreReport;
use crate::validation::ValidationReport;

/// A leave day given either by day key or by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LeaveEntry {
    Index(usize),
    Key(String),
}

/// A rest preference given as a weekday name or a number (0 = Sunday).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RestPreferenceDto {
    Number(i64),
    Name(String),
}

impl RestPreferenceDto {
    fn normalize(&self) -> Option<RestPreference> {
        match self {
            RestPreferenceDto::Number(n) => Some(RestPreference::from_number(*n)),
            RestPreferenceDto::Name(name) => RestPreference::parse(name),
        }
    }
}

impl From<RestPreference> for RestPreferenceDto {
    fn from(preference: RestPreference) -> Self {
        match preference {
            RestPreference::Weekday(w) => RestPreferenceDto::Name(w.to_string()),
            RestPreference::Offset(n) => RestPreferenceDto::Number(n as i64),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDto {
    pub id: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_shift: Option<ShiftCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak: Option<u32>,
    #[serde(default)]
    pub leave: Vec<LeaveEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_preference: Option<RestPreferenceDto>,
}

impl EmployeeDto {
    pub fn from_employee(employee: &Employee, horizon: &Horizon) -> Self {
        Self {
            id: employee.id.clone(),
            role: employee.role.clone(),
            last_shift: employee.last_shift,
            streak: employee.streak,
            leave: employee
                .leave
                .iter()
                .map(|d| match horizon.day_key(d) {
                    Some(key) => LeaveEntry::Key(key.to_string()),
                    None => LeaveEntry::Index(d),
                })
                .collect(),
            rest_preference: employee.rest_preference.map(RestPreferenceDto::from),
        }
    }

    /// Builds the engine's employee; unknown or out-of-range leave is dropped.
    pub fn to_employee(&self, horizon: &Horizon) -> Employee {
        let mut leave = LeaveCalendar::new();
        for entry in &self.leave {
            let day = match entry {
                LeaveEntry::Index(d) => Some(*d).filter(|&d| d < horizon.len()),
                LeaveEntry::Key(key) => horizon.index_of(key),
            };
            match day {
                Some(d) => leave.insert(d),
                None => debug!(employee = %self.id, ?entry, "dropping leave outside horizon"),
            }
        }

        let rest_preference = self.rest_preference.as_ref().and_then(|p| {
            let normalized = p.normalize();
            if normalized.is_none() {
                debug!(employee = %self.id, preference = ?p, "ignoring unknown rest preference");
            }
            normalized
        });

        Employee {
            id: self.id.clone(),
            role: self.role.clone(),
            last_shift: self.last_shift,
            streak: self.streak,
            leave,
            rest_preference,
        }
    }
}

/// A roster generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRequestDto {
    pub employees: Vec<EmployeeDto>,
    pub days: Vec<String>,
    pub config: Config,
}

impl RosterRequestDto {
    pub fn from_demo(demo: &DemoRoster) -> Self {
        Self {
            employees: demo
                .employees
                .iter()
                .map(|e| EmployeeDto::from_employee(e, &demo.horizon))
                .collect(),
            days: demo.horizon.days().to_vec(),
            config: demo.config.clone(),
        }
    }

    pub fn to_domain(&self) -> Result<(Vec<Employee>, Horizon, Config)> {
        let horizon = Horizon::new(self.days.clone())?;
        self.config.check()?;
        let employees = self.employees.iter().map(|e| e.to_employee(&horizon)).collect();
        Ok((employees, horizon, self.config.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRowDto {
    pub employee_id: String,
    pub role: String,
    pub cells: Vec<ShiftCode>,
}

/// A finished roster submitted for checking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequestDto {
    pub days: Vec<String>,
    pub config: Config,
    pub roster: Vec<RosterRowDto>,
}

impl ValidateRequestDto {
    pub fn to_domain(&self) -> Result<(Roster, Horizon)> {
        let horizon = Horizon::new(self.days.clone())?;
        let rows = self
            .roster
            .iter()
            .map(|r| EmployeeRow {
                employee_id: r.employee_id.clone(),
                role: r.role.clone(),
                cells: r.cells.clone(),
            })
            .collect();
        Ok((Roster::new(rows), horizon))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    #[serde(flatten)]
    pub report: ValidationReport,
    pub scores: ScoreReport,
}

/// Lifecycle of a roster job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Solving,
    Finished,
    Failed,
}

/// Status of a job without the drafts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusDto {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A job with its outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterJobDto {
    pub id: String,
    pub status: JobStatus,
    pub outcome: RosterOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Weekday};

    fn horizon() -> Horizon {
        Horizon::from_start(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 7).unwrap()
    }

    #[test]
    fn test_leave_accepts_keys_and_indices() {
        let json = r#"{
            "id": "e1",
            "role": "Op",
            "leave": ["2024-01-03", 5, "2023-12-31", 40],
            "restPreference": "Fri"
        }"#;
        let dto: EmployeeDto = serde_json::from_str(json).unwrap();
        let employee = dto.to_employee(&horizon());
        assert_eq!(employee.leave.iter().collect::<Vec<_>>(), vec![2, 5]);
        assert_eq!(employee.rest_preference, Some(RestPreference::Weekday(Weekday::Fri)));
    }

    #[test]
    fn test_numeric_rest_preference_wraps() {
        let json = r#"{ "id": "e1", "role": "Op", "restPreference": 8 }"#;
        let dto: EmployeeDto = serde_json::from_str(json).unwrap();
        assert_eq!(
            dto.to_employee(&horizon()).rest_preference,
            Some(RestPreference::Offset(1))
        );

        let json = r#"{ "id": "e1", "role": "Op", "restPreference": "someday" }"#;
        let dto: EmployeeDto = serde_json::from_str(json).unwrap();
        assert_eq!(dto.to_employee(&horizon()).rest_preference, None);
    }

    #[test]
    fn test_employee_round_trip_through_dto() {
        let h = horizon();
        let employee = Employee::new("e1", "Op")
            .with_leave([1, 4])
            .with_rest_preference(RestPreference::Weekday(Weekday::Tue))
            .with_seed(ShiftCode::C, 2);
        let dto = EmployeeDto::from_employee(&employee, &h);
        assert_eq!(
            dto.leave,
            vec![
                LeaveEntry::Key("2024-01-02".into()),
                LeaveEntry::Key("2024-01-05".into())
            ]
        );
        let back = dto.to_employee(&h);
        assert_eq!(back.leave, employee.leave);
        assert_eq!(back.rest_preference, employee.rest_preference);
        assert_eq!(back.last_shift, Some(ShiftCode::C));
    }

    #[test]
    fn test_request_rejects_bad_horizon() {
        let request = RosterRequestDto {
            employees: Vec::new(),
            days: vec!["d1".into(), "d1".into()],
            config: Config::new(crate::domain::ShiftMode::TwoShifts, crate::config::Continuity::new(1, 2)),
        };
        assert!(request.to_domain().is_err());
    }

    #[test]
    fn test_job_status_wire_names() {
        assert_eq!(serde_json::to_string(&JobStatus::Solving).unwrap(), "\"SOLVING\"");
        assert_eq!(serde_json::to_string(&JobStatus::Finished).unwrap(), "\"FINISHED\"");
    }
}
