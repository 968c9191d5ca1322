//! REST API handlers for roster generation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::demo_data::{self, DemoData};
use crate::dto::{
    JobStatus, JobStatusDto, RosterJobDto, RosterRequestDto, ValidateRequestDto, ValidateResponse,
};
use crate::engine::{Progress, RosterEngine, RosterOutcome};
use crate::error::RosterError;
use crate::report::{fallback_scores, ReportContext, RuleBasedScorer, Scorer};
use crate::validation::validate;

struct Job {
    status: JobStatus,
    progress: Option<Progress>,
    outcome: Option<RosterOutcome>,
    error: Option<String>,
    task: Option<JoinHandle<()>>,
}

/// Application state shared across handlers.
///
/// Owns the engine and every submitted job, keyed by job id.
pub struct AppState {
    engine: Arc<RosterEngine>,
    jobs: RwLock<HashMap<String, Job>>,
}

impl AppState {
    pub fn new(engine: RosterEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            jobs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(RosterEngine::new())
    }
}

/// Creates the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health & Info
        .route("/health", get(health))
        .route("/info", get(info))
        // Demo data
        .route("/demo-data", get(list_demo_data))
        .route("/demo-data/{id}", get(get_demo_data))
        // Rosters
        .route("/rosters", get(list_rosters).post(create_roster))
        .route("/rosters/validate", put(validate_roster))
        .route("/rosters/{id}", get(get_roster).delete(delete_roster))
        .route("/rosters/{id}/status", get(get_roster_status))
        .with_state(state)
}

fn bad_request(e: RosterError) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "UP" })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub solver_engine: String,
}

/// GET /info
async fn info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "Shift Roster",
        version: env!("CARGO_PKG_VERSION"),
        solver_engine: state.engine.solver_name().unwrap_or("heuristic").to_string(),
    })
}

/// GET /demo-data
async fn list_demo_data() -> Json<Vec<&'static str>> {
    Json(demo_data::list_demo_data())
}

/// GET /demo-data/{id}
async fn get_demo_data(Path(id): Path<String>) -> Result<Json<RosterRequestDto>, StatusCode> {
    let demo = id.parse::<DemoData>().map_err(|_| StatusCode::NOT_FOUND)?;
    let data = demo_data::generate(demo).map_err(|e| {
        warn!(error = %e, demo = demo.as_str(), "demo data generation failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(RosterRequestDto::from_demo(&data)))
}

/// POST /rosters - Start generating a roster. Returns the job id as plain text.
async fn create_roster(
    State(state): State<Arc<AppState>>,
    Json(dto): Json<RosterRequestDto>,
) -> Result<String, (StatusCode, String)> {
    let (employees, horizon, config) = dto.to_domain().map_err(bad_request)?;
    let id = uuid::Uuid::new_v4().to_string();

    state.jobs.write().insert(
        id.clone(),
        Job {
            status: JobStatus::Solving,
            progress: None,
            outcome: None,
            error: None,
            task: None,
        },
    );
    info!(job = %id, employees = employees.len(), days = horizon.len(), "roster job started");

    let task_state = state.clone();
    let task_id = id.clone();
    let task = tokio::spawn(async move {
        let progress_state = task_state.clone();
        let progress_id = task_id.clone();
        let result = task_state
            .engine
            .generate_roster(&employees, &horizon, &config, move |progress| {
                if let Some(job) = progress_state.jobs.write().get_mut(&progress_id) {
                    job.progress = Some(progress);
                }
            })
            .await;

        let mut jobs = task_state.jobs.write();
        let Some(job) = jobs.get_mut(&task_id) else {
            return;
        };
        match result {
            Ok(outcome) => {
                job.status = JobStatus::Finished;
                job.outcome = Some(outcome);
            }
            Err(e) => {
                warn!(job = %task_id, error = %e, "roster job failed");
                job.status = JobStatus::Failed;
                job.error = Some(e.to_string());
            }
        }
        job.task = None;
    });

    if let Some(job) = state.jobs.write().get_mut(&id) {
        if job.status == JobStatus::Solving {
            job.task = Some(task);
        }
    }
    Ok(id)
}

/// GET /rosters - List all job ids.
async fn list_rosters(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.jobs.read().keys().cloned().collect())
}

/// GET /rosters/{id} - The job's drafts once generation has finished.
async fn get_roster(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RosterJobDto>, StatusCode> {
    let jobs = state.jobs.read();
    match jobs.get(&id) {
        Some(Job {
            status,
            outcome: Some(outcome),
            ..
        }) => Ok(Json(RosterJobDto {
            id,
            status: *status,
            outcome: outcome.clone(),
        })),
        Some(Job {
            status: JobStatus::Failed,
            ..
        }) => Err(StatusCode::UNPROCESSABLE_ENTITY),
        Some(_) => Err(StatusCode::NO_CONTENT),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// GET /rosters/{id}/status
async fn get_roster_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusDto>, StatusCode> {
    let jobs = state.jobs.read();
    let job = jobs.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(JobStatusDto {
        status: job.status,
        progress: job.progress.clone(),
        error: job.error.clone(),
    }))
}

/// DELETE /rosters/{id} - Abort generation and forget the job.
async fn delete_roster(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> StatusCode {
    match state.jobs.write().remove(&id) {
        Some(job) => {
            if let Some(task) = job.task {
                task.abort();
            }
            info!(job = %id, "roster job removed");
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

/// PUT /rosters/validate - Check a finished roster and score it.
async fn validate_roster(
    Json(dto): Json<ValidateRequestDto>,
) -> Result<Json<ValidateResponse>, (StatusCode, String)> {
    let (roster, horizon) = dto.to_domain().map_err(bad_request)?;
    let report = validate(&roster, &horizon, &dto.config);
    let ctx = ReportContext {
        roster: &roster,
        employees: &[],
        horizon: &horizon,
        config: &dto.config,
        validation: &report,
    };
    let scores = RuleBasedScorer
        .score(&ctx)
        .unwrap_or_else(|| fallback_scores(&report));
    Ok(Json(ValidateResponse { report, scores }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        router(Arc::new(AppState::default()))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn with_json(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "UP");
    }

    #[tokio::test]
    async fn test_info_reports_heuristic_engine() {
        let (status, body) = send(&app(), get("/info")).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["solverEngine"], "heuristic");
    }

    #[tokio::test]
    async fn test_demo_data_endpoints() {
        let app = app();
        let (status, body) = send(&app, get("/demo-data")).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(ids, vec!["SMALL", "LARGE"]);

        let (status, body) = send(&app, get("/demo-data/small")).await;
        assert_eq!(status, StatusCode::OK);
        let request: RosterRequestDto = serde_json::from_slice(&body).unwrap();
        assert_eq!(request.employees.len(), 8);
        assert_eq!(request.days.len(), 14);

        let (status, _) = send(&app, get("/demo-data/HUGE")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_roster_job_lifecycle() {
        let app = app();
        let (_, body) = send(&app, get("/demo-data/SMALL")).await;
        let request: Value = serde_json::from_slice(&body).unwrap();

        let (status, body) = send(&app, with_json("POST", "/rosters", &request)).await;
        assert_eq!(status, StatusCode::OK);
        let id = String::from_utf8(body).unwrap();

        let (_, body) = send(&app, get("/rosters")).await;
        let ids: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(ids, vec![id.clone()]);

        let mut finished = false;
        for _ in 0..500 {
            let (status, body) = send(&app, get(&format!("/rosters/{}/status", id))).await;
            assert_eq!(status, StatusCode::OK);
            let json: Value = serde_json::from_slice(&body).unwrap();
            if json["status"] == "FINISHED" {
                finished = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(finished, "roster job did not finish");

        let (status, body) = send(&app, get(&format!("/rosters/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["outcome"]["drafts"].as_array().unwrap().len(), 4);
        assert!(json["outcome"]["best"].as_u64().unwrap() < 4);

        let delete = Request::builder()
            .method("DELETE")
            .uri(format!("/rosters/{}", id))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, delete).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, get(&format!("/rosters/{}", id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let app = app();
        let (status, _) = send(&app, get("/rosters/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, get("/rosters/nope/status")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let delete = Request::builder()
            .method("DELETE")
            .uri("/rosters/nope")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, delete).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected() {
        let request = json!({
            "employees": [],
            "days": ["d1", "d2"],
            "config": { "continuity": { "minDays": 4, "maxDays": 2 } }
        });
        let (status, body) = send(&app(), with_json("POST", "/rosters", &request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8(body).unwrap().contains("continuity"));
    }

    #[tokio::test]
    async fn test_validate_endpoint() {
        let request = json!({
            "days": ["d0", "d1", "d2"],
            "config": { "shiftMode": 3, "continuity": { "minDays": 1, "maxDays": 5 } },
            "roster": [
                { "employeeId": "e1", "role": "Op", "cells": ["C", "A", "A"] }
            ]
        });
        let (status, body) = send(&app(), with_json("PUT", "/rosters/validate", &request)).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["hardViolations"][0]["kind"], "C_RESET");
        assert_eq!(json["hardViolations"][0]["day"], 0);
        assert_eq!(json["scores"]["rulesCompliance"], 98.0);
    }
}
