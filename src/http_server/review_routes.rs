//! Review HTTP Routes
//!
//! Thin JSON wrappers over the workflow coordinator. The reviewer
//! identity always comes from the bearer token, never from the body.

use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::errors::ApiError;
use crate::auth::{AuthError, Authenticator, Reviewer};
use crate::clock::Clock;
use crate::coordinator::{
    CoordinatorError, ResultFilter, SaveReceipt, SkipReceipt, Stats, WorkflowCoordinator,
};
use crate::lease::{Lease, ReleaseOutcome};
use crate::record::{RecordId, ReviewRecord};
use crate::review::{ReviewStatus, ReviewSubmission};
use crate::store::{ResultEntry, ReviewStore};

/// Shared review state
pub struct ReviewState<S: ReviewStore, C: Clock + Clone> {
    pub coordinator: Arc<WorkflowCoordinator<S, C>>,
    pub auth: Authenticator,
}

impl<S: ReviewStore, C: Clock + Clone> ReviewState<S, C> {
    pub fn new(coordinator: Arc<WorkflowCoordinator<S, C>>, auth: Authenticator) -> Self {
        Self { coordinator, auth }
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<Reviewer, ApiError> {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .ok_or(AuthError::AuthenticationRequired)?;
        Ok(self.auth.check(token.trim())?)
    }
}

/// Review routes with shared state
pub fn review_routes<S, C>(state: Arc<ReviewState<S, C>>) -> Router
where
    S: ReviewStore + 'static,
    C: Clock + Clone + 'static,
{
    Router::new()
        .route("/next", post(next_handler::<S, C>))
        .route("/heartbeat", post(heartbeat_handler::<S, C>))
        .route("/save", post(save_handler::<S, C>))
        .route("/skip", post(skip_handler::<S, C>))
        .route("/release", post(release_handler::<S, C>))
        .route("/stats", get(stats_handler::<S, C>))
        .route("/results", get(results_handler::<S, C>))
        .with_state(state)
}

// ==================
// Request/Response Types
// ==================

/// Lease as seen by the client; `expires_at_ms` drives the countdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseInfo {
    pub record_id: RecordId,
    pub owner: String,
    pub version: u64,
    pub expires_at_ms: i64,
}

impl From<&Lease> for LeaseInfo {
    fn from(lease: &Lease) -> Self {
        Self {
            record_id: lease.record_id.clone(),
            owner: lease.owner.clone(),
            version: lease.version,
            expires_at_ms: lease.expires_at_ms(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    pub record: ReviewRecord,
    pub lease: LeaseInfo,

    /// Pace at which the client should send heartbeats while active
    pub heartbeat_interval_ms: i64,
}

/// Identifies the caller's lease
#[derive(Debug, Deserialize)]
pub struct LeaseRequest {
    pub record_id: RecordId,
    pub version: u64,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub record_id: RecordId,
    pub version: u64,
    pub status: String,
    #[serde(default)]
    pub reviewer_note: String,
    #[serde(default)]
    pub internal_note: String,
    #[serde(default)]
    pub ko_reason: String,
    #[serde(default)]
    pub multitematica: bool,
    #[serde(default)]
    pub elapsed_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub released: bool,
}

/// Query string of the admin results listing; blank values are ignored
#[derive(Debug, Default, Deserialize)]
pub struct ResultsQuery {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub record_id: Option<String>,
}

impl ResultsQuery {
    fn into_filter(self) -> Result<ResultFilter, CoordinatorError> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let status = match present(self.status) {
            Some(raw) => Some(raw.parse()?),
            None => None,
        };
        Ok(ResultFilter {
            user: present(self.user),
            status,
            record_id: present(self.record_id),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub count: usize,
    pub results: Vec<ResultEntry>,
}

// ==================
// Handlers
// ==================

fn require_record_id(id: &RecordId) -> Result<(), ApiError> {
    if id.is_empty() {
        return Err(ApiError::bad_request("record_id is required"));
    }
    Ok(())
}

async fn next_handler<S, C>(
    State(state): State<Arc<ReviewState<S, C>>>,
    headers: HeaderMap,
) -> Result<Json<AssignmentResponse>, ApiError>
where
    S: ReviewStore + 'static,
    C: Clock + Clone + 'static,
{
    let reviewer = state.authenticate(&headers)?;
    let assignment = state.coordinator.acquire_next(&reviewer.username)?;
    Ok(Json(AssignmentResponse {
        lease: LeaseInfo::from(&assignment.lease),
        record: assignment.record,
        heartbeat_interval_ms: state
            .coordinator
            .policy()
            .heartbeat_min_interval
            .num_milliseconds(),
    }))
}

async fn heartbeat_handler<S, C>(
    State(state): State<Arc<ReviewState<S, C>>>,
    headers: HeaderMap,
    Json(request): Json<LeaseRequest>,
) -> Result<Json<LeaseInfo>, ApiError>
where
    S: ReviewStore + 'static,
    C: Clock + Clone + 'static,
{
    let reviewer = state.authenticate(&headers)?;
    require_record_id(&request.record_id)?;
    let lease = state
        .coordinator
        .heartbeat(&request.record_id, &reviewer.username, request.version)?;
    Ok(Json(LeaseInfo::from(&lease)))
}

async fn save_handler<S, C>(
    State(state): State<Arc<ReviewState<S, C>>>,
    headers: HeaderMap,
    Json(request): Json<SaveRequest>,
) -> Result<Json<SaveReceipt>, ApiError>
where
    S: ReviewStore + 'static,
    C: Clock + Clone + 'static,
{
    let reviewer = state.authenticate(&headers)?;
    require_record_id(&request.record_id)?;
    let status: ReviewStatus = request
        .status
        .parse()
        .map_err(|e| ApiError::from(CoordinatorError::Validation(e)))?;

    let mut submission = ReviewSubmission::new(
        request.record_id.clone(),
        status,
        reviewer.username.clone(),
        state.coordinator.now(),
    )
    .with_note(request.reviewer_note)
    .with_internal_note(request.internal_note)
    .with_ko_reason(request.ko_reason)
    .with_multitematica(request.multitematica);
    if let Some(secs) = request.elapsed_seconds {
        submission = submission.with_elapsed_seconds(secs);
    }

    debug!(record_id = %request.record_id, owner = %reviewer.username, status = %status, "save requested");
    let receipt = state.coordinator.submit(
        &request.record_id,
        &reviewer.username,
        request.version,
        submission,
    )?;
    Ok(Json(receipt))
}

async fn skip_handler<S, C>(
    State(state): State<Arc<ReviewState<S, C>>>,
    headers: HeaderMap,
    Json(request): Json<LeaseRequest>,
) -> Result<Json<SkipReceipt>, ApiError>
where
    S: ReviewStore + 'static,
    C: Clock + Clone + 'static,
{
    let reviewer = state.authenticate(&headers)?;
    require_record_id(&request.record_id)?;
    let receipt = state
        .coordinator
        .skip(&request.record_id, &reviewer.username, request.version)?;
    Ok(Json(receipt))
}

async fn release_handler<S, C>(
    State(state): State<Arc<ReviewState<S, C>>>,
    headers: HeaderMap,
    Json(request): Json<LeaseRequest>,
) -> Result<Json<ReleaseResponse>, ApiError>
where
    S: ReviewStore + 'static,
    C: Clock + Clone + 'static,
{
    let reviewer = state.authenticate(&headers)?;
    require_record_id(&request.record_id)?;
    let outcome = state
        .coordinator
        .abandon(&request.record_id, &reviewer.username, request.version)?;
    Ok(Json(ReleaseResponse {
        released: outcome == ReleaseOutcome::Released,
    }))
}

async fn stats_handler<S, C>(
    State(state): State<Arc<ReviewState<S, C>>>,
    headers: HeaderMap,
) -> Result<Json<Stats>, ApiError>
where
    S: ReviewStore + 'static,
    C: Clock + Clone + 'static,
{
    let reviewer = state.authenticate(&headers)?;
    reviewer.require_admin()?;
    Ok(Json(state.coordinator.stats()?))
}

async fn results_handler<S, C>(
    State(state): State<Arc<ReviewState<S, C>>>,
    headers: HeaderMap,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<ResultsResponse>, ApiError>
where
    S: ReviewStore + 'static,
    C: Clock + Clone + 'static,
{
    let reviewer = state.authenticate(&headers)?;
    reviewer.require_admin()?;
    let filter = query.into_filter()?;
    debug!(?filter, "listing results");
    let results = state.coordinator.list_results(&filter)?;
    Ok(Json(ResultsResponse {
        count: results.len(),
        results,
    }))
}
