use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Query, State},
    http::{header, StatusCode},
    response::{sse::Sse, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};

use talent_sync_core::{CandidateStatus, InsightsSnapshot, MatchKey, MatchRecord};

use crate::coordinator::{BulkShortlist, MutationCoordinator, StatusChange};
use crate::events::{parse_kind_list, view_keep_alive, view_stream};
use crate::problem::ProblemResponse;
use crate::scheduler::{RefreshReason, RefreshReport, SyncScheduler};
use crate::session::{SelectionUpdate, SyncSession, ViewStatus};
use crate::telemetry;

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    session: SyncSession,
    scheduler: SyncScheduler,
    coordinator: MutationCoordinator,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        session: SyncSession,
        scheduler: SyncScheduler,
        coordinator: MutationCoordinator,
    ) -> Self {
        Self {
            metrics,
            session,
            scheduler,
            coordinator,
        }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn session(&self) -> &SyncSession {
        &self.session
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/view/candidates", get(view_candidates))
        .route("/view/insights", get(view_insights))
        .route(
            "/view/selection",
            get(view_selection).post(select_row).delete(clear_selection),
        )
        .route("/view/events", get(view_events))
        .route("/actions/refresh", post(refresh))
        .route("/actions/status", post(change_status))
        .route("/actions/shortlist", post(shortlist))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> Response {
    let body = telemetry::render_metrics(state.metrics());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
struct CandidatesView {
    status: ViewStatus,
    version: u64,
    candidates: Vec<MatchRecord>,
}

async fn view_candidates(State(state): State<AppState>) -> Json<CandidatesView> {
    let view = state.session().view().await;
    Json(CandidatesView {
        status: view.status,
        version: view.version,
        candidates: view.candidates,
    })
}

#[derive(Debug, Serialize)]
struct InsightsView {
    status: ViewStatus,
    last_refreshed_at: Option<DateTime<Utc>>,
    insights: Option<InsightsSnapshot>,
}

async fn view_insights(State(state): State<AppState>) -> Json<InsightsView> {
    let view = state.session().view().await;
    Json(InsightsView {
        status: view.status,
        last_refreshed_at: view.last_refreshed_at,
        insights: view.insights,
    })
}

#[derive(Debug, Serialize)]
struct SelectionView {
    count: usize,
    selected: Vec<MatchKey>,
}

async fn selection_view(session: &SyncSession) -> SelectionView {
    let selection = session.selection().await;
    SelectionView {
        count: selection.len(),
        selected: selection.keys().copied().collect(),
    }
}

async fn view_selection(State(state): State<AppState>) -> Json<SelectionView> {
    Json(selection_view(state.session()).await)
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    candidate_id: u64,
    jd_id: u64,
    #[serde(default = "default_selected")]
    selected: bool,
}

fn default_selected() -> bool {
    true
}

async fn select_row(
    State(state): State<AppState>,
    payload: Result<Json<SelectBody>, JsonRejection>,
) -> Result<Json<SelectionView>, ProblemResponse> {
    let Json(body) = payload.map_err(invalid_body)?;
    let key = MatchKey::new(body.candidate_id, body.jd_id);
    match state.session().set_selected(key, body.selected).await {
        SelectionUpdate::Changed | SelectionUpdate::Unchanged => {
            Ok(Json(selection_view(state.session()).await))
        }
        SelectionUpdate::UnknownRow => Err(ProblemResponse::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "unknown_row",
            format!(
                "candidate {} is not listed for job description {}",
                key.candidate_id, key.jd_id
            ),
        )),
        SelectionUpdate::Closed => Err(ProblemResponse::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "session_closed",
            "the dashboard session has been torn down",
        )),
    }
}

async fn clear_selection(State(state): State<AppState>) -> StatusCode {
    state.session().clear_selection().await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(default)]
    types: Option<String>,
}

async fn view_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<
    Sse<impl tokio_stream::Stream<Item = Result<axum::response::sse::Event, serde_json::Error>>>,
    ProblemResponse,
> {
    let kinds = parse_kind_list(query.types)
        .map_err(|err| ProblemResponse::new(StatusCode::BAD_REQUEST, "invalid_types", err))?;
    let stream = view_stream(state.session().events(), kinds);

    Ok(Sse::new(stream).keep_alive(view_keep_alive()))
}

#[derive(Debug, Default, Deserialize)]
struct RefreshQuery {
    #[serde(default)]
    wait: bool,
}

async fn refresh(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> Result<Response, ProblemResponse> {
    if query.wait {
        let report: RefreshReport = state.scheduler.refresh_now().await?;
        return Ok(Json(report).into_response());
    }

    state.scheduler.request_refresh(RefreshReason::Manual)?;
    Ok(StatusCode::ACCEPTED.into_response())
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    candidate_id: u64,
    status: String,
}

async fn change_status(
    State(state): State<AppState>,
    payload: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<StatusChange>, ProblemResponse> {
    let Json(body) = payload.map_err(invalid_body)?;
    let status: CandidateStatus = body.status.parse().map_err(|err| {
        ProblemResponse::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_status",
            format!("{err}"),
        )
    })?;

    let change = state
        .coordinator
        .change_status(body.candidate_id, status)
        .await?;
    Ok(Json(change))
}

async fn shortlist(State(state): State<AppState>) -> Result<Json<BulkShortlist>, ProblemResponse> {
    let result = state.coordinator.shortlist_selected().await?;
    Ok(Json(result))
}

fn invalid_body(rejection: JsonRejection) -> ProblemResponse {
    ProblemResponse::new(rejection.status(), "invalid_body", rejection.body_text())
}
