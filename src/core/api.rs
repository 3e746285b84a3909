//! HTTP + WebSocket API for Streakline
//!
//! Endpoints:
//! - GET /health - Health check
//! - POST /rounds - Process one outcome (color or numeric value)
//! - GET /patterns - List rules
//! - POST /patterns - Add a rule (400 with reason when invalid)
//! - GET /patterns/:id - One rule
//! - PUT /patterns/:id - Replace a rule's definition, keeping its states
//! - DELETE /patterns/:id - Remove a rule and its states
//! - GET /patterns/:id/stats - Streak states of a rule and its sub-rules
//! - GET /patterns/:id/streak-distribution - Closed streak lengths
//! - POST /patterns/:id/simulate - Back-test a rule over the buffer
//! - GET /analytics/runs - Color run statistics over the buffer
//! - GET /alerts - Recent alerts, newest first
//! - POST /alerts/clear - Empty the alert log
//! - GET /streaks/top - Longest closed streaks
//! - WS /ws - Live round outputs
//!
//! The engine sits behind one mutex, so rounds are processed one at a time
//! whatever feeds them.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::core::analytics::{color_run_stats, streak_distribution, ColorRunReport};
use crate::core::engine::PatternEngine;
use crate::core::simulate::{simulate, SimulationReport};
use crate::error::EngineError;
use crate::types::{
    AlertEvent, Color, PatternKey, PatternState, RoundOutput, Rule, RuleDefinition, RuleId,
    StreakHistoryRecord, StreakKind,
};

/// Closed streaks kept for the distribution endpoint
const HISTORY_LIMIT: usize = 10_000;

/// Alerts kept for the alert log
const ALERT_LIMIT: usize = 1_000;

/// App state
pub struct AppState {
    pub engine: Mutex<PatternEngine>,
    pub history: Mutex<Vec<StreakHistoryRecord>>,
    pub alerts: Mutex<Vec<AlertEvent>>,
    pub updates: broadcast::Sender<RoundOutput>,
}

impl AppState {
    pub fn new(engine: PatternEngine) -> Self {
        let (updates, _) = broadcast::channel(100);
        Self {
            engine: Mutex::new(engine),
            history: Mutex::new(Vec::new()),
            alerts: Mutex::new(Vec::new()),
            updates,
        }
    }
}

/// Append to a log, dropping the oldest entries past `limit`
fn append_bounded<T: Clone>(log: &mut Vec<T>, items: &[T], limit: usize) {
    log.extend(items.iter().cloned());
    let excess = log.len().saturating_sub(limit);
    log.drain(..excess);
}

/// Process round request. One of `color` or `value` is required.
#[derive(Debug, Deserialize)]
pub struct RoundRequest {
    pub color: Option<String>,
    pub value: Option<f64>,
    pub round_id: Option<String>,
}

/// One stored rule
#[derive(Debug, Serialize)]
pub struct PatternResponse {
    pub id: RuleId,
    pub rule: RuleDefinition,
    pub fingerprint: String,
    pub concrete_rules: usize,
}

/// Alert log query
#[derive(Debug, Default, Deserialize)]
pub struct AlertQuery {
    pub limit: Option<usize>,
    pub pattern_id: Option<RuleId>,
}

/// Top streaks query
#[derive(Debug, Default, Deserialize)]
pub struct TopStreaksQuery {
    #[serde(rename = "type")]
    pub kind: Option<StreakKind>,
    pub limit: Option<usize>,
}

/// Per-key state
#[derive(Debug, Serialize)]
pub struct KeyedState {
    pub key: PatternKey,
    #[serde(flatten)]
    pub state: PatternState,
}

/// Stats response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub id: RuleId,
    pub name: String,
    pub states: Vec<KeyedState>,
}

/// Simulate request
#[derive(Debug, Default, Deserialize)]
pub struct SimulateRequest {
    pub limit: Option<usize>,
}

/// Streak distribution query
#[derive(Debug, Deserialize)]
pub struct DistributionQuery {
    #[serde(rename = "type")]
    pub kind: Option<StreakKind>,
}

/// One histogram bucket
#[derive(Debug, Serialize)]
pub struct DistributionBucket {
    pub streak: u32,
    pub total: u32,
}

/// Streak distribution response
#[derive(Debug, Serialize)]
pub struct DistributionResponse {
    pub id: RuleId,
    pub streak_type: StreakKind,
    pub distribution: Vec<DistributionBucket>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub rules: usize,
    pub buffered: usize,
    pub capacity: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_round_id: Option<String>,
    pub rounds_processed: u64,
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn reject(err: EngineError) -> ApiError {
    let status = match &err {
        EngineError::RuleNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidRule(_) | EngineError::EmptyRoundId => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let code = match &err {
        EngineError::InvalidRule(rule_err) => Some(rule_err.reason.code().to_string()),
        _ => None,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code,
        }),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
            code: None,
        }),
    )
}

fn pattern_response(engine: &PatternEngine, id: RuleId) -> Result<PatternResponse, ApiError> {
    let book = engine.rules();
    let rule = book.get(id).ok_or_else(|| reject(EngineError::RuleNotFound(id)))?;
    Ok(PatternResponse {
        id,
        rule: rule.to_definition(),
        fingerprint: book.fingerprint_of(id).unwrap_or_default().to_string(),
        concrete_rules: book.expanded(id).map_or(0, |e| e.len()),
    })
}

/// Create the API router around an engine
pub fn create_router(engine: PatternEngine) -> Router {
    router(Arc::new(AppState::new(engine)))
}

/// Create the API router over shared state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rounds", post(add_round))
        .route("/patterns", get(list_patterns).post(create_pattern))
        .route(
            "/patterns/:id",
            get(get_pattern).put(update_pattern).delete(delete_pattern),
        )
        .route("/patterns/:id/stats", get(pattern_stats))
        .route("/patterns/:id/streak-distribution", get(pattern_distribution))
        .route("/patterns/:id/simulate", post(simulate_pattern))
        .route("/analytics/runs", get(run_analytics))
        .route("/alerts", get(list_alerts))
        .route("/alerts/clear", post(clear_alerts))
        .route("/streaks/top", get(top_streaks))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let engine = state.engine.lock().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        rules: engine.rules().len(),
        buffered: engine.buffer().len(),
        capacity: engine.buffer().capacity(),
        last_round_id: engine.buffer().last_round_id().map(str::to_string),
        rounds_processed: engine.rounds_processed(),
    })
}

/// Process one outcome
async fn add_round(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RoundRequest>,
) -> Result<(StatusCode, Json<RoundOutput>), ApiError> {
    let round_id = req
        .round_id
        .unwrap_or_else(|| format!("R{}", Utc::now().timestamp_millis()));

    let mut engine = state.engine.lock().await;
    let output = match (req.color.as_deref(), req.value) {
        (Some(color), _) => {
            let color: Color = color.parse().map_err(bad_request)?;
            engine.process(color, &round_id)
        }
        (None, Some(value)) => engine.process_value(value, &round_id),
        (None, None) => return Err(bad_request("either color or value is required")),
    }
    .map_err(reject)?;
    drop(engine);

    if !output.streaks_closed.is_empty() {
        let mut history = state.history.lock().await;
        append_bounded(&mut history, &output.streaks_closed, HISTORY_LIMIT);
    }
    if !output.alerts.is_empty() {
        info!("round {} raised {} alerts", output.round_id, output.alerts.len());
        let mut alerts = state.alerts.lock().await;
        append_bounded(&mut alerts, &output.alerts, ALERT_LIMIT);
    }

    // No subscribers is fine
    let _ = state.updates.send(output.clone());
    Ok((StatusCode::CREATED, Json(output)))
}

/// List all rules
async fn list_patterns(State(state): State<Arc<AppState>>) -> Json<Vec<PatternResponse>> {
    let engine = state.engine.lock().await;
    Json(
        engine
            .rules()
            .iter()
            .filter_map(|(id, _)| pattern_response(&engine, id).ok())
            .collect(),
    )
}

/// One rule
async fn get_pattern(
    State(state): State<Arc<AppState>>,
    Path(id): Path<RuleId>,
) -> Result<Json<PatternResponse>, ApiError> {
    let engine = state.engine.lock().await;
    pattern_response(&engine, id).map(Json)
}

/// Validate a full rule document and replace rule `id` with it
async fn update_pattern(
    State(state): State<Arc<AppState>>,
    Path(id): Path<RuleId>,
    Json(body): Json<Value>,
) -> Result<Json<PatternResponse>, ApiError> {
    let rule = Rule::from_value(body).map_err(|e| reject(e.into()))?;
    let mut engine = state.engine.lock().await;
    let changed = engine.replace_rule(id, rule).map_err(reject)?;
    debug!("rule {} update changed={}", id, changed);
    pattern_response(&engine, id).map(Json)
}

/// Validate and add a rule
async fn create_pattern(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<PatternResponse>), ApiError> {
    let mut engine = state.engine.lock().await;
    let id = engine.add_rule_json(body).map_err(reject)?;
    Ok((StatusCode::CREATED, Json(pattern_response(&engine, id)?)))
}

/// Remove a rule, its states, its recorded history and its alerts
async fn delete_pattern(
    State(state): State<Arc<AppState>>,
    Path(id): Path<RuleId>,
) -> Result<StatusCode, ApiError> {
    state.engine.lock().await.remove_rule(id).map_err(reject)?;
    state.history.lock().await.retain(|r| r.rule_key.rule_id != id);
    state.alerts.lock().await.retain(|a| a.rule_id != id);
    Ok(StatusCode::NO_CONTENT)
}

/// States of a rule and its sub-rules
async fn pattern_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<RuleId>,
) -> Result<Json<StatsResponse>, ApiError> {
    let engine = state.engine.lock().await;
    let states = engine.stats_for_rule(id).map_err(reject)?;
    let name = engine.rule(id).map(|r| r.name.clone()).unwrap_or_default();

    Ok(Json(StatsResponse {
        id,
        name,
        states: states
            .into_iter()
            .map(|(key, state)| KeyedState { key, state })
            .collect(),
    }))
}

/// Closed streak histogram, longest first
async fn pattern_distribution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<RuleId>,
    Query(query): Query<DistributionQuery>,
) -> Result<Json<DistributionResponse>, ApiError> {
    if state.engine.lock().await.rule(id).is_none() {
        return Err(reject(EngineError::RuleNotFound(id)));
    }
    let kind = query.kind.unwrap_or(StreakKind::Trigger);

    let history = state.history.lock().await;
    let records: Vec<StreakHistoryRecord> = history
        .iter()
        .filter(|r| r.rule_key.rule_id == id)
        .cloned()
        .collect();
    drop(history);

    Ok(Json(DistributionResponse {
        id,
        streak_type: kind,
        distribution: streak_distribution(&records, kind)
            .into_iter()
            .map(|(streak, total)| DistributionBucket { streak, total })
            .collect(),
    }))
}

/// Back-test a rule over the oldest `limit` buffered outcomes (all by default)
async fn simulate_pattern(
    State(state): State<Arc<AppState>>,
    Path(id): Path<RuleId>,
    body: Option<Json<SimulateRequest>>,
) -> Result<Json<SimulationReport>, ApiError> {
    let limit = body.and_then(|Json(req)| req.limit);

    let (rule, colors) = {
        let engine = state.engine.lock().await;
        let rule = engine
            .rule(id)
            .cloned()
            .ok_or_else(|| reject(EngineError::RuleNotFound(id)))?;
        let mut colors = engine.buffer().to_vec();
        colors.truncate(limit.unwrap_or(engine.buffer().len()));
        (rule, colors)
    };

    debug!("simulating rule {} over {} outcomes", id, colors.len());
    Ok(Json(simulate(&rule, &colors)))
}

/// Run statistics over the buffer
async fn run_analytics(State(state): State<Arc<AppState>>) -> Json<ColorRunReport> {
    let colors = state.engine.lock().await.buffer().to_vec();
    Json(color_run_stats(&colors))
}

/// Recent alerts, newest first, optionally for one rule
async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertQuery>,
) -> Json<Vec<AlertEvent>> {
    let limit = query.limit.unwrap_or(50);
    let alerts = state.alerts.lock().await;
    Json(
        alerts
            .iter()
            .rev()
            .filter(|a| query.pattern_id.map_or(true, |id| a.rule_id == id))
            .take(limit)
            .cloned()
            .collect(),
    )
}

/// Empty the alert log. Cooldowns are unaffected.
async fn clear_alerts(State(state): State<Arc<AppState>>) -> Json<Value> {
    let cleared = {
        let mut alerts = state.alerts.lock().await;
        let n = alerts.len();
        alerts.clear();
        n
    };
    info!("cleared {} alerts", cleared);
    Json(serde_json::json!({"status": "cleared", "cleared": cleared}))
}

/// Longest closed streaks of one kind across all rules
async fn top_streaks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopStreaksQuery>,
) -> Json<Vec<StreakHistoryRecord>> {
    let kind = query.kind.unwrap_or(StreakKind::Trigger);
    let limit = query.limit.unwrap_or(10);

    let mut records: Vec<StreakHistoryRecord> = state
        .history
        .lock()
        .await
        .iter()
        .filter(|r| r.streak_kind == kind)
        .cloned()
        .collect();
    records.sort_by(|a, b| b.length.cmp(&a.length));
    records.truncate(limit);
    Json(records)
}

/// WebSocket handler for live updates
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let rx = state.updates.subscribe();
    ws.on_upgrade(move |socket| handle_websocket(socket, rx))
}

/// Forward round outputs until either side goes away
async fn handle_websocket(socket: WebSocket, mut rx: broadcast::Receiver<RoundOutput>) {
    let (mut sender, mut receiver) = socket.split();
    debug!("websocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(output) => match serde_json::to_string(&output) {
                    Ok(json) => {
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("failed to serialise round output: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!("websocket client lagged by {} rounds", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
    });

    join_first(send_task, recv_task).await;
    debug!("websocket client disconnected");
}

/// Wait for whichever task ends first, abort the other and return its handle
async fn join_first(mut a: JoinHandle<()>, mut b: JoinHandle<()>) -> JoinHandle<()> {
    tokio::select! {
        _ = &mut a => {
            b.abort();
            b
        }
        _ = &mut b => {
            a.abort();
            a
        }
    }
}

/// Run the API server until Ctrl-C, then hand the engine back
pub async fn run_server(
    addr: &str,
    engine: PatternEngine,
) -> Result<PatternEngine, Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Streakline API listening on {}", addr);
    Ok(serve(listener, engine, shutdown_signal()).await?)
}

/// Serve on `listener` until `shutdown` resolves, then hand the engine back
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    engine: PatternEngine,
    shutdown: F,
) -> std::io::Result<PatternEngine>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let state = Arc::new(AppState::new(engine));
    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("API server stopped");
    let engine = state.engine.lock().await.clone();
    Ok(engine)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_first_aborts_the_other_task() {
        let done = tokio::spawn(async {});
        let stuck = tokio::spawn(std::future::pending::<()>());

        let loser = join_first(stuck, done).await;
        let err = loser.await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_append_bounded_drops_oldest() {
        let mut log = vec![1, 2, 3];
        append_bounded(&mut log, &[4, 5], 4);
        assert_eq!(log, vec![2, 3, 4, 5]);
    }
}
