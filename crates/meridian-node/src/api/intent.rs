//! Intent API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use meridian_compiler::IntentCompiler;
use meridian_core::{codec, ApplicationId, Constraint, HostId, Intent, Result};
use serde::Serialize;
use tracing::{info, warn};

use super::error_response;
use crate::state::{AppState, IntentRecord};

/// Response with intent details.
#[derive(Debug, Serialize)]
pub struct IntentResponse {
    pub key: String,
    pub app_id: ApplicationId,
    pub one: HostId,
    pub two: HostId,
    pub priority: u32,
    pub constraints: Vec<Constraint>,
    /// `[one_to_two, two_to_one]`, empty when not compiled.
    pub paths: Vec<meridian_core::Path>,
    pub installables: Vec<Intent>,
    pub error: Option<String>,
    pub updated_at: String,
}

impl From<&IntentRecord> for IntentResponse {
    fn from(record: &IntentRecord) -> Self {
        let intent = &record.intent;
        Self {
            key: intent.key().value.clone(),
            app_id: intent.app_id().clone(),
            one: intent.one().clone(),
            two: intent.two().clone(),
            priority: intent.priority(),
            constraints: intent.constraints().to_vec(),
            paths: intent.paths().map(|p| p.to_vec()).unwrap_or_default(),
            installables: record.installables.clone(),
            error: record.error.clone(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

fn not_found(key: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("Intent {} not found", key))
}

/// Record a compilation outcome on the intent record.
fn record_outcome(
    record: &mut IntentRecord,
    outcome: Result<Vec<Intent>>,
) -> std::result::Result<(), (StatusCode, String)> {
    record.updated_at = Utc::now();
    match outcome {
        Ok(installables) => {
            record.installables = installables;
            record.error = None;
            Ok(())
        }
        Err(err) => {
            warn!("Compilation of intent {} failed: {}", record.intent.key(), err);
            record.installables.clear();
            record.error = Some(err.to_string());
            Err(error_response(err))
        }
    }
}

/// Submit and compile a new host-to-host intent.
///
/// An intent that fails to compile is kept, with its error, so that it can
/// be recompiled once the topology changes.
pub async fn submit_intent(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> std::result::Result<(StatusCode, Json<IntentResponse>), (StatusCode, String)> {
    let intent = codec::decode(&body).map_err(error_response)?;
    let key = intent.key().value.clone();

    let mut intents = state.intents.write().await;
    if intents.contains_key(&key) {
        return Err((
            StatusCode::CONFLICT,
            format!("Intent {} already exists", key),
        ));
    }

    info!("Submitting intent {}", key);
    let mut record = IntentRecord::new(intent);
    let outcome = state.compiler.compile(&mut record.intent, &[]);
    let result = record_outcome(&mut record, outcome);
    let response = IntentResponse::from(&record);
    intents.insert(key, record);

    result.map(|()| (StatusCode::CREATED, Json(response)))
}

/// Get an intent by key.
pub async fn get_intent(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> std::result::Result<Json<IntentResponse>, (StatusCode, String)> {
    let intents = state.intents.read().await;
    let record = intents.get(&key).ok_or_else(|| not_found(&key))?;
    Ok(Json(IntentResponse::from(record)))
}

/// List all intents.
pub async fn list_intents(State(state): State<AppState>) -> Json<Vec<IntentResponse>> {
    let intents = state.intents.read().await;
    let mut responses: Vec<IntentResponse> = intents.values().map(IntentResponse::from).collect();
    responses.sort_by(|a, b| a.key.cmp(&b.key));
    Json(responses)
}

/// Recompile an intent against the current topology.
pub async fn recompile_intent(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> std::result::Result<Json<IntentResponse>, (StatusCode, String)> {
    let mut intents = state.intents.write().await;
    let record = intents.get_mut(&key).ok_or_else(|| not_found(&key))?;

    info!("Recompiling intent {}", key);
    let previous = record.installables.clone();
    let outcome = state.compiler.compile(&mut record.intent, &previous);
    record_outcome(record, outcome)?;
    Ok(Json(IntentResponse::from(&*record)))
}

/// Withdraw an intent and forget it.
pub async fn withdraw_intent(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> std::result::Result<StatusCode, (StatusCode, String)> {
    let mut intents = state.intents.write().await;
    let record = intents.get_mut(&key).ok_or_else(|| not_found(&key))?;

    state
        .compiler
        .withdraw(&mut record.intent)
        .map_err(error_response)?;
    intents.remove(&key);

    Ok(StatusCode::NO_CONTENT)
}
