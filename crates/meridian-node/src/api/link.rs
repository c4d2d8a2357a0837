//! Link API endpoints.

use axum::{extract::State, Json};
use meridian_core::Link;
use meridian_state::LinkStore;

use crate::state::AppState;

/// List live links with their current annotations.
pub async fn list_links(State(state): State<AppState>) -> Json<Vec<Link>> {
    Json(state.links.links())
}
