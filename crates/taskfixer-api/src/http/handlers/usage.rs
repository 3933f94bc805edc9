//! Usage overview for the authenticated user.

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use serde_json::{Value, json};

use taskfixer_core::usage::{UsageRepository, evaluate_quota, feature_access};
use taskfixer_types::usage::QuotaGate;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::state::AppState;

/// GET /api/usage -- counters, limits and unlocked features of the caller.
pub async fn get_usage(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<Value>, AppError> {
    let repo = state.ledger.repo();
    let profile = repo
        .get_profile(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User profile not found".to_string()))?;
    let counters = repo.get_counters(&auth.user_id).await?.unwrap_or_default();

    let limits = state.ledger.free_trial_limits();
    let check = evaluate_quota(
        Some(&profile),
        Some(&counters),
        &limits,
        QuotaGate::Generation,
        Utc::now(),
    );

    Ok(Json(json!({
        "tier": profile.tier,
        "status": profile.status,
        "usage": counters,
        "limits": (!profile.tier.is_paid()).then_some(limits),
        "features": feature_access(profile.tier),
        "allowed": check.allowed,
        "reason": check.reason,
    })))
}
