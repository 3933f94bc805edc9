//! User administration: create, set-subscription.

use anyhow::Result;
use chrono::{DateTime, Utc};
use console::style;
use uuid::Uuid;

use taskfixer_types::usage::{SubscriptionStatus, SubscriptionTier};

use crate::state::AppState;

/// Create a user with zeroed counters and print a fresh API key.
///
/// The key is shown once; only its hash is stored.
pub async fn create_user(
    state: &AppState,
    email: &str,
    tier: SubscriptionTier,
    json: bool,
) -> Result<()> {
    let user = state.accounts.create_user(email, tier).await?;
    let api_key = state.accounts.create_api_key(&user.id, "cli").await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "id": user.id,
                "email": user.email,
                "tier": user.tier,
                "status": user.status,
                "apiKey": api_key,
            })
        );
        return Ok(());
    }

    println!();
    println!(
        "  {} Created user {} ({})",
        style("✓").green().bold(),
        style(&user.email).cyan(),
        user.tier
    );
    println!("  {} {}", style("ID:").dim(), user.id);
    println!();
    println!(
        "  {} API key (save this -- it won't be shown again):",
        style("🔑").bold()
    );
    println!();
    println!("  {}", style(&api_key).yellow().bold());
    println!();
    Ok(())
}

/// Overwrite the subscription columns of a user.
pub async fn set_subscription(
    state: &AppState,
    user_id: &Uuid,
    tier: SubscriptionTier,
    status: SubscriptionStatus,
    ends_at: Option<DateTime<Utc>>,
    json: bool,
) -> Result<()> {
    state
        .accounts
        .set_subscription(user_id, tier, status, ends_at)
        .await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "id": user_id,
                "tier": tier,
                "status": status,
                "endsAt": ends_at,
            })
        );
    } else {
        let ends = ends_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} Subscription of {} set to {} ({}, ends {})",
            style("✓").green().bold(),
            style(user_id).bold(),
            style(tier).cyan(),
            status,
            ends
        );
    }
    Ok(())
}
