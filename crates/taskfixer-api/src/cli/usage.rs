//! Usage inspection: show.

use anyhow::{Result, bail};
use chrono::Utc;
use console::style;
use uuid::Uuid;

use taskfixer_core::usage::{UsageRepository, evaluate_quota, feature_access};
use taskfixer_types::usage::QuotaGate;

use crate::state::AppState;

/// Print counters, limits and unlocked features of a user.
pub async fn show_usage(state: &AppState, user_id: &Uuid, json: bool) -> Result<()> {
    let repo = state.ledger.repo();
    let Some(profile) = repo.get_profile(user_id).await? else {
        bail!("user '{user_id}' not found");
    };
    let counters = repo.get_counters(user_id).await?.unwrap_or_default();
    let limits = state.ledger.free_trial_limits();
    let now = Utc::now();
    let generation = evaluate_quota(
        Some(&profile),
        Some(&counters),
        &limits,
        QuotaGate::Generation,
        now,
    );
    let export = evaluate_quota(Some(&profile), Some(&counters), &limits, QuotaGate::Export, now);
    let features = feature_access(profile.tier);
    let metered = !profile.tier.is_paid();

    if json {
        let out = serde_json::json!({
            "userId": user_id,
            "tier": profile.tier,
            "status": profile.status,
            "endsAt": profile.ends_at,
            "usage": counters,
            "limits": metered.then_some(limits),
            "features": features,
            "canGenerate": generation.allowed,
            "canExport": export.allowed,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let limit = |max: u64| {
        if metered {
            max.to_string()
        } else {
            "unlimited".to_string()
        }
    };
    let check_mark = |ok: bool| {
        if ok {
            format!("{}", style("✓").green())
        } else {
            format!("{}", style("✗").red())
        }
    };

    println!();
    println!(
        "  {} Usage for {}",
        style("📊").bold(),
        style(user_id).cyan()
    );
    println!();
    println!("  {:<14} {} ({})", style("Tier").dim(), profile.tier, profile.status);
    if let Some(ends_at) = profile.ends_at {
        println!("  {:<14} {}", style("Ends").dim(), ends_at.to_rfc3339());
    }
    println!(
        "  {:<14} {} / {}",
        style("Words").dim(),
        counters.word_count_used,
        limit(limits.max_words)
    );
    println!(
        "  {:<14} {} / {}",
        style("Documents").dim(),
        counters.pdf_redesigns_count,
        limit(limits.max_documents)
    );
    println!("  {:<14} {}", style("Files").dim(), counters.files_uploaded);
    println!();
    println!("  {} Generation", check_mark(generation.allowed));
    println!("  {} Export", check_mark(export.allowed));
    println!("  {} Reflection", check_mark(features.has_reflection));
    println!("  {} Differentiation", check_mark(features.has_differentiation));
    println!("  {} Priority support", check_mark(features.has_priority_support));
    if let Some(reason) = generation.reason.or(export.reason) {
        println!();
        println!("  {} {}", style("i").blue().bold(), reason);
    }
    println!();
    Ok(())
}
