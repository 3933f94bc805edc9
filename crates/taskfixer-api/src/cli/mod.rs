//! CLI command definitions for the `taskfixer` binary.
//!
//! Uses clap derive macros for argument parsing. Besides `serve`, the
//! commands are administrative: they stand in for the external auth and
//! billing systems when running locally.

pub mod usage;
pub mod user;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use taskfixer_types::usage::{SubscriptionStatus, SubscriptionTier};

/// Assignment-redesign chat relay with usage metering.
#[derive(Parser)]
#[command(name = "taskfixer", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through the OpenTelemetry stdout exporter.
    #[arg(long, global = true, env = "TASKFIXER_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on (defaults to `[server] port`).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to `[server] host`).
        #[arg(long)]
        host: Option<String>,
    },

    /// Manage users and their subscriptions.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Inspect usage counters.
    Usage {
        #[command(subcommand)]
        action: UsageAction,
    },
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Create a user and print a new API key.
    Create {
        /// Email address of the user.
        email: String,

        /// Subscription tier (free_trial, educator, school).
        #[arg(long, default_value = "free_trial")]
        tier: SubscriptionTier,
    },

    /// Overwrite a user's subscription state.
    SetSubscription {
        /// User ID.
        user_id: Uuid,

        /// Subscription tier (free_trial, educator, school).
        #[arg(long)]
        tier: SubscriptionTier,

        /// Subscription status (active, canceled, past_due, incomplete).
        #[arg(long, default_value = "active")]
        status: SubscriptionStatus,

        /// Explicit expiry (RFC 3339), for subscriptions canceled at period end.
        #[arg(long)]
        ends_at: Option<DateTime<Utc>>,
    },
}

#[derive(Subcommand)]
pub enum UsageAction {
    /// Show counters, limits and features of a user.
    Show {
        /// User ID.
        user_id: Uuid,
    },
}
