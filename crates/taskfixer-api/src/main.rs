//! TaskFixer CLI and REST API entry point.
//!
//! Binary name: `taskfixer`
//!
//! Parses CLI arguments, initializes database and services, then dispatches
//! to the appropriate command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use clap::Parser;

use cli::{Cli, Commands, UsageAction, UserAction};
use state::AppState;
use taskfixer_observe::tracing_setup::{init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,taskfixer=debug",
        _ => "trace",
    };
    init_tracing(filter, cli.otel).map_err(|e| anyhow::anyhow!(e))?;

    // Initialize application state (DB, services)
    let state = AppState::init().await?;

    let result = run(cli, state).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli, state: AppState) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| state.config.server.host.clone());
            let port = port.unwrap_or(state.config.server.port);

            if state.config.openai.assistant_id.is_none() {
                println!(
                    "  {} OPENAI_ASSISTANT_ID is not set; chat requests will fail",
                    console::style("!").yellow().bold()
                );
            }

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            println!(
                "  {} TaskFixer API listening on {}",
                console::style("⚡").bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            println!(
                "  {} {}",
                console::style("Data directory:").dim(),
                state.data_dir.display()
            );
            println!(
                "  {}",
                console::style("Press Ctrl+C to stop").dim()
            );

            let tracker = state.tracker.clone();
            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            // Let in-flight relays finish their accounting.
            tracker.close();
            tracker.wait().await;

            println!("\n  Server stopped.");
        }

        Commands::User { action } => match action {
            UserAction::Create { email, tier } => {
                cli::user::create_user(&state, &email, tier, cli.json).await?;
            }
            UserAction::SetSubscription {
                user_id,
                tier,
                status,
                ends_at,
            } => {
                cli::user::set_subscription(&state, &user_id, tier, status, ends_at, cli.json)
                    .await?;
            }
        },

        Commands::Usage { action } => match action {
            UsageAction::Show { user_id } => {
                cli::usage::show_usage(&state, &user_id, cli.json).await?;
            }
        },
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
