//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! The relay is generic over its ports, but AppState pins it to the concrete
//! infra implementations (the conversation provider stays boxed so tests can
//! swap in a scripted one).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use taskfixer_core::classify::{KeywordClassifier, ReplyClassifier};
use taskfixer_core::conversation::BoxConversationProvider;
use taskfixer_core::relay::{RelaySettings, StreamRelay};
use taskfixer_core::tool::ToolExecutor;
use taskfixer_core::usage::UsageLedger;
use taskfixer_infra::config::{load_config, openai_api_key, resolve_data_dir};
use taskfixer_infra::openai::OpenAiAssistantsProvider;
use taskfixer_infra::search::DuckDuckGoSearch;
use taskfixer_infra::sqlite::account::SqliteAccountRepository;
use taskfixer_infra::sqlite::pool::{DatabasePool, database_url};
use taskfixer_infra::sqlite::usage::SqliteUsageRepository;
use taskfixer_types::config::AppConfig;

/// Concrete type aliases for the generics pinned to infra implementations.
pub type ConcreteLedger = UsageLedger<SqliteUsageRepository>;

pub type ConcreteRelay =
    StreamRelay<BoxConversationProvider, DuckDuckGoSearch, SqliteUsageRepository>;

/// A relay that is currently streaming, addressable by the cancel endpoint.
#[derive(Clone)]
pub struct ActiveRelay {
    pub user_id: Uuid,
    pub cancel: CancellationToken,
}

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ConcreteRelay>,
    pub ledger: Arc<ConcreteLedger>,
    pub provider: Arc<BoxConversationProvider>,
    pub accounts: Arc<SqliteAccountRepository>,
    pub classifier: Arc<dyn ReplyClassifier>,
    /// Streaming relays keyed by relay id.
    pub active_relays: Arc<DashMap<Uuid, ActiveRelay>>,
    pub config: Arc<AppConfig>,
    pub data_dir: PathBuf,
    /// Owns relay drivers, accounting jobs and run cancellations.
    pub tracker: TaskTracker,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await;
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        let api_key = openai_api_key().unwrap_or_else(|| {
            tracing::warn!("OPENAI_API_KEY is not set; upstream calls will be rejected");
            SecretString::from("")
        });
        let provider = OpenAiAssistantsProvider::new(
            api_key,
            config.openai.base_url.clone(),
            config.openai.assistant_id.clone(),
        )?;
        let search = DuckDuckGoSearch::new(
            config.search.base_url.clone(),
            Duration::from_secs(config.search.timeout_secs),
        )?;

        Ok(Self::from_parts(
            config,
            db_pool,
            BoxConversationProvider::new(provider),
            search,
            data_dir,
        ))
    }

    /// Wire services from already-built adapters.
    pub fn from_parts(
        config: AppConfig,
        db_pool: DatabasePool,
        provider: BoxConversationProvider,
        search: DuckDuckGoSearch,
        data_dir: PathBuf,
    ) -> Self {
        let tracker = TaskTracker::new();
        let provider = Arc::new(provider);

        let ledger = Arc::new(UsageLedger::new(
            SqliteUsageRepository::new(db_pool.clone()),
            config.quota.free_trial_limits(),
        ));
        let tools = Arc::new(ToolExecutor::new(search, config.search.default_results));
        let settings = RelaySettings {
            timeout: Duration::from_secs(config.relay.timeout_secs),
            event_buffer: config.relay.event_buffer,
        };
        let relay = StreamRelay::new(
            provider.clone(),
            tools,
            ledger.clone(),
            tracker.clone(),
            settings,
        );

        Self {
            relay: Arc::new(relay),
            ledger,
            provider,
            accounts: Arc::new(SqliteAccountRepository::new(db_pool)),
            classifier: Arc::new(KeywordClassifier),
            active_relays: Arc::new(DashMap::new()),
            config: Arc::new(config),
            data_dir,
            tracker,
        }
    }
}
