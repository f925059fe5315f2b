// Agent runtime platform API server.

mod config;
mod error;
mod routes;
mod service;
mod state;

use agentrt_contracts::agent::{
    Agent, AgentConfig, AgentStatus, AgentType, CreateAgentRequest, LlmBinding, MemoryPolicy,
    UpdateAgentRequest,
};
use agentrt_contracts::message::{AgentMessage, ContentPart, MessageContent, MessageRole, ToolCallRequest};
use agentrt_contracts::session::{AgentSession, CreateSessionRequest};
use agentrt_contracts::skills::{SkillContext, SkillDefinition, SkillExecutionMetadata, SkillOutcome};
use agentrt_contracts::tools::{ToolContext, ToolDefinition, ToolInvocation, ToolOutcome};
use agentrt_core::events::EventBus;
use agentrt_core::{builtin_skills, builtin_tools, ProviderFactory, RuntimeManager, SkillRegistry, ToolRegistry};
use agentrt_memory::port::MemoryPortAdapter;
use agentrt_memory::{EmbeddingProvider, HashEmbeddingProvider, InProcessMemoryStore};
use agentrt_storage::Database;
use anyhow::{Context, Result};
use routes::{AddSkillRequest, AddToolRequest, ListAgentsQuery, MessagePageQuery, StreamQuery};
use serde::Serialize;
use service::{AgentService, StreamEnvelope};
use state::AppState;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::create_agent,
        routes::list_agents,
        routes::get_agent,
        routes::update_agent,
        routes::delete_agent,
        routes::create_session,
        routes::list_sessions,
        routes::get_session,
        routes::delete_session,
        routes::list_messages,
        routes::send_message,
        routes::stream_message,
        routes::list_tools,
        routes::add_tool,
        routes::list_skills,
        routes::add_skill,
        routes::available_tools,
        routes::available_skills,
        routes::start_agent,
        routes::stop_agent,
        routes::reset_agent,
    ),
    components(schemas(
        Agent, AgentType, AgentStatus, AgentConfig, MemoryPolicy, LlmBinding,
        CreateAgentRequest, UpdateAgentRequest,
        AgentSession, CreateSessionRequest,
        AgentMessage, MessageRole, MessageContent, ContentPart, ToolCallRequest,
        ToolDefinition, ToolContext, ToolInvocation, ToolOutcome,
        SkillDefinition, SkillContext, SkillExecutionMetadata, SkillOutcome,
        ListAgentsQuery, MessagePageQuery, StreamQuery, AddToolRequest, AddSkillRequest,
        StreamEnvelope,
    )),
    tags(
        (name = "agents", description = "Agent lifecycle: create, configure, start/stop/reset"),
        (name = "sessions", description = "Conversation sessions scoped to an agent"),
        (name = "messages", description = "Message history, sendMessage and the SSE stream"),
        (name = "tools", description = "Tool registry and per-agent tool bindings"),
        (name = "skills", description = "Skill registry and per-agent skill bindings"),
    ),
    info(
        title = "Agent Runtime Platform API",
        version = "0.1.0",
        description = "Multi-tenant agent runtime: agents, sessions, messages, tools, skills",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentrt_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("agentrt-api starting...");

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL environment variable required")?;
    let db = Database::from_url(&database_url)
        .await
        .context("failed to connect to database")?;
    sqlx::migrate!("../agentrt-storage/migrations")
        .run(db.pool())
        .await
        .context("failed to run migrations")?;
    tracing::info!("connected to database and applied migrations");

    let mut tool_registry = ToolRegistry::new();
    builtin_tools::register_builtins(&mut tool_registry);
    let tool_registry = Arc::new(tool_registry);

    let mut skill_registry = SkillRegistry::new();
    builtin_skills::register_builtins(&mut skill_registry);
    let skill_registry = Arc::new(skill_registry);

    let mut providers = ProviderFactory::new();
    match agentrt_openai::OpenAiProvider::from_env() {
        Ok(provider) => {
            providers.register("openai", Arc::new(provider));
            tracing::info!("registered OpenAI-compatible LLM provider");
        }
        Err(e) => tracing::warn!("OPENAI_API_KEY not configured, openai provider unavailable: {e}"),
    }
    match agentrt_anthropic::AnthropicProvider::from_env() {
        Ok(provider) => {
            providers.register("anthropic", Arc::new(provider));
            tracing::info!("registered Anthropic LLM provider");
        }
        Err(e) => tracing::warn!("ANTHROPIC_API_KEY not configured, anthropic provider unavailable: {e}"),
    }
    let providers = Arc::new(providers);

    let events = Arc::new(EventBus::new());

    let embeddings: Arc<dyn EmbeddingProvider> = match std::env::var("OPENAI_API_KEY") {
        Ok(key) => {
            let model = std::env::var("EMBEDDING_MODEL").unwrap_or_else(|_| "text-embedding-3-small".into());
            let dims: usize = std::env::var("EMBEDDING_DIMENSION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1536);
            Arc::new(agentrt_openai::OpenAiEmbeddingProvider::new(key).with_model(model, dims))
        }
        Err(_) => {
            tracing::warn!("OPENAI_API_KEY not set, falling back to local hash embeddings");
            Arc::new(HashEmbeddingProvider::default())
        }
    };
    let memory_store = Arc::new(InProcessMemoryStore::with_config(
        embeddings,
        events.clone(),
        config::load_memory_config(),
    ));
    let memory_port = Arc::new(MemoryPortAdapter::new(memory_store.clone()));
    let _memory_consolidation = memory_store.spawn_consolidation_task();

    let runtimes = Arc::new(
        RuntimeManager::new(
            tool_registry.clone(),
            skill_registry.clone(),
            providers,
            memory_port,
            events,
        )
        .with_ttl(std::time::Duration::from_secs(30 * 60))
        .with_lock_timeout(std::time::Duration::from_secs(60)),
    );
    let _sweeper = runtimes.spawn_sweeper();

    let db = Arc::new(db);
    let service = Arc::new(AgentService::new(
        db,
        runtimes,
        memory_store,
        tool_registry,
        skill_registry,
    ));
    let state = AppState { service };

    let app = axum::Router::new()
        .route("/health", axum::routing::get(health))
        .merge(routes::router(state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:9000".into());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("failed to bind to address")?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
