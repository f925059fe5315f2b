// REST + SSE surface. Base path `/agents`, per the external interface.
//
// Authentication/authorization is out of scope for this deployment (see
// DESIGN.md); callers identify themselves via an `x-user-id` header, with
// requests that omit it treated as the nil user.

use crate::error::ApiResult;
use crate::state::AppState;
use agentrt_contracts::agent::{Agent, CreateAgentRequest, UpdateAgentRequest};
use agentrt_contracts::message::{AgentMessage, CreateMessageRequest};
use agentrt_contracts::session::{AgentSession, CreateSessionRequest};
use agentrt_contracts::skills::SkillDefinition;
use agentrt_contracts::tools::ToolDefinition;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use utoipa::ToSchema;
use uuid::Uuid;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/agents", post(create_agent).get(list_agents))
        .route("/agents/:id", get(get_agent).put(update_agent).delete(delete_agent))
        .route("/agents/:id/sessions", post(create_session).get(list_sessions))
        .route("/agents/sessions/:sid", get(get_session).delete(delete_session))
        .route(
            "/agents/sessions/:sid/messages",
            get(list_messages).post(send_message),
        )
        .route("/agents/sessions/:sid/stream", get(stream_message))
        .route("/agents/:id/tools", get(list_tools).post(add_tool))
        .route("/agents/:id/skills", get(list_skills).post(add_skill))
        .route("/agents/tools/available", get(available_tools))
        .route("/agents/skills/available", get(available_skills))
        .route("/agents/:id/start", post(start_agent))
        .route("/agents/:id/stop", post(stop_agent))
        .route("/agents/:id/reset", post(reset_agent))
        .with_state(state)
}

fn user_id_from(headers: &HeaderMap) -> Uuid {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or(Uuid::nil())
}

#[utoipa::path(
    post,
    path = "/agents",
    request_body = CreateAgentRequest,
    responses((status = 201, description = "Agent created", body = Agent)),
    tag = "agents"
)]
pub async fn create_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateAgentRequest>,
) -> ApiResult<(StatusCode, Json<Agent>)> {
    let owner_id = user_id_from(&headers);
    let agent = state.service.create_agent(owner_id, req).await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListAgentsQuery {
    #[serde(default)]
    pub public: bool,
}

#[utoipa::path(
    get,
    path = "/agents",
    responses((status = 200, description = "List agents", body = Vec<Agent>)),
    tag = "agents"
)]
pub async fn list_agents(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListAgentsQuery>,
) -> ApiResult<Json<Vec<Agent>>> {
    let agents = if query.public {
        state.service.list_public().await?
    } else {
        let owner_id = user_id_from(&headers);
        state.service.list_by_owner(owner_id).await?
    };
    Ok(Json(agents))
}

#[utoipa::path(
    get,
    path = "/agents/{id}",
    params(("id" = Uuid, Path)),
    responses((status = 200, body = Agent), (status = 404)),
    tag = "agents"
)]
pub async fn get_agent(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Agent>> {
    Ok(Json(state.service.get_agent(id).await?))
}

#[utoipa::path(
    put,
    path = "/agents/{id}",
    params(("id" = Uuid, Path)),
    request_body = UpdateAgentRequest,
    responses((status = 200, body = Agent), (status = 404)),
    tag = "agents"
)]
pub async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAgentRequest>,
) -> ApiResult<Json<Agent>> {
    Ok(Json(state.service.update_agent(id, req).await?))
}

#[utoipa::path(
    delete,
    path = "/agents/{id}",
    params(("id" = Uuid, Path)),
    responses((status = 204), (status = 404)),
    tag = "agents"
)]
pub async fn delete_agent(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    state.service.delete_agent(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/agents/{id}/sessions",
    params(("id" = Uuid, Path)),
    request_body = CreateSessionRequest,
    responses((status = 201, body = AgentSession)),
    tag = "sessions"
)]
pub async fn create_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<AgentSession>)> {
    let user_id = user_id_from(&headers);
    let session = state.service.create_session(id, user_id, req).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[utoipa::path(
    get,
    path = "/agents/{id}/sessions",
    params(("id" = Uuid, Path)),
    responses((status = 200, body = Vec<AgentSession>)),
    tag = "sessions"
)]
pub async fn list_sessions(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Vec<AgentSession>>> {
    Ok(Json(state.service.list_sessions(id).await?))
}

#[utoipa::path(
    get,
    path = "/agents/sessions/{sid}",
    params(("sid" = Uuid, Path)),
    responses((status = 200, body = AgentSession), (status = 404)),
    tag = "sessions"
)]
pub async fn get_session(State(state): State<AppState>, Path(sid): Path<Uuid>) -> ApiResult<Json<AgentSession>> {
    Ok(Json(state.service.get_session(sid).await?))
}

#[utoipa::path(
    delete,
    path = "/agents/sessions/{sid}",
    params(("sid" = Uuid, Path)),
    responses((status = 204), (status = 404)),
    tag = "sessions"
)]
pub async fn delete_session(State(state): State<AppState>, Path(sid): Path<Uuid>) -> ApiResult<StatusCode> {
    state.service.delete_session(sid).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MessagePageQuery {
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
}

#[utoipa::path(
    get,
    path = "/agents/sessions/{sid}/messages",
    params(("sid" = Uuid, Path)),
    responses((status = 200, body = Vec<AgentMessage>)),
    tag = "messages"
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
    Query(page): Query<MessagePageQuery>,
) -> ApiResult<Json<Vec<AgentMessage>>> {
    let messages = state.service.list_messages(sid, page.limit, page.offset).await?;
    Ok(Json(messages))
}

#[utoipa::path(
    post,
    path = "/agents/sessions/{sid}/messages",
    params(("sid" = Uuid, Path)),
    request_body = CreateMessageRequest,
    responses((status = 201, body = AgentMessage), (status = 404), (status = 400)),
    tag = "messages"
)]
pub async fn send_message(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<CreateMessageRequest>,
) -> ApiResult<(StatusCode, Json<AgentMessage>)> {
    let user_id = user_id_from(&headers);
    let message = state.service.send_message(sid, req.content, user_id).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
    get,
    path = "/agents/sessions/{sid}/stream",
    params(("sid" = Uuid, Path), ("content" = String, Query)),
    responses((status = 200, description = "text/event-stream of {id,content,done} envelopes")),
    tag = "messages"
)]
pub async fn stream_message(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
    headers: HeaderMap,
    Query(params): Query<StreamQuery>,
) -> ApiResult<impl IntoResponse> {
    let user_id = user_id_from(&headers);
    let envelopes = state.service.stream_message(sid, params.content, user_id).await?;

    let sse_stream = envelopes.map(|envelope| {
        let data = serde_json::to_string(&envelope).unwrap_or_default();
        Ok::<_, Infallible>(SseEvent::default().data(data))
    });

    Ok(Sse::new(sse_stream))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StreamQuery {
    pub content: String,
}

#[utoipa::path(
    get,
    path = "/agents/{id}/tools",
    params(("id" = Uuid, Path)),
    responses((status = 200, body = Vec<String>)),
    tag = "tools"
)]
pub async fn list_tools(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.service.list_tools(id).await?))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToolRequest {
    pub tool_name: String,
}

#[utoipa::path(
    post,
    path = "/agents/{id}/tools",
    params(("id" = Uuid, Path)),
    request_body = AddToolRequest,
    responses((status = 204), (status = 400)),
    tag = "tools"
)]
pub async fn add_tool(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddToolRequest>,
) -> ApiResult<StatusCode> {
    state.service.add_tool(id, &req.tool_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddSkillRequest {
    pub skill_id: String,
}

#[utoipa::path(
    get,
    path = "/agents/{id}/skills",
    params(("id" = Uuid, Path)),
    responses((status = 200, body = Vec<String>)),
    tag = "skills"
)]
pub async fn list_skills(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.service.list_skills(id).await?))
}

#[utoipa::path(
    post,
    path = "/agents/{id}/skills",
    params(("id" = Uuid, Path)),
    request_body = AddSkillRequest,
    responses((status = 204), (status = 400)),
    tag = "skills"
)]
pub async fn add_skill(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddSkillRequest>,
) -> ApiResult<StatusCode> {
    state.service.add_skill(id, &req.skill_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/agents/tools/available",
    responses((status = 200, body = Vec<ToolDefinition>)),
    tag = "tools"
)]
pub async fn available_tools(State(state): State<AppState>) -> Json<Vec<ToolDefinition>> {
    Json(state.service.available_tools())
}

#[utoipa::path(
    get,
    path = "/agents/skills/available",
    responses((status = 200, body = Vec<SkillDefinition>)),
    tag = "skills"
)]
pub async fn available_skills(State(state): State<AppState>) -> Json<Vec<SkillDefinition>> {
    Json(state.service.available_skills())
}

#[utoipa::path(
    post,
    path = "/agents/{id}/start",
    params(("id" = Uuid, Path)),
    responses((status = 204)),
    tag = "agents"
)]
pub async fn start_agent(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    state.service.start_agent(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/agents/{id}/stop",
    params(("id" = Uuid, Path)),
    responses((status = 204)),
    tag = "agents"
)]
pub async fn stop_agent(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    state.service.stop_agent(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/agents/{id}/reset",
    params(("id" = Uuid, Path)),
    responses((status = 204)),
    tag = "agents"
)]
pub async fn reset_agent(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    state.service.reset_agent(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
