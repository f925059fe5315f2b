use crate::service::AgentService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AgentService>,
}
