// Event envelope published on the EventBus and replayed to late subscribers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EventMetadata {
    pub agent_id: Uuid,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub execution_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    /// Unix-millis timestamp, assigned at emit time.
    pub timestamp: i64,
    pub payload: serde_json::Value,
    pub metadata: EventMetadata,
}

impl Event {
    pub fn new(
        event_type: impl Into<String>,
        payload: serde_json::Value,
        metadata: EventMetadata,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            payload,
            metadata,
        }
    }
}

/// Predicate used by `subscribeFiltered`: matches on agent id and/or session id.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub agent_id: Option<Uuid>,
    pub session_id: Option<Uuid>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(agent_id) = self.agent_id {
            if event.metadata.agent_id != agent_id {
                return false;
            }
        }
        if let Some(session_id) = self.session_id {
            if event.metadata.session_id != Some(session_id) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_by_agent_and_session() {
        let agent_id = Uuid::now_v7();
        let session_id = Uuid::now_v7();
        let event = Event::new(
            "chat.started",
            serde_json::json!({}),
            EventMetadata {
                agent_id,
                session_id: Some(session_id),
                execution_id: None,
                user_id: None,
            },
        );
        let filter = EventFilter {
            agent_id: Some(agent_id),
            session_id: Some(session_id),
        };
        assert!(filter.matches(&event));

        let other_filter = EventFilter {
            agent_id: Some(Uuid::now_v7()),
            session_id: None,
        };
        assert!(!other_filter.matches(&event));
    }
}
