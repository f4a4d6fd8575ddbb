use uuid::Uuid;

const SYSTEM_ACTOR: &str = "system";

/// Per-request metadata threaded through every service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationContext {
    pub correlation_id: String,
    pub actor: String,
}

impl OperationContext {
    pub fn new(correlation_id: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            actor: actor.into(),
        }
    }

    /// Context for work not triggered by an inbound request.
    pub fn system() -> Self {
        Self::new(Uuid::new_v4().to_string(), SYSTEM_ACTOR)
    }
}
