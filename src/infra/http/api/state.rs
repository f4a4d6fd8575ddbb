use std::sync::Arc;
use std::time::Duration;

use crate::application::context::OperationContext;
use crate::application::repos::StoreHealth;
use crate::application::snapshots::SnapshotService;
use crate::infra::http::middleware::RequestContext;

const API_ACTOR: &str = "api";

#[derive(Clone)]
pub struct ApiState {
    pub snapshots: Arc<SnapshotService>,
    pub health: Arc<dyn StoreHealth>,
    pub health_timeout: Duration,
}

impl ApiState {
    pub fn operation_context(request: &RequestContext) -> OperationContext {
        OperationContext::new(request.correlation_id.clone(), API_ACTOR)
    }
}
