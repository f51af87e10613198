use std::sync::Arc;

use axum::extract::FromRef;

use db::protocol::StatusProtocol;
use db::store::PipelineStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PipelineStore>,
    pub protocol: StatusProtocol,
    pub nats: async_nats::Client,
}

#[derive(Clone)]
pub struct Nats(pub async_nats::Client);

impl FromRef<AppState> for Nats {
    fn from_ref(state: &AppState) -> Self {
        Self(state.nats.clone())
    }
}
