//! Shared application state for all routes.

use crate::authz::PolicyService;
use crate::config::ResolvedModel;
use crate::store::{MemoryStore, RecordStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub model: Arc<ResolvedModel>,
    pub policy: Arc<dyn PolicyService>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, model: ResolvedModel, policy: Arc<dyn PolicyService>) -> Self {
        AppState {
            store,
            model: Arc::new(model),
            policy,
        }
    }

    /// State over a fresh in-memory store for `model`.
    pub fn in_memory(model: ResolvedModel, policy: Arc<dyn PolicyService>) -> Self {
        let store = Arc::new(MemoryStore::new(&model));
        Self::new(store, model, policy)
    }
}
