use std::sync::Arc;

use crate::web::store::TaskStore;

/// Shared application state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TaskStore>,
}

impl AppState {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}
