use std::sync::Arc;

use helmsman_engine::Controller;

/// Shared handler state: one controller for the whole process.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<Controller>,
}

impl AppState {
    pub fn new(controller: Arc<Controller>) -> Self {
        Self { controller }
    }
}
