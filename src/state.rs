use std::sync::Arc;

use crate::config::Config;
use crate::registry::SessionRegistry;
use crate::store::{ClientStore, QuestionStore};

#[derive(Clone)]
pub struct AppState {
    pub questions: Arc<dyn QuestionStore>,
    pub clients: Arc<dyn ClientStore>,
    pub registry: Arc<SessionRegistry>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        questions: Arc<dyn QuestionStore>,
        clients: Arc<dyn ClientStore>,
        config: Config,
    ) -> Self {
        Self {
            questions,
            clients,
            registry: Arc::new(SessionRegistry::new()),
            config,
        }
    }
}
