use std::sync::Arc;

use portal_core::scenarios::ScenarioCatalog;

use crate::config::Settings;
use crate::dialogue::{Orchestrator, SessionRegistry};
use crate::genai::GenerativeAgent;
use crate::registration::Registrar;
use crate::store::SolutionStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SolutionStore>,
    pub agent: Arc<dyn GenerativeAgent>,
    pub catalog: Arc<ScenarioCatalog>,
    pub sessions: Arc<SessionRegistry>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Arc<dyn SolutionStore>,
        agent: Arc<dyn GenerativeAgent>,
    ) -> Self {
        Self {
            store,
            agent,
            catalog: Arc::new(ScenarioCatalog::builtin().clone()),
            sessions: Arc::new(SessionRegistry::new(settings.session_ttl)),
            settings: Arc::new(settings),
        }
    }

    pub fn registrar(&self) -> Registrar<'_> {
        Registrar {
            store: self.store.as_ref(),
            catalog: &self.catalog,
            timeout: self.settings.store_timeout,
        }
    }

    pub fn orchestrator(&self) -> Orchestrator<'_> {
        Orchestrator {
            agent: self.agent.as_ref(),
            registrar: self.registrar(),
        }
    }
}
