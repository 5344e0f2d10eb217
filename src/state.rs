use crate::identity::IdentityProvider;
use crate::session::{SessionController, SharedSession};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub session: SharedSession,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(session: SessionController, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            identity,
        }
    }
}
