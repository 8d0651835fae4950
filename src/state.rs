use std::sync::Arc;

use crate::auth::AuthService;
use crate::realtime::ChangeHub;
use crate::storage::Storage;
use crate::store::{Notifying, Store};

/// Shared by every handler through `web::Data<AppState>`.
pub struct AppState {
    /// Already wrapped so every write reaches the hub.
    pub store: Arc<dyn Store>,
    pub hub: ChangeHub,
    pub storage: Storage,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, storage: Storage, auth: AuthService) -> Self {
        let hub = ChangeHub::new();
        let store: Arc<dyn Store> = Arc::new(Notifying::new(store, hub.clone()));
        AppState { store, hub, storage, auth: Arc::new(auth) }
    }
}
