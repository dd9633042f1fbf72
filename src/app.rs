use std::sync::Arc;

use crate::engine::{BookingDesk, Engine, EnginePolicy};
use crate::store::{BlockedTimeConflicts, BookingConflicts, InMemoryStore};
use crate::tenant::TenantRegistry;

/// Everything a connection handler needs, shared across connections.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<InMemoryStore>,
    pub tenants: Arc<TenantRegistry>,
    pub engine: Arc<Engine>,
    pub desk: Arc<BookingDesk>,
}

impl AppState {
    /// Wire the engine to a fresh reference store. Bookings are always a
    /// conflict source; blocked time only when `blocked_time` is set.
    pub fn new(policy: EnginePolicy, blocked_time: bool) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), policy, blocked_time)
    }

    pub fn with_store(store: Arc<InMemoryStore>, policy: EnginePolicy, blocked_time: bool) -> Self {
        let mut engine = Engine::new(store.clone(), policy)
            .with_source(Arc::new(BookingConflicts(store.clone())));
        if blocked_time {
            engine = engine.with_source(Arc::new(BlockedTimeConflicts(store.clone())));
        }
        let engine = Arc::new(engine);
        let desk = Arc::new(BookingDesk::new(engine.clone(), store.clone()));
        Self {
            tenants: Arc::new(TenantRegistry::new(store.clone())),
            store,
            engine,
            desk,
        }
    }
}
